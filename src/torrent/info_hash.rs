//! Info hash computation

use std::fmt;

use sha1::{Digest, Sha1};
use tracing::debug;

use crate::bencode::{encode, Dict, Value};

/// Length of a SHA-1 digest
pub const HASH_LEN: usize = 20;

/// SHA-1 of the canonical bencoding of a torrent's `info` dictionary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; HASH_LEN]);

impl InfoHash {
    /// Hash the canonical encoding of an `info` dictionary.
    ///
    /// Keys are re-sorted by the encoder; byte strings such as `pieces` are
    /// hashed exactly as they were decoded.
    pub fn compute(info: &Dict) -> Self {
        let encoded = encode(&Value::Dict(info.clone()));
        let hash = Self::digest(&encoded);
        debug!("Computed info hash {} over {} bytes", hash, encoded.len());
        hash
    }

    /// SHA-1 of raw bytes
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Lowercase hex, 40 characters
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::decode;

    fn sample_info() -> Dict {
        let pieces: Vec<u8> = (0..60u32).map(|i| ((i * 37 + 200) % 256) as u8).collect();
        let mut info = Dict::new();
        info.insert(b"length".to_vec(), Value::Integer(92063));
        info.insert(b"name".to_vec(), Value::from("sample.txt"));
        info.insert(b"piece length".to_vec(), Value::Integer(32768));
        info.insert(b"pieces".to_vec(), Value::Bytes(pieces));
        info
    }

    #[test]
    fn test_known_info_hash() {
        let hash = InfoHash::compute(&sample_info());
        assert_eq!(hash.to_hex(), "c146fae5023f82444f72e7fbe429b7c7f841be0d");
        assert_eq!(hash.to_string(), hash.to_hex());
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let sorted = decode(b"d3:cow3:moo4:spam4:eggse").unwrap();
        let unsorted = decode(b"d4:spam4:eggs3:cow3:mooe").unwrap();
        let a = InfoHash::compute(sorted.as_dict().unwrap());
        let b = InfoHash::compute(unsorted.as_dict().unwrap());
        assert_eq!(a, b);
        assert_eq!(a.to_hex(), "d2c751227762e1a96a62baa71868456a3260f3db");
    }

    #[test]
    fn test_from_bytes() {
        let hash = InfoHash::from_bytes([0xab; 20]);
        assert_eq!(hash.as_bytes(), &[0xab; 20]);
        assert_eq!(hash.to_hex(), "ab".repeat(20));
    }
}
