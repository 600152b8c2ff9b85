//! Torrent metadata
//!
//! A typed view over the decoded root dictionary of a `.torrent` file.

use tracing::{debug, warn};

use crate::bencode::{Dict, Value};
use crate::error::{Result, TorrentError};
use crate::storage::PieceLayout;
use crate::torrent::info_hash::{InfoHash, HASH_LEN};

/// Metadata of a single-file torrent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentMetadata {
    /// Tracker announce URL
    pub announce: String,
    /// Suggested file name, if present
    pub name: Option<String>,
    /// Total file size in bytes
    pub length: u64,
    /// Size of each piece in bytes
    pub piece_length: u64,
    /// Concatenated 20-byte SHA-1 hashes, one per piece
    pub pieces: Vec<u8>,
    /// The raw `info` dictionary
    pub info: Dict,
    /// SHA-1 of the canonical `info` encoding
    pub info_hash: InfoHash,
}

impl TorrentMetadata {
    /// Extract metadata from a decoded root dictionary
    pub fn from_value(root: &Value) -> Result<Self> {
        let root = root.as_dict().ok_or_else(|| TorrentError::missing_field("announce"))?;

        let announce = root
            .get(b"announce".as_slice())
            .and_then(Value::as_bytes)
            .ok_or_else(|| TorrentError::missing_field("announce"))?;
        let announce = String::from_utf8(announce.to_vec())
            .map_err(|_| TorrentError::invalid_field("announce", "not valid UTF-8"))?;

        let info = root
            .get(b"info".as_slice())
            .and_then(Value::as_dict)
            .ok_or_else(|| TorrentError::missing_field("info"))?;

        let length = required_integer(info, "length")?;
        let length = u64::try_from(length)
            .map_err(|_| TorrentError::invalid_field("length", "must not be negative"))?;

        let piece_length = required_integer(info, "piece length")?;
        if piece_length <= 0 {
            return Err(TorrentError::invalid_field("piece length", "must be positive"));
        }
        let piece_length = piece_length as u64;

        let pieces = info
            .get(b"pieces".as_slice())
            .and_then(Value::as_bytes)
            .ok_or_else(|| TorrentError::missing_field("pieces"))?
            .to_vec();
        if pieces.len() % HASH_LEN != 0 {
            return Err(TorrentError::invalid_field(
                "pieces",
                format!("length {} is not a multiple of {}", pieces.len(), HASH_LEN),
            ));
        }

        let name = info
            .get(b"name".as_slice())
            .and_then(Value::as_bytes)
            .map(|b| String::from_utf8_lossy(b).into_owned());

        let metadata = Self {
            announce,
            name,
            length,
            piece_length,
            pieces,
            info_hash: InfoHash::compute(info),
            info: info.clone(),
        };

        let layout = metadata.layout()?;
        if layout.piece_count() as usize != metadata.piece_hash_count() {
            warn!(
                "Torrent declares {} piece hashes but length implies {} pieces",
                metadata.piece_hash_count(),
                layout.piece_count()
            );
        }

        debug!(
            "Extracted metadata: announce={}, length={}, piece_length={}, info_hash={}",
            metadata.announce, metadata.length, metadata.piece_length, metadata.info_hash
        );
        Ok(metadata)
    }

    /// Piece layout for this torrent
    pub fn layout(&self) -> Result<PieceLayout> {
        PieceLayout::new(self.length, self.piece_length)
    }

    /// Number of hashes in `pieces`
    pub fn piece_hash_count(&self) -> usize {
        self.pieces.len() / HASH_LEN
    }

    /// Iterate over the 20-byte piece hashes
    pub fn piece_hashes(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.pieces.chunks_exact(HASH_LEN)
    }

    /// Hash for a specific piece index
    pub fn piece_hash(&self, index: u32) -> Option<[u8; HASH_LEN]> {
        self.piece_hashes()
            .nth(index as usize)
            .and_then(|chunk| chunk.try_into().ok())
    }
}

fn required_integer(dict: &Dict, key: &str) -> Result<i64> {
    dict.get(key.as_bytes())
        .and_then(Value::as_integer)
        .ok_or_else(|| TorrentError::missing_field(key))
}
