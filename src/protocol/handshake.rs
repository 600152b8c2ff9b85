//! BitTorrent handshake
//!
//! The fixed 68-byte greeting exchanged before any length-prefixed message.

use bytes::{BufMut, BytesMut};
use tracing::{debug, error, trace, warn};

use crate::error::{Result, TorrentError};
use crate::peer::PeerId;
use crate::torrent::InfoHash;

/// BitTorrent protocol identifier string
pub const PROTOCOL_STRING: &str = "BitTorrent protocol";

/// Length of the protocol string
pub const PROTOCOL_LENGTH: u8 = 19;

/// Total handshake size on the wire
pub const HANDSHAKE_LEN: usize = 68;

/// BitTorrent handshake message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Reserved extension bits; always zero when we send
    pub reserved: [u8; 8],
    /// Torrent info hash
    pub info_hash: InfoHash,
    /// Sender's peer ID
    pub peer_id: PeerId,
}

impl Handshake {
    /// Create a new handshake with all reserved bits cleared
    pub fn new(info_hash: InfoHash, peer_id: PeerId) -> Self {
        debug!("Creating handshake for info_hash: {}", info_hash);
        Self {
            reserved: [0u8; 8],
            info_hash,
            peer_id,
        }
    }

    /// Serialize the handshake to its 68-byte wire form
    pub fn serialize(&self) -> [u8; HANDSHAKE_LEN] {
        trace!("Serializing handshake");
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL_LENGTH);
        buf.put_slice(PROTOCOL_STRING.as_bytes());
        buf.put_slice(&self.reserved);
        buf.put_slice(self.info_hash.as_bytes());
        buf.put_slice(self.peer_id.as_bytes());

        let mut out = [0u8; HANDSHAKE_LEN];
        out.copy_from_slice(&buf);
        out
    }

    /// Deserialize a handshake from bytes
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        trace!("Deserializing handshake from {} bytes", data.len());

        if data.len() < HANDSHAKE_LEN {
            error!("Handshake too short: expected {} bytes, got {}", HANDSHAKE_LEN, data.len());
            return Err(TorrentError::handshake_failed(format!(
                "expected {} bytes, got {}",
                HANDSHAKE_LEN,
                data.len()
            )));
        }

        if data[0] != PROTOCOL_LENGTH || &data[1..20] != PROTOCOL_STRING.as_bytes() {
            error!("Invalid protocol header in handshake");
            return Err(TorrentError::handshake_failed("invalid protocol string"));
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[20..28]);

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&data[28..48]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);
        debug!("Handshake peer_id: {}", hex::encode(peer_id));

        Ok(Self {
            reserved,
            info_hash: InfoHash::from_bytes(info_hash),
            peer_id: PeerId::from_bytes(peer_id),
        })
    }

    /// Check that the remote echoed the info hash we asked for
    pub fn validate(&self, expected_info_hash: &InfoHash) -> Result<()> {
        if self.info_hash != *expected_info_hash {
            warn!("Handshake info hash mismatch");
            warn!("  Expected: {}", expected_info_hash);
            warn!("  Got:      {}", self.info_hash);
            return Err(TorrentError::handshake_failed(format!(
                "info hash mismatch: expected {}, got {}",
                expected_info_hash, self.info_hash
            )));
        }
        debug!("Handshake validation successful");
        Ok(())
    }
}
