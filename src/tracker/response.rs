//! Tracker announce response

use tracing::{debug, warn};

use crate::bencode::{decode_at, Value};
use crate::error::{Result, TorrentError};
use crate::peer::PeerAddress;

/// Size of one peer in the compact format
pub const COMPACT_PEER_LEN: usize = 6;

/// Decoded tracker response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerResponse {
    /// Seconds the tracker wants between announces
    pub interval: Option<u64>,
    pub min_interval: Option<u64>,
    /// Seeders
    pub complete: Option<u64>,
    /// Leechers
    pub incomplete: Option<u64>,
    pub warning_message: Option<String>,
    pub peers: Vec<PeerAddress>,
}

impl TrackerResponse {
    /// Parse a bencoded tracker response body
    pub fn parse(body: &[u8]) -> Result<Self> {
        let (value, consumed) = decode_at(body, 0).map_err(|e| {
            TorrentError::malformed_response(format!("response is not valid bencode: {}", e))
        })?;
        if consumed != body.len() {
            warn!("Ignoring {} trailing bytes in tracker response", body.len() - consumed);
        }

        let dict = value.as_dict().ok_or_else(|| {
            TorrentError::malformed_response(format!("expected a dictionary, got {}", value.kind()))
        })?;

        if let Some(reason) = dict.get(b"failure reason".as_slice()).and_then(Value::as_bytes) {
            return Err(TorrentError::tracker_failure(String::from_utf8_lossy(reason)));
        }

        let peers = dict
            .get(b"peers".as_slice())
            .and_then(Value::as_bytes)
            .ok_or_else(|| TorrentError::malformed_response("missing compact 'peers' byte string"))?;

        let count = |key: &[u8]| {
            dict.get(key)
                .and_then(Value::as_integer)
                .and_then(|v| u64::try_from(v).ok())
        };

        let response = Self {
            interval: count(b"interval"),
            min_interval: count(b"min interval"),
            complete: count(b"complete"),
            incomplete: count(b"incomplete"),
            warning_message: dict
                .get(b"warning message".as_slice())
                .and_then(Value::as_bytes)
                .map(|b| String::from_utf8_lossy(b).into_owned()),
            peers: parse_compact_peers(peers)?,
        };

        if let Some(warning) = &response.warning_message {
            warn!("Tracker warning: {}", warning);
        }
        debug!("Tracker returned {} peers (interval {:?})", response.peers.len(), response.interval);
        Ok(response)
    }
}

/// Parse the compact peer list, 6 bytes per peer
pub fn parse_compact_peers(data: &[u8]) -> Result<Vec<PeerAddress>> {
    if data.len() % COMPACT_PEER_LEN != 0 {
        return Err(TorrentError::malformed_response(format!(
            "compact peer list length {} is not a multiple of {}",
            data.len(),
            COMPACT_PEER_LEN
        )));
    }

    Ok(data
        .chunks_exact(COMPACT_PEER_LEN)
        .filter_map(PeerAddress::from_compact)
        .collect())
}
