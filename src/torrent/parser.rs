//! Torrent file parser
//!
//! Handles decoding of .torrent files and extracting metadata.

use std::path::Path;

use tracing::{debug, error, info, trace, warn};

use crate::bencode::decode_at;
use crate::error::{Result, TorrentError};
use crate::torrent::metainfo::TorrentMetadata;

/// Parser for .torrent files
pub struct TorrentParser;

impl TorrentParser {
    /// Parse a .torrent file from bytes
    pub fn parse_bytes(data: &[u8]) -> Result<TorrentMetadata> {
        info!("Parsing torrent file from {} bytes", data.len());
        trace!("Torrent data (first 100 bytes): {:?}", &data[..data.len().min(100)]);

        let (root, consumed) = decode_at(data, 0)?;
        if consumed != data.len() {
            warn!("Parsed {}/{} bytes, ignoring trailing data", consumed, data.len());
        }

        let metadata = TorrentMetadata::from_value(&root)?;
        info!("Parsed torrent with info hash {}", metadata.info_hash);
        Ok(metadata)
    }

    /// Parse a .torrent file from a file path
    pub fn parse_file(path: &Path) -> Result<TorrentMetadata> {
        info!("Loading torrent file from: {}", path.display());

        let data = std::fs::read(path).map_err(|e| {
            error!("Failed to read torrent file '{}': {}", path.display(), e);
            TorrentError::io_error_with_path(e.to_string(), path.display().to_string())
        })?;

        debug!("Read {} bytes from torrent file", data.len());
        Self::parse_bytes(&data)
    }
}
