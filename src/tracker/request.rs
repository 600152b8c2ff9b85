//! Tracker announce request

use url::Url;

use crate::error::Result;
use crate::peer::PeerId;
use crate::torrent::InfoHash;

/// Parameters of a tracker announce
#[derive(Debug, Clone)]
pub struct TrackerRequest {
    pub announce: String,
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
    pub port: u16,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
}

impl TrackerRequest {
    /// Announce for a fresh download: nothing transferred yet
    pub fn new(announce: impl Into<String>, info_hash: InfoHash, peer_id: PeerId, port: u16, left: u64) -> Self {
        Self {
            announce: announce.into(),
            info_hash,
            peer_id,
            port,
            uploaded: 0,
            downloaded: 0,
            left,
        }
    }

    /// Build the GET URL.
    ///
    /// `info_hash` and `peer_id` are raw bytes, so every byte is written as
    /// `%XX` rather than going through a text encoder.
    pub fn to_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.announce)?;

        let params = format!(
            "peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact=1&info_hash={}",
            percent_encode(self.peer_id.as_bytes()),
            self.port,
            self.uploaded,
            self.downloaded,
            self.left,
            percent_encode(self.info_hash.as_bytes()),
        );

        let query = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{}&{}", existing, params),
            _ => params,
        };
        url.set_query(Some(&query));
        Ok(url)
    }
}

/// Percent-encode every byte as `%XX`
pub fn percent_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("%{:02X}", b)).collect()
}
