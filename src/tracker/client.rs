//! Tracker client

use tracing::{debug, info};

use crate::error::Result;
use crate::peer::{PeerAddress, PeerId};
use crate::torrent::InfoHash;
use crate::tracker::request::TrackerRequest;
use crate::tracker::response::TrackerResponse;
use crate::tracker::transport::TrackerTransport;

/// Announces to a tracker over a [`TrackerTransport`]
pub struct TrackerClient<T> {
    transport: T,
}

impl<T: TrackerTransport> TrackerClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send an announce and decode the full response
    pub async fn announce(&self, request: &TrackerRequest) -> Result<TrackerResponse> {
        let url = request.to_url()?;
        info!("Announcing to tracker: {}", request.announce);
        debug!("Announce URL: {}", url);

        let body = self.transport.get(&url).await?;
        TrackerResponse::parse(&body)
    }

    /// Resolve the peer list for a torrent
    pub async fn query_peers(
        &self,
        announce: &str,
        info_hash: InfoHash,
        peer_id: PeerId,
        port: u16,
        left: u64,
    ) -> Result<Vec<PeerAddress>> {
        let request = TrackerRequest::new(announce, info_hash, peer_id, port, left);
        let response = self.announce(&request).await?;
        info!("Tracker returned {} peers", response.peers.len());
        Ok(response.peers)
    }
}
