//! Torrent client facade
//!
//! Wires metadata, tracker, peer session and download strategy together
//! for the command-line operations.

use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::download::strategy::ProgressFn;
use crate::download::{DownloadStrategy, SequentialDownloader};
use crate::error::{Result, TorrentError};
use crate::peer::{PeerAddress, PeerId, PeerIdGenerator, PeerSession, SessionConfig};
use crate::torrent::TorrentMetadata;
use crate::tracker::{TrackerClient, TrackerTransport};

/// Client-wide settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Port reported to the tracker
    pub port: u16,
    /// Which tracker peer to download from
    pub peer_index: usize,
    /// Check every piece against its SHA-1
    pub verify_pieces: bool,
    /// Socket deadlines
    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: 6881,
            peer_index: 0,
            verify_pieces: true,
            session: SessionConfig::default(),
        }
    }
}

/// High-level operations over one tracker transport
pub struct TorrentClient<T> {
    tracker: TrackerClient<T>,
    config: ClientConfig,
    peer_id: PeerId,
}

impl<T: TrackerTransport> TorrentClient<T> {
    pub fn new(transport: T, config: ClientConfig, peer_ids: &mut PeerIdGenerator) -> Self {
        let peer_id = peer_ids.next_id();
        info!("Client peer ID: {}", peer_id);
        Self {
            tracker: TrackerClient::new(transport),
            config,
            peer_id,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Ask the tracker for peers
    pub async fn peers(&self, metadata: &TorrentMetadata) -> Result<Vec<PeerAddress>> {
        self.tracker
            .query_peers(
                &metadata.announce,
                metadata.info_hash,
                self.peer_id,
                self.config.port,
                metadata.length,
            )
            .await
    }

    /// Handshake with `addr` and return its peer id
    pub async fn handshake(&self, metadata: &TorrentMetadata, addr: PeerAddress) -> Result<PeerId> {
        let mut session = self.connect(metadata, addr).await?;
        let remote = session.handshake().await?;
        if let Err(e) = session.close().await {
            debug!("Ignoring close error after handshake: {}", e);
        }
        Ok(remote)
    }

    /// Download a single piece from the configured peer
    pub async fn download_piece(&self, metadata: &TorrentMetadata, index: u32) -> Result<Vec<u8>> {
        // Reject bad indices before touching the network
        metadata.layout()?.piece_size(index)?;

        let addr = self.select_peer(metadata).await?;
        let session = self.connect(metadata, addr).await?;
        let mut downloader = SequentialDownloader::new(session, metadata, self.config.verify_pieces)?;
        let piece = downloader.download_piece(index).await?;
        self.finish(downloader).await;
        Ok(piece)
    }

    /// Download the whole file from the configured peer
    pub async fn download(&self, metadata: &TorrentMetadata, progress: Option<ProgressFn>) -> Result<Vec<u8>> {
        let addr = self.select_peer(metadata).await?;
        let session = self.connect(metadata, addr).await?;
        let mut downloader = SequentialDownloader::new(session, metadata, self.config.verify_pieces)?;
        if let Some(progress) = progress {
            downloader = downloader.with_progress(progress);
        }
        let data = downloader.download_all().await?;
        self.finish(downloader).await;
        Ok(data)
    }

    async fn select_peer(&self, metadata: &TorrentMetadata) -> Result<PeerAddress> {
        let peers = self.peers(metadata).await?;
        let index = self.config.peer_index;
        peers.get(index).copied().ok_or_else(|| {
            warn!("Peer index {} requested but tracker returned {} peers", index, peers.len());
            TorrentError::invalid_field(
                "peer index",
                format!("{} out of range for {} peers", index, peers.len()),
            )
        })
    }

    async fn connect(&self, metadata: &TorrentMetadata, addr: PeerAddress) -> Result<PeerSession<TcpStream>> {
        PeerSession::connect(addr, metadata.info_hash, self.peer_id, self.config.session).await
    }

    async fn finish(&self, downloader: SequentialDownloader<'_, TcpStream>) {
        if let Err(e) = downloader.into_session().close().await {
            debug!("Ignoring close error after download: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::{Dict, Value};
    use crate::peer::fake::FakePeer;
    use crate::tracker::client::tests::MockTransport;
    use sha1::{Digest, Sha1};
    use tokio::net::TcpListener;

    fn sample_data() -> Vec<u8> {
        (0..40000u32).map(|i| (i % 251) as u8).collect()
    }

    fn metadata_for(data: &[u8]) -> TorrentMetadata {
        let pieces: Vec<u8> = data.chunks(32768).flat_map(|c| Sha1::digest(c).to_vec()).collect();
        let mut info = Dict::new();
        info.insert(b"length".to_vec(), Value::Integer(data.len() as i64));
        info.insert(b"piece length".to_vec(), Value::Integer(32768));
        info.insert(b"pieces".to_vec(), Value::Bytes(pieces));
        let mut root = Dict::new();
        root.insert(b"announce".to_vec(), Value::from("http://tracker.example.com/announce"));
        root.insert(b"info".to_vec(), Value::Dict(info));
        TorrentMetadata::from_value(&Value::Dict(root)).unwrap()
    }

    fn compact_body(port: u16) -> Vec<u8> {
        let mut body = b"d8:intervali60e5:peers6:".to_vec();
        body.extend_from_slice(&[127, 0, 0, 1]);
        body.extend_from_slice(&port.to_be_bytes());
        body.push(b'e');
        body
    }

    /// Accept one connection and serve `data` on it
    async fn spawn_peer(data: Vec<u8>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let _ = FakePeer::new(data, 32768).serve(stream).await;
        });
        port
    }

    fn client(port: u16) -> TorrentClient<MockTransport> {
        let mut ids = PeerIdGenerator::from_seed(1);
        TorrentClient::new(MockTransport::new(Ok(compact_body(port))), ClientConfig::default(), &mut ids)
    }

    #[tokio::test]
    async fn test_handshake_over_tcp() {
        let data = sample_data();
        let metadata = metadata_for(&data);
        let port = spawn_peer(data).await;
        let client = client(port);

        let peers = client.peers(&metadata).await.unwrap();
        assert_eq!(peers, vec![PeerAddress::new([127, 0, 0, 1].into(), port)]);

        let remote = client.handshake(&metadata, peers[0]).await.unwrap();
        assert_eq!(&remote.as_bytes()[..6], b"-FAKE0");
    }

    #[tokio::test]
    async fn test_download_piece_over_tcp() {
        let data = sample_data();
        let metadata = metadata_for(&data);
        let port = spawn_peer(data.clone()).await;

        let piece = client(port).download_piece(&metadata, 1).await.unwrap();
        assert_eq!(piece, data[32768..].to_vec());
        assert_eq!(
            hex::encode(Sha1::digest(&piece)),
            "7b9d67e14ed5a5e1695fac5611004b00d76da5ae"
        );
    }

    #[tokio::test]
    async fn test_download_over_tcp() {
        let data = sample_data();
        let metadata = metadata_for(&data);
        let port = spawn_peer(data.clone()).await;

        let downloaded = client(port).download(&metadata, None).await.unwrap();
        assert_eq!(downloaded, data);
    }

    #[tokio::test]
    async fn test_invalid_piece_index_is_rejected_early() {
        let metadata = metadata_for(&sample_data());
        let client = client(1);
        let err = client.download_piece(&metadata, 5).await.unwrap_err();
        assert!(matches!(err, TorrentError::InvalidField { .. }));
        assert!(client.tracker_requests().is_empty());
    }

    #[tokio::test]
    async fn test_peer_index_out_of_range() {
        let metadata = metadata_for(&sample_data());
        let mut ids = PeerIdGenerator::from_seed(1);
        let config = ClientConfig { peer_index: 3, ..ClientConfig::default() };
        let client = TorrentClient::new(MockTransport::new(Ok(compact_body(1))), config, &mut ids);
        let err = client.download(&metadata, None).await.unwrap_err();
        assert!(matches!(err, TorrentError::InvalidField { .. }));
    }

    impl TorrentClient<MockTransport> {
        fn tracker_requests(&self) -> Vec<url::Url> {
            self.tracker.transport().requests.lock().unwrap().clone()
        }
    }
}
