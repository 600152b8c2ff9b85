//! Peer session
//!
//! Drives one connection through handshake, bitfield, interested/unchoke and
//! then sequential block requests. Every request is answered before the next
//! one is sent.

use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Result, TorrentError};
use crate::peer::{PeerAddress, PeerId};
use crate::protocol::{read_handshake, read_message, write_handshake, write_message, Handshake, Message, MessageId};
use crate::storage::{BlockRequest, PieceBuffer, PieceLayout, BLOCK_SIZE};
use crate::torrent::InfoHash;

/// Deadlines applied to a session's socket operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub connect_timeout: Duration,
    /// Bounds each write and each wait for a message, keep-alives included
    pub read_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
        }
    }
}

/// Where a session is in the download protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHandshake,
    AwaitingBitfield,
    AwaitingUnchoke,
    Ready,
    Downloading,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::AwaitingHandshake => "awaiting handshake",
            SessionState::AwaitingBitfield => "awaiting bitfield",
            SessionState::AwaitingUnchoke => "awaiting unchoke",
            SessionState::Ready => "ready",
            SessionState::Downloading => "downloading",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A single connection to a remote peer
pub struct PeerSession<S> {
    stream: S,
    peer: String,
    info_hash: InfoHash,
    local_peer_id: PeerId,
    remote_peer_id: Option<PeerId>,
    bitfield: Option<Vec<u8>>,
    state: SessionState,
    config: SessionConfig,
}

impl PeerSession<TcpStream> {
    /// Open a TCP connection to `addr`; the handshake is not sent yet
    pub async fn connect(
        addr: PeerAddress,
        info_hash: InfoHash,
        local_peer_id: PeerId,
        config: SessionConfig,
    ) -> Result<Self> {
        info!("Connecting to peer: {}", addr);

        let stream = connect_within(addr, config.connect_timeout, TcpStream::connect(addr.socket_addr())).await?;

        debug!("Connected to peer: {}", addr);
        Ok(Self::new(stream, addr.to_string(), info_hash, local_peer_id, config))
    }
}

/// Await `connecting` for at most `limit`, mapping failures onto `addr`
async fn connect_within<T, F>(addr: PeerAddress, limit: Duration, connecting: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    timeout(limit, connecting)
        .await
        .map_err(|_| {
            warn!("Connection timeout to {}", addr);
            TorrentError::timeout_with_peer("connect", addr.to_string())
        })?
        .map_err(|e| {
            error!("Failed to connect to {}: {}", addr, e);
            TorrentError::io_error(format!("failed to connect to {}: {}", addr, e))
        })
}

impl<S: AsyncRead + AsyncWrite + Unpin> PeerSession<S> {
    /// Wrap an already connected stream
    pub fn new(
        stream: S,
        peer: impl Into<String>,
        info_hash: InfoHash,
        local_peer_id: PeerId,
        config: SessionConfig,
    ) -> Self {
        Self {
            stream,
            peer: peer.into(),
            info_hash,
            local_peer_id,
            remote_peer_id: None,
            bitfield: None,
            state: SessionState::AwaitingHandshake,
            config,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Peer id learned from the handshake
    pub fn remote_peer_id(&self) -> Option<PeerId> {
        self.remote_peer_id
    }

    /// Exchange handshakes and return the remote peer id
    pub async fn handshake(&mut self) -> Result<PeerId> {
        self.expect_state(SessionState::AwaitingHandshake)?;
        info!("Performing handshake with peer: {}", self.peer);

        let ours = Handshake::new(self.info_hash, self.local_peer_id);
        debug!("Sending handshake to peer: {}", self.peer);
        match timeout(self.config.read_timeout, write_handshake(&mut self.stream, &ours)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.fail(e)),
            Err(_) => {
                let err = TorrentError::timeout("sending handshake");
                return Err(self.fail(err));
            }
        }

        debug!("Reading handshake from peer: {}", self.peer);
        let theirs = match timeout(self.config.read_timeout, read_handshake(&mut self.stream)).await {
            Ok(Ok(handshake)) => handshake,
            Ok(Err(e)) => return Err(self.fail(e)),
            Err(_) => {
                let err = TorrentError::timeout("reading handshake");
                return Err(self.fail(err));
            }
        };

        if let Err(e) = theirs.validate(&self.info_hash) {
            return Err(self.fail(e));
        }

        self.remote_peer_id = Some(theirs.peer_id);
        self.state = SessionState::AwaitingBitfield;
        info!("Handshake completed with peer {} (peer id {})", self.peer, theirs.peer_id);
        Ok(theirs.peer_id)
    }

    /// Read the peer's opening bitfield
    pub async fn await_bitfield(&mut self) -> Result<()> {
        self.expect_state(SessionState::AwaitingBitfield)?;

        match self.next_message().await? {
            Message::Bitfield { bitfield } => {
                debug!("Peer {} sent {} byte bitfield", self.peer, bitfield.len());
                self.bitfield = Some(bitfield);
                self.state = SessionState::AwaitingUnchoke;
                Ok(())
            }
            other => Err(self.unexpected(MessageId::Bitfield, &other)),
        }
    }

    /// Whether the peer's bitfield advertises piece `index`
    pub fn has_piece(&self, index: u32) -> bool {
        let Some(bitfield) = &self.bitfield else {
            return false;
        };
        let byte = (index / 8) as usize;
        let bit = 7 - (index % 8);
        bitfield.get(byte).is_some_and(|b| (b >> bit) & 1 == 1)
    }

    /// Declare interest and wait for the peer to unchoke us
    pub async fn send_interested_and_await_unchoke(&mut self) -> Result<()> {
        self.expect_state(SessionState::AwaitingUnchoke)?;

        debug!("Sending Interested to peer: {}", self.peer);
        self.send(&Message::Interested).await?;

        match self.next_message().await? {
            Message::Unchoke => {
                info!("Peer {} unchoked us", self.peer);
                self.state = SessionState::Ready;
                Ok(())
            }
            other => Err(self.unexpected(MessageId::Unchoke, &other)),
        }
    }

    /// Request one block and wait for its `piece` reply
    pub async fn request_block(&mut self, request: BlockRequest) -> Result<Vec<u8>> {
        if !matches!(self.state, SessionState::Ready | SessionState::Downloading) {
            return Err(self.wrong_state(SessionState::Ready));
        }
        if request.length == 0 || request.length > BLOCK_SIZE {
            return Err(TorrentError::invalid_field(
                "block length",
                format!("{} is outside 1..={}", request.length, BLOCK_SIZE),
            ));
        }

        trace!(
            "Requesting piece {} block at {} ({} bytes) from {}",
            request.index, request.begin, request.length, self.peer
        );
        self.send(&Message::Request {
            index: request.index,
            begin: request.begin,
            length: request.length,
        })
        .await?;

        match self.next_message().await? {
            Message::Piece { index, begin, block } => {
                if index != request.index || begin != request.begin {
                    let err = TorrentError::protocol_error(format!(
                        "requested piece {} offset {}, received piece {} offset {}",
                        request.index, request.begin, index, begin
                    ));
                    return Err(self.fail(err));
                }
                if block.len() != request.length as usize {
                    let err = TorrentError::protocol_error(format!(
                        "requested {} bytes, received {}",
                        request.length,
                        block.len()
                    ));
                    return Err(self.fail(err));
                }
                Ok(block)
            }
            other => Err(self.unexpected(MessageId::Piece, &other)),
        }
    }

    /// Download every block of piece `index` in offset order
    pub async fn download_piece(&mut self, index: u32, layout: &PieceLayout) -> Result<PieceBuffer> {
        self.expect_state(SessionState::Ready)?;

        if !self.has_piece(index) {
            warn!("Peer {} did not advertise piece {}, requesting anyway", self.peer, index);
        }

        let blocks = layout.blocks(index)?;
        let piece_size = layout.piece_size(index)? as usize;
        debug!("Downloading piece {} ({} bytes, {} blocks) from {}", index, piece_size, blocks.len(), self.peer);

        self.state = SessionState::Downloading;
        let mut buffer = PieceBuffer::new(index, piece_size);
        for request in blocks {
            let block = self.request_block(request).await?;
            if let Err(e) = buffer.push_block(request.begin, &block) {
                return Err(self.fail(e));
            }
        }
        self.state = SessionState::Ready;

        info!("Downloaded piece {} ({} bytes) from {}", index, buffer.len(), self.peer);
        Ok(buffer)
    }

    /// Shut the stream down; the session cannot be used afterwards
    pub async fn close(mut self) -> Result<()> {
        info!("Closing connection to peer: {}", self.peer);
        self.state = SessionState::Closed;
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn send(&mut self, message: &Message) -> Result<()> {
        match timeout(self.config.read_timeout, write_message(&mut self.stream, message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("Failed to send {:?} to {}: {}", message.message_id(), self.peer, e);
                Err(self.fail(e))
            }
            Err(_) => {
                warn!("Send timeout to peer: {}", self.peer);
                let err = TorrentError::timeout("sending message");
                Err(self.fail(err))
            }
        }
    }

    /// Next non-keep-alive message; keep-alives do not extend the deadline
    async fn next_message(&mut self) -> Result<Message> {
        let deadline = Instant::now() + self.config.read_timeout;
        loop {
            let message = match timeout_at(deadline, read_message(&mut self.stream)).await {
                Ok(Ok(message)) => message,
                Ok(Err(e)) => {
                    error!("Failed to read message from {}: {}", self.peer, e);
                    return Err(self.fail(e));
                }
                Err(_) => {
                    warn!("Receive message timeout from peer: {}", self.peer);
                    let err = TorrentError::timeout("reading message");
                    return Err(self.fail(err));
                }
            };

            if message == Message::KeepAlive {
                trace!("Skipping keep-alive from {}", self.peer);
                continue;
            }
            debug!("Received {:?} message from peer: {}", message.message_id(), self.peer);
            return Ok(message);
        }
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        if self.state != expected {
            return Err(self.wrong_state(expected));
        }
        Ok(())
    }

    fn wrong_state(&self, expected: SessionState) -> TorrentError {
        error!("Session with {} is {}, expected {}", self.peer, self.state, expected);
        TorrentError::protocol_error(format!("session is {}, expected {}", self.state, expected))
            .with_peer(self.peer.clone())
    }

    fn unexpected(&mut self, expected: MessageId, received: &Message) -> TorrentError {
        // Keep-alives never reach here, so the id is always present
        let received_id = received.message_id().map_or(u8::MAX, |id| id as u8);
        error!(
            "Expected {:?} from {}, received {:?}",
            expected,
            self.peer,
            received.message_id()
        );
        self.fail(TorrentError::unexpected_message(expected as u8, received_id))
    }

    /// Close the session after an unrecoverable error
    fn fail(&mut self, err: TorrentError) -> TorrentError {
        self.state = SessionState::Closed;
        err.with_peer(self.peer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::fake::FakePeer;
    use sha1::{Digest, Sha1};

    fn test_data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn session<S: AsyncRead + AsyncWrite + Unpin>(stream: S, info_hash: InfoHash) -> PeerSession<S> {
        PeerSession::new(stream, "fake-peer", info_hash, PeerId::from_bytes([1; 20]), SessionConfig::default())
    }

    #[tokio::test]
    async fn test_handshake_returns_remote_id() {
        let info_hash = InfoHash::from_bytes([7; 20]);
        let (client, server) = tokio::io::duplex(1 << 16);
        let peer = FakePeer::new(test_data(100), 100);
        let remote_id = peer.peer_id;
        tokio::spawn(peer.serve(server));

        let mut session = session(client, info_hash);
        assert_eq!(session.handshake().await.unwrap(), remote_id);
        assert_eq!(session.state(), SessionState::AwaitingBitfield);
        assert_eq!(session.remote_peer_id(), Some(remote_id));
    }

    #[tokio::test]
    async fn test_handshake_info_hash_mismatch() {
        let (client, server) = tokio::io::duplex(1 << 16);
        let mut peer = FakePeer::new(test_data(100), 100);
        peer.reply_info_hash = Some(InfoHash::from_bytes([0xee; 20]));
        tokio::spawn(peer.serve(server));

        let mut session = session(client, InfoHash::from_bytes([7; 20]));
        let err = session.handshake().await.unwrap_err();
        match err {
            TorrentError::HandshakeFailed { peer, .. } => assert_eq!(peer.as_deref(), Some("fake-peer")),
            other => panic!("Wrong error type: {:?}", other),
        }
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_handshake_short_read() {
        let (client, mut server) = tokio::io::duplex(1 << 16);
        tokio::spawn(async move {
            let _ = server.write_all(&[19, b'B', b'i', b't']).await;
            // dropping the stream closes it mid-handshake
        });

        let mut session = session(client, InfoHash::from_bytes([7; 20]));
        assert!(matches!(
            session.handshake().await,
            Err(TorrentError::HandshakeFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_wrong_message_instead_of_bitfield() {
        let info_hash = InfoHash::from_bytes([7; 20]);
        let (client, mut server) = tokio::io::duplex(1 << 16);
        tokio::spawn(async move {
            let theirs = read_handshake(&mut server).await.unwrap();
            let reply = Handshake::new(theirs.info_hash, PeerId::from_bytes([2; 20]));
            write_handshake(&mut server, &reply).await.unwrap();
            write_message(&mut server, &Message::Unchoke).await.unwrap();
            // hold the stream open until the client is done
            let _ = read_message(&mut server).await;
        });

        let mut session = session(client, info_hash);
        session.handshake().await.unwrap();
        let err = session.await_bitfield().await.unwrap_err();
        assert!(matches!(
            err,
            TorrentError::ProtocolError { expected: Some(5), received: Some(1), .. }
        ));
    }

    #[tokio::test]
    async fn test_block_round_trip() {
        let info_hash = InfoHash::from_bytes([7; 20]);
        let data = test_data(16384);
        let (client, server) = tokio::io::duplex(1 << 16);
        tokio::spawn(FakePeer::new(data.clone(), 16384).serve(server));

        let mut session = session(client, info_hash);
        session.handshake().await.unwrap();
        session.await_bitfield().await.unwrap();
        assert!(session.has_piece(0));
        session.send_interested_and_await_unchoke().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);

        let block = session
            .request_block(BlockRequest { index: 0, begin: 0, length: 16384 })
            .await
            .unwrap();
        assert_eq!(block.len(), 16384);
        assert_eq!(block, data);
    }

    #[tokio::test]
    async fn test_download_last_piece() {
        // 40000 bytes in 32 KiB pieces: the last piece is 7232 bytes in one block
        let info_hash = InfoHash::from_bytes([7; 20]);
        let data = test_data(40000);
        let layout = PieceLayout::new(40000, 32768).unwrap();
        let (client, server) = tokio::io::duplex(1 << 16);
        let mut peer = FakePeer::new(data.clone(), 32768);
        peer.keep_alive_first = true;
        tokio::spawn(peer.serve(server));

        let mut session = session(client, info_hash);
        session.handshake().await.unwrap();
        session.await_bitfield().await.unwrap();
        session.send_interested_and_await_unchoke().await.unwrap();

        let first = session.download_piece(0, &layout).await.unwrap();
        let expected: [u8; 20] = Sha1::digest(&data[..32768]).into();
        first.verify(&expected).unwrap();

        let last = session.download_piece(1, &layout).await.unwrap();
        assert_eq!(last.len(), 7232);
        assert_eq!(last.into_bytes(), data[32768..].to_vec());
        assert_eq!(session.state(), SessionState::Ready);

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_calls_rejected() {
        let (client, _server) = tokio::io::duplex(64);
        let mut session = session(client, InfoHash::from_bytes([7; 20]));
        let err = session.await_bitfield().await.unwrap_err();
        assert!(matches!(err, TorrentError::ProtocolError { .. }));

        let err = session
            .request_block(BlockRequest { index: 0, begin: 0, length: 16384 })
            .await
            .unwrap_err();
        assert!(matches!(err, TorrentError::ProtocolError { .. }));
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let (client, _server) = tokio::io::duplex(1 << 16);
        let mut session = PeerSession::new(
            client,
            "silent-peer",
            InfoHash::from_bytes([7; 20]),
            PeerId::from_bytes([1; 20]),
            SessionConfig {
                connect_timeout: Duration::from_secs(1),
                read_timeout: Duration::from_millis(50),
            },
        );
        let err = session.handshake().await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(session.state(), SessionState::Closed);
    }

    fn short_deadlines() -> SessionConfig {
        SessionConfig {
            connect_timeout: Duration::from_millis(50),
            read_timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_keep_alives_do_not_extend_deadline() {
        let info_hash = InfoHash::from_bytes([7; 20]);
        let (client, mut server) = tokio::io::duplex(1 << 16);
        tokio::spawn(async move {
            read_handshake(&mut server).await.unwrap();
            write_handshake(&mut server, &Handshake::new(info_hash, PeerId::from_bytes([2; 20])))
                .await
                .unwrap();
            while write_message(&mut server, &Message::KeepAlive).await.is_ok() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        });

        let mut session = PeerSession::new(client, "chatty-peer", info_hash, PeerId::from_bytes([1; 20]), short_deadlines());
        session.handshake().await.unwrap();
        let err = tokio::time::timeout(Duration::from_secs(2), session.await_bitfield())
            .await
            .expect("keep-alives kept the session waiting")
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_stalled_write_times_out() {
        // Nobody drains the far end, so the 68-byte handshake cannot fit
        let (client, _server) = tokio::io::duplex(8);
        let mut session = PeerSession::new(
            client,
            "stalled-peer",
            InfoHash::from_bytes([7; 20]),
            PeerId::from_bytes([1; 20]),
            short_deadlines(),
        );
        let err = session.handshake().await.unwrap_err();
        assert_eq!(err, TorrentError::timeout_with_peer("sending handshake", "stalled-peer"));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let addr: PeerAddress = "10.0.0.1:6881".parse().unwrap();
        let pending = std::future::pending::<io::Result<()>>();
        let err = connect_within(addr, Duration::from_millis(20), pending).await.unwrap_err();
        assert_eq!(err, TorrentError::timeout_with_peer("connect", "10.0.0.1:6881"));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let addr: PeerAddress = "127.0.0.1:1".parse().unwrap();
        let refused = async { Err::<(), _>(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")) };
        let err = connect_within(addr, Duration::from_secs(1), refused).await.unwrap_err();
        assert!(matches!(err, TorrentError::IoError { .. }), "{:?}", err);
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_has_piece_bit_order() {
        let (client, _server) = tokio::io::duplex(64);
        let mut session = session(client, InfoHash::from_bytes([7; 20]));
        assert!(!session.has_piece(0));
        session.bitfield = Some(vec![0b1000_0001, 0b0100_0000]);
        assert!(session.has_piece(0));
        assert!(!session.has_piece(1));
        assert!(session.has_piece(7));
        assert!(session.has_piece(9));
        assert!(!session.has_piece(16));
    }
}
