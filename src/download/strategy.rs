//! Sequential single-peer downloader

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::error::{Result, TorrentError};
use crate::peer::{PeerSession, SessionState};
use crate::storage::{PieceLayout, MAX_PREALLOC};
use crate::torrent::TorrentMetadata;

/// Pulls piece data for one torrent
#[async_trait]
pub trait DownloadStrategy: Send {
    /// Download and return one piece
    async fn download_piece(&mut self, index: u32) -> Result<Vec<u8>>;

    /// Download every piece and return the file contents in order
    async fn download_all(&mut self) -> Result<Vec<u8>>;
}

/// Callback invoked after each completed piece with `(index, bytes so far, total)`
pub type ProgressFn = Box<dyn FnMut(u32, u64, u64) + Send>;

/// Downloads pieces one at a time, in index order, over a single session
pub struct SequentialDownloader<'a, S> {
    session: PeerSession<S>,
    metadata: &'a TorrentMetadata,
    layout: PieceLayout,
    verify_pieces: bool,
    progress: Option<ProgressFn>,
}

impl<'a, S: AsyncRead + AsyncWrite + Unpin + Send> SequentialDownloader<'a, S> {
    pub fn new(session: PeerSession<S>, metadata: &'a TorrentMetadata, verify_pieces: bool) -> Result<Self> {
        Ok(Self {
            layout: metadata.layout()?,
            session,
            metadata,
            verify_pieces,
            progress: None,
        })
    }

    /// Report completed pieces through `progress`
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Hand the session back, e.g. to close it
    pub fn into_session(self) -> PeerSession<S> {
        self.session
    }

    /// Bring the session from a fresh connection up to `Ready`
    async fn ensure_ready(&mut self) -> Result<()> {
        if self.session.state() == SessionState::AwaitingHandshake {
            self.session.handshake().await?;
        }
        if self.session.state() == SessionState::AwaitingBitfield {
            self.session.await_bitfield().await?;
        }
        if self.session.state() == SessionState::AwaitingUnchoke {
            self.session.send_interested_and_await_unchoke().await?;
        }
        Ok(())
    }

    async fn fetch_piece(&mut self, index: u32) -> Result<Vec<u8>> {
        let buffer = self.session.download_piece(index, &self.layout).await?;

        if self.verify_pieces {
            let expected = self.metadata.piece_hash(index).ok_or_else(|| {
                TorrentError::invalid_field("pieces", format!("no hash for piece {}", index))
            })?;
            buffer.verify(&expected)?;
        } else {
            debug!("Skipping verification of piece {}", index);
        }
        Ok(buffer.into_bytes())
    }
}

#[async_trait]
impl<'a, S: AsyncRead + AsyncWrite + Unpin + Send> DownloadStrategy for SequentialDownloader<'a, S> {
    async fn download_piece(&mut self, index: u32) -> Result<Vec<u8>> {
        self.ensure_ready().await?;
        let piece = self.fetch_piece(index).await?;
        if let Some(progress) = self.progress.as_mut() {
            progress(index, piece.len() as u64, piece.len() as u64);
        }
        Ok(piece)
    }

    async fn download_all(&mut self) -> Result<Vec<u8>> {
        self.ensure_ready().await?;

        let total = self.layout.total_length();
        let piece_count = self.layout.piece_count();
        info!("Downloading {} pieces ({} bytes)", piece_count, total);

        let reserve = usize::try_from(total).unwrap_or(usize::MAX).min(MAX_PREALLOC);
        let mut data = Vec::with_capacity(reserve);
        for index in 0..piece_count {
            let piece = self.fetch_piece(index).await?;
            data.extend_from_slice(&piece);
            if let Some(progress) = self.progress.as_mut() {
                progress(index, data.len() as u64, total);
            }
        }

        info!("Download complete: {} bytes", data.len());
        Ok(data)
    }
}
