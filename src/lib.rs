//! rust-torrent-core
//!
//! A minimal BitTorrent client core: bencode codec, torrent metadata and
//! info hash, HTTP tracker announce, and a single-peer download session.

pub mod bencode;
pub mod cli;
pub mod client;
pub mod download;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod storage;
pub mod torrent;
pub mod tracker;

pub use error::{Result, TorrentError};

pub use bencode::Value;
pub use client::{ClientConfig, TorrentClient};
pub use download::{DownloadStrategy, SequentialDownloader};
pub use peer::{PeerAddress, PeerId, PeerIdGenerator, PeerSession, SessionConfig, SessionState};
pub use protocol::{Handshake, Message, MessageId};
pub use storage::{BlockRequest, PieceBuffer, PieceLayout, BLOCK_SIZE};
pub use torrent::{InfoHash, TorrentMetadata, TorrentParser};
pub use tracker::{TrackerClient, TrackerRequest, TrackerResponse, TrackerTransport};
