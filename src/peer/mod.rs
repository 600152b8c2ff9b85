//! Peer module
//!
//! Peer addressing, local peer ids and the single-connection session.

pub mod address;
pub mod peer_id;
pub mod session;

#[cfg(test)]
pub(crate) mod fake;

pub use address::PeerAddress;
pub use peer_id::{PeerId, PeerIdGenerator};
pub use session::{PeerSession, SessionConfig, SessionState};
