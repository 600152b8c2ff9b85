//! BitTorrent peer wire protocol
//!
//! Handshake framing, message types and the stream helpers that move them.

pub mod handshake;
pub mod message;
pub mod wire;

pub use handshake::{Handshake, HANDSHAKE_LEN, PROTOCOL_LENGTH, PROTOCOL_STRING};
pub use message::{Message, MessageId};
pub use wire::{read_handshake, read_message, write_handshake, write_message, MAX_FRAME_LEN};
