//! Bencode codec
//!
//! Decodes and canonically encodes the four bencode value kinds used by
//! torrent files and tracker responses.

pub mod decode;
pub mod encode;
pub mod value;

pub use decode::{decode, decode_at, MAX_DEPTH};
pub use encode::{encode, encode_into};
pub use value::{Dict, Value};
