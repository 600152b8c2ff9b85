//! Storage module
//!
//! Piece boundary arithmetic and in-memory piece assembly.

pub mod piece;

pub use piece::{BlockRequest, PieceBuffer, PieceLayout, BLOCK_SIZE, MAX_PREALLOC};
