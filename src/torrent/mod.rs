//! Torrent file handling module
//!
//! Interprets decoded `.torrent` dictionaries and derives the info hash.

pub mod info_hash;
pub mod metainfo;
pub mod parser;

pub use info_hash::InfoHash;
pub use metainfo::TorrentMetadata;
pub use parser::TorrentParser;
