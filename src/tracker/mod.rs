//! Tracker client module
//!
//! Announces to an HTTP tracker and resolves the compact peer list.

pub mod client;
pub mod request;
pub mod response;
pub mod transport;

pub use client::TrackerClient;
pub use request::{percent_encode, TrackerRequest};
pub use response::{parse_compact_peers, TrackerResponse};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::TrackerTransport;
