//! Download strategies
//!
//! How pieces are pulled from peers. Only a sequential single-peer strategy
//! exists today.

pub mod strategy;

pub use strategy::{DownloadStrategy, SequentialDownloader};
