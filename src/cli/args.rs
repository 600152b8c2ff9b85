//! CLI arguments module
//!
//! Defines command-line argument parsing using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::peer::PeerAddress;

/// CLI arguments for the torrent client
#[derive(Debug, Parser)]
#[command(name = "rust-torrent-core")]
#[command(about = "A minimal single-peer BitTorrent client", long_about = None, version)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Port reported to the tracker
    #[arg(long, global = true, default_value_t = 6881)]
    pub port: u16,

    /// Index into the tracker's peer list to download from
    #[arg(long, global = true, default_value_t = 0)]
    pub peer_index: usize,

    /// Peer connect timeout in seconds
    #[arg(long, global = true, value_name = "SECS", default_value_t = 10)]
    pub connect_timeout: u64,

    /// Peer read timeout in seconds
    #[arg(long, global = true, value_name = "SECS", default_value_t = 30)]
    pub read_timeout: u64,

    /// Tracker request timeout in seconds
    #[arg(long, global = true, value_name = "SECS", default_value_t = 30)]
    pub tracker_timeout: u64,

    /// Skip SHA-1 verification of downloaded pieces
    #[arg(long, global = true)]
    pub no_verify: bool,

    /// Print info, peers and handshake results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decode a bencoded string and print it as JSON
    Decode {
        /// Bencoded value, e.g. `l5:helloi52ee`
        value: String,
    },

    /// Print torrent metadata
    Info {
        /// Path to the .torrent file
        torrent: PathBuf,
    },

    /// List peers from the tracker
    Peers {
        /// Path to the .torrent file
        torrent: PathBuf,
    },

    /// Handshake with a peer and print its peer id
    Handshake {
        /// Path to the .torrent file
        torrent: PathBuf,
        /// Peer address as ip:port
        peer: PeerAddress,
    },

    /// Download a single piece
    #[command(name = "download_piece")]
    DownloadPiece {
        /// Output file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        /// Path to the .torrent file
        torrent: PathBuf,
        /// Zero-based piece index
        index: u32,
    },

    /// Download the whole file
    Download {
        /// Output file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        /// Path to the .torrent file
        torrent: PathBuf,
    },
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Get the log level based on verbosity settings
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::INFO
        }
    }
}
