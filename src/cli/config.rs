//! CLI configuration module
//!
//! Folds parsed arguments into the library's configuration types.

use std::time::Duration;

use anyhow::Result;

use crate::cli::args::CliArgs;
use crate::client::ClientConfig;
use crate::peer::SessionConfig;

/// Configuration for one CLI invocation
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings handed to the client facade
    pub client: ClientConfig,
    /// Deadline for a tracker announce
    pub tracker_timeout: Duration,
    /// Print results as JSON
    pub json: bool,
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Config {
    /// Create configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Self {
        Self {
            client: ClientConfig {
                port: args.port,
                peer_index: args.peer_index,
                verify_pieces: !args.no_verify,
                session: SessionConfig {
                    connect_timeout: Duration::from_secs(args.connect_timeout),
                    read_timeout: Duration::from_secs(args.read_timeout),
                },
            },
            tracker_timeout: Duration::from_secs(args.tracker_timeout),
            json: args.json,
            verbose: args.verbose,
            quiet: args.quiet,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.client.port == 0 {
            return Err(anyhow::anyhow!("Port cannot be 0"));
        }
        if self.client.session.connect_timeout.is_zero() {
            return Err(anyhow::anyhow!("connect timeout must be at least 1 second"));
        }
        if self.client.session.read_timeout.is_zero() {
            return Err(anyhow::anyhow!("read timeout must be at least 1 second"));
        }
        if self.tracker_timeout.is_zero() {
            return Err(anyhow::anyhow!("tracker timeout must be at least 1 second"));
        }
        Ok(())
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}
