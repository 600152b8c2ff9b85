//! Local peer identifiers

use std::fmt;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Serialize, Serializer};
use tracing::debug;

/// A 20-byte peer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId([u8; 20]);

impl PeerId {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Produces peer ids from an explicitly seeded RNG.
///
/// Production code seeds from OS entropy; tests pass a fixed seed to get
/// reproducible ids.
#[derive(Debug, Clone)]
pub struct PeerIdGenerator {
    rng: StdRng,
}

impl PeerIdGenerator {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Draw 20 fresh random bytes
    pub fn next_id(&mut self) -> PeerId {
        let mut bytes = [0u8; 20];
        self.rng.fill_bytes(&mut bytes);
        let id = PeerId(bytes);
        debug!("Generated peer ID: {}", id);
        id
    }
}
