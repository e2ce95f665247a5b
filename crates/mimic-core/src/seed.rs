//! Deterministic seed derivation for reproducible sampling.
//!
//! ```text
//! Run seed
//! ├── "reference"  expert-batch time draws
//! └── "reset"      episode-reset time draws
//! ```
//!
//! Every random stream in the pipeline is a `ChaCha8Rng` seeded from a child
//! of the run seed, so a run is reproducible from a single number.

use std::hash::{DefaultHasher, Hash, Hasher};

use bevy::prelude::Resource;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Stream used by `collect_reference` when it draws its own times.
pub const REFERENCE_STREAM: &str = "reference";
/// Stream used to draw episode-reset times.
pub const RESET_STREAM: &str = "reset";

/// Derive a child seed from a parent seed and a string key.
///
/// # Example
///
/// ```
/// use mimic_core::seed::derive_seed;
///
/// let child = derive_seed(42, "reset");
/// assert_eq!(child, derive_seed(42, "reset"));
/// assert_ne!(child, derive_seed(42, "reference"));
/// ```
#[must_use]
pub fn derive_seed(parent: u64, key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    parent.hash(&mut hasher);
    key.hash(&mut hasher);
    hasher.finish()
}

/// Root seed plus named child streams.
#[derive(Debug, Clone, Resource)]
pub struct SeedHierarchy {
    root: u64,
}

impl SeedHierarchy {
    #[must_use]
    pub const fn new(root: u64) -> Self {
        Self { root }
    }

    #[must_use]
    pub const fn root(&self) -> u64 {
        self.root
    }

    /// Seed of the named stream.
    #[must_use]
    pub fn stream_seed(&self, stream: &str) -> u64 {
        derive_seed(self.root, stream)
    }

    /// Fresh RNG for the named stream.
    #[must_use]
    pub fn stream_rng(&self, stream: &str) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.stream_seed(stream))
    }
}

impl Default for SeedHierarchy {
    fn default() -> Self {
        Self::new(0)
    }
}
