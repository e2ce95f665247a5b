//! Shared test fixtures for mimic crates.
//!
//! Synthetic motion archives, matching configurations, and deterministic RNG
//! setup.

pub mod clips;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use clips::{three_frame_archive, walk_archive, walk_config};
pub use rng::seeded_rng;
