// mimic-core: errors, configuration, shared types and seeds for the AMP pipeline.

pub mod config;
pub mod error;
pub mod seed;
pub mod types;

use bevy::prelude::*;

// ---------------------------------------------------------------------------
// MimicSet
// ---------------------------------------------------------------------------

/// Ordered stages of one environment step, after physics has advanced.
///
/// `Reset` runs strictly before `Record`, so partial resets never interleave
/// with the full-buffer shift-and-insert of the same step.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MimicSet {
    /// Re-seed environments that finished their episode.
    Reset,
    /// Encode the live frame and push it into the observation window.
    Record,
}

// ---------------------------------------------------------------------------
// MimicCorePlugin
// ---------------------------------------------------------------------------

/// Configures [`MimicSet`] ordering in the `Update` schedule.
pub struct MimicCorePlugin;

impl Plugin for MimicCorePlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(Update, (MimicSet::Reset, MimicSet::Record).chain());
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        MimicCorePlugin, MimicSet,
        config::{AmpConfig, FeatureTerm},
        error::{ArchiveError, ConfigError, MimicError, NameKind, UnknownNameError},
        seed::SeedHierarchy,
        types::{EnvId, Observation},
    };
}
