use std::collections::HashSet;
use std::path::{Path, PathBuf};

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::types::MAX_ENVS;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_num_amp_observations() -> usize {
    2
}
const fn default_root_lift() -> f32 {
    0.05
}
const fn default_num_envs() -> usize {
    1
}

// ---------------------------------------------------------------------------
// FeatureTerm
// ---------------------------------------------------------------------------

/// One block of the per-frame style feature vector.
///
/// A configuration declares an ordered list of terms; the encoder resolves
/// that list into function handles once, at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureTerm {
    /// World Z of the reference body (1 value).
    RootHeight,
    /// Reference-body rotation applied to the X and Z axes (6 values).
    RootTangentNormal,
    /// Reference-body linear velocity (3 values).
    RootLinearVelocity,
    /// Reference-body angular velocity (3 values).
    RootAngularVelocity,
    /// Joint positions in canonical order (one per joint).
    DofPositions,
    /// Joint velocities in canonical order (one per joint).
    DofVelocities,
    /// Key-body positions relative to the reference body (3 per key body).
    KeyBodyPositions,
}

impl FeatureTerm {
    /// The AMP style layout. The discriminator is trained against this order.
    pub const AMP_STYLE: [Self; 7] = [
        Self::RootHeight,
        Self::RootTangentNormal,
        Self::RootLinearVelocity,
        Self::RootAngularVelocity,
        Self::DofPositions,
        Self::DofVelocities,
        Self::KeyBodyPositions,
    ];

    /// Number of values this term contributes.
    #[must_use]
    pub const fn dim(self, num_dofs: usize, num_key_bodies: usize) -> usize {
        match self {
            Self::RootHeight => 1,
            Self::RootTangentNormal => 6,
            Self::RootLinearVelocity | Self::RootAngularVelocity => 3,
            Self::DofPositions | Self::DofVelocities => num_dofs,
            Self::KeyBodyPositions => 3 * num_key_bodies,
        }
    }
}

// ---------------------------------------------------------------------------
// AmpConfig
// ---------------------------------------------------------------------------

/// Declarative configuration for one AMP environment variant.
///
/// Validated once at startup and then passed by value (or shared behind an
/// `Arc`) into every component constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
pub struct AmpConfig {
    /// Path to the motion archive. Relative paths are resolved against the
    /// directory of the configuration file by [`AmpConfig::from_file`].
    pub motion_file: PathBuf,

    /// Body used as the anchor for height, orientation and velocity terms.
    pub reference_body: String,

    /// Ordered key bodies whose relative positions are style features.
    #[serde(default)]
    pub key_body_names: Vec<String>,

    /// History length K of the AMP observation window (default: 2).
    #[serde(default = "default_num_amp_observations")]
    pub num_amp_observations: usize,

    /// Per-frame feature dimensionality. Must equal the encoder's output length.
    pub amp_observation_dim: usize,

    /// Upward offset (m) applied to the root on reset (default: 0.05).
    #[serde(default = "default_root_lift")]
    pub root_lift: f32,

    /// Master random seed for reference and reset sampling.
    #[serde(default)]
    pub seed: u64,

    /// Number of parallel environment slots (default: 1).
    #[serde(default = "default_num_envs")]
    pub num_envs: usize,

    /// Feature term list. `None` selects [`FeatureTerm::AMP_STYLE`].
    #[serde(default)]
    pub feature_terms: Option<Vec<FeatureTerm>>,
}

impl AmpConfig {
    /// Validate configuration. Returns Err on invalid values.
    ///
    /// Name resolution against the skeleton and the archive happens later,
    /// when those are available; this only checks self-consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.motion_file.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("motion_file".into()));
        }
        if self.reference_body.is_empty() {
            return Err(ConfigError::MissingField("reference_body".into()));
        }
        if self.num_amp_observations == 0 {
            return Err(invalid("num_amp_observations", "must be >= 1"));
        }
        if self.amp_observation_dim == 0 {
            return Err(invalid("amp_observation_dim", "must be >= 1"));
        }
        if self.num_envs == 0 {
            return Err(invalid("num_envs", "must be >= 1"));
        }
        if self.num_envs > MAX_ENVS {
            return Err(invalid("num_envs", &format!("must be <= {MAX_ENVS}")));
        }
        if !self.root_lift.is_finite() || self.root_lift < 0.0 {
            return Err(invalid("root_lift", "must be finite and >= 0"));
        }
        let mut seen = HashSet::with_capacity(self.key_body_names.len());
        for name in &self.key_body_names {
            if !seen.insert(name.as_str()) {
                return Err(invalid(
                    "key_body_names",
                    &format!("duplicate key body '{name}'"),
                ));
            }
        }
        if let Some(terms) = &self.feature_terms {
            if terms.is_empty() {
                return Err(invalid("feature_terms", "must not be empty"));
            }
        }
        Ok(())
    }

    /// Ordered feature terms for this variant.
    #[must_use]
    pub fn terms(&self) -> &[FeatureTerm] {
        self.feature_terms
            .as_deref()
            .unwrap_or(&FeatureTerm::AMP_STYLE)
    }

    /// Flattened AMP observation size: `K × amp_observation_dim`.
    #[must_use]
    pub const fn observation_dim(&self) -> usize {
        self.num_amp_observations * self.amp_observation_dim
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        if config.motion_file.is_relative() {
            if let Some(dir) = path.parent() {
                config.motion_file = dir.join(&config.motion_file);
            }
        }
        config.validate()?;
        info!(
            path = %path.display(),
            motion_file = %config.motion_file.display(),
            history = config.num_amp_observations,
            feature_dim = config.amp_observation_dim,
            "loaded AMP configuration"
        );
        Ok(config)
    }

    /// Unitree G1 walking variant.
    #[must_use]
    pub fn g1_walk() -> Self {
        Self {
            motion_file: PathBuf::from("motions/g1_walk.json"),
            reference_body: "pelvis".into(),
            key_body_names: G1_KEY_BODIES.iter().map(|s| (*s).to_string()).collect(),
            num_amp_observations: default_num_amp_observations(),
            amp_observation_dim: 101,
            root_lift: default_root_lift(),
            seed: 0,
            num_envs: 4096,
            feature_terms: None,
        }
    }

    /// Unitree G1 dance variant: same skeleton and features, different clip.
    #[must_use]
    pub fn g1_dance() -> Self {
        Self {
            motion_file: PathBuf::from("motions/g1_dance.json"),
            ..Self::g1_walk()
        }
    }

    /// Unitree G1 velocity-tracking locomotion variant, styled on a
    /// retargeted LAFAN walk.
    #[must_use]
    pub fn g1_loco_walk() -> Self {
        Self {
            motion_file: PathBuf::from("motions/g1_lafan_walk.json"),
            ..Self::g1_walk()
        }
    }
}

const G1_KEY_BODIES: [&str; 10] = [
    "left_shoulder_pitch_link",
    "right_shoulder_pitch_link",
    "left_elbow_link",
    "right_elbow_link",
    "right_hip_yaw_link",
    "left_hip_yaw_link",
    "right_rubber_hand",
    "left_rubber_hand",
    "right_ankle_roll_link",
    "left_ankle_roll_link",
];

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
