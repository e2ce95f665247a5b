use std::fmt;

use thiserror::Error;

/// Top-level error type for the mimic pipeline.
///
/// Every variant is a startup defect: none of them is retryable, and all of
/// them are raised before the first simulation step.
#[derive(Debug, Error)]
pub enum MimicError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Corrupt motion archive: {0}")]
    CorruptArchive(#[from] ArchiveError),

    #[error(transparent)]
    UnknownName(#[from] UnknownNameError),

    #[error("Feature dimension mismatch: configured {configured}, encoder produces {actual}")]
    DimensionMismatch { configured: usize, actual: usize },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Malformed or inconsistent motion archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("invalid frame time step: {0} (must be > 0)")]
    InvalidTimeStep(f64),

    #[error("clip has {0} frame(s); at least 2 are required for a positive duration")]
    TooFewFrames(usize),

    #[error("'{key}' has {got} frames, expected {expected}")]
    FrameCountMismatch {
        key: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("'{key}' frame {frame} has {got} entries, expected {expected}")]
    RowWidthMismatch {
        key: &'static str,
        frame: usize,
        expected: usize,
        got: usize,
    },

    #[error("'{key}' frame {frame} contains a non-finite value")]
    NonFinite { key: &'static str, frame: usize },

    #[error("rotation of body {body} at frame {frame} is not unit length (norm {norm})")]
    NonUnitRotation { frame: usize, body: usize, norm: f32 },

    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: NameKind, name: String },
}

/// Which name table a lookup went against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Joint,
    Body,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joint => f.write_str("joint"),
            Self::Body => f.write_str("body"),
        }
    }
}

/// A configured or externally supplied name is absent from a name table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} name '{name}' (not found in {origin})")]
pub struct UnknownNameError {
    pub kind: NameKind,
    pub name: String,
    /// Which table was searched, e.g. `"motion archive"` or `"skeleton"`.
    pub origin: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mimic_error_from_config_error() {
        let err = ConfigError::MissingField("motion_file".into());
        let mimic_err: MimicError = err.into();
        assert!(matches!(mimic_err, MimicError::Config(_)));
        assert!(mimic_err.to_string().contains("motion_file"));
    }

    #[test]
    fn mimic_error_from_archive_error() {
        let err = ArchiveError::InvalidTimeStep(-0.1);
        let mimic_err: MimicError = err.into();
        assert!(matches!(mimic_err, MimicError::CorruptArchive(_)));
        assert!(mimic_err.to_string().contains("-0.1"));
    }

    #[test]
    fn mimic_error_from_unknown_name() {
        let err = UnknownNameError {
            kind: NameKind::Body,
            name: "pelvis".into(),
            origin: "live skeleton",
        };
        let mimic_err: MimicError = err.into();
        assert!(matches!(mimic_err, MimicError::UnknownName(_)));
        assert_eq!(
            mimic_err.to_string(),
            "Unknown body name 'pelvis' (not found in live skeleton)"
        );
    }

    #[test]
    fn config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let config_err: ConfigError = io_err.into();
        assert!(matches!(config_err, ConfigError::Io(_)));
    }

    #[test]
    fn archive_error_display_messages() {
        assert_eq!(
            ArchiveError::MissingKey("body_rotations").to_string(),
            "missing required key 'body_rotations'"
        );
        assert_eq!(
            ArchiveError::TooFewFrames(1).to_string(),
            "clip has 1 frame(s); at least 2 are required for a positive duration"
        );
        assert_eq!(
            ArchiveError::FrameCountMismatch {
                key: "dof_velocities",
                expected: 10,
                got: 9
            }
            .to_string(),
            "'dof_velocities' has 9 frames, expected 10"
        );
        assert_eq!(
            ArchiveError::RowWidthMismatch {
                key: "dof_positions",
                frame: 3,
                expected: 29,
                got: 28
            }
            .to_string(),
            "'dof_positions' frame 3 has 28 entries, expected 29"
        );
        assert_eq!(
            ArchiveError::DuplicateName {
                kind: NameKind::Joint,
                name: "knee".into()
            }
            .to_string(),
            "duplicate joint name 'knee'"
        );
    }

    #[test]
    fn dimension_mismatch_display() {
        assert_eq!(
            MimicError::DimensionMismatch {
                configured: 100,
                actual: 101
            }
            .to_string(),
            "Feature dimension mismatch: configured 100, encoder produces 101"
        );
    }
}
