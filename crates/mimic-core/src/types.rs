use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EnvId
// ---------------------------------------------------------------------------

/// Largest number of environment slots an [`EnvId`] can address.
pub const MAX_ENVS: usize = u16::MAX as usize + 1;

/// Index of one parallel environment slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnvId(pub u16);

impl EnvId {
    /// Id of flat slot `slot`, or `None` past [`MAX_ENVS`].
    #[must_use]
    pub fn from_slot(slot: usize) -> Option<Self> {
        u16::try_from(slot).ok().map(Self)
    }

    /// Slot index as `usize`, for indexing flat buffers.
    pub const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for EnvId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "env:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// Flat f32 vector handed to the training loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    data: Vec<f32>,
}

impl Observation {
    pub const fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    pub const fn len(&self) -> usize {
        self.data.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
