//! Per-environment sliding window of encoded style features.
//!
//! Layout is `[num_envs, K, feature_dim]` in one flat `Vec<f32>`, newest
//! frame first. Each row is exactly one environment's flattened observation,
//! so [`AmpObservationBuffer::as_flat`] is the training-loop view with no copy.

use bevy::prelude::*;
use mimic_core::types::{EnvId, Observation};

/// Sliding AMP observation window for all environments.
///
/// # Example
///
/// ```
/// use mimic_amp::buffer::AmpObservationBuffer;
///
/// let mut buf = AmpObservationBuffer::new(1, 2, 1);
/// buf.push(&[1.0]);
/// buf.push(&[2.0]);
/// assert_eq!(buf.as_flat(), &[2.0, 1.0]);
/// ```
#[derive(Resource, Clone, Debug)]
pub struct AmpObservationBuffer {
    data: Vec<f32>,
    num_envs: usize,
    history: usize,
    feature_dim: usize,
}

impl AmpObservationBuffer {
    /// Zeroed window of `history` frames of `feature_dim` values per env.
    ///
    /// # Panics
    ///
    /// Panics if `history == 0`.
    #[must_use]
    pub fn new(num_envs: usize, history: usize, feature_dim: usize) -> Self {
        assert!(history > 0, "AMP history length must be >= 1");
        Self {
            data: vec![0.0; num_envs * history * feature_dim],
            num_envs,
            history,
            feature_dim,
        }
    }

    #[must_use]
    pub const fn num_envs(&self) -> usize {
        self.num_envs
    }

    /// History length K.
    #[must_use]
    pub const fn history(&self) -> usize {
        self.history
    }

    #[must_use]
    pub const fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Flattened per-env observation size, `K × feature_dim`.
    #[must_use]
    pub const fn observation_dim(&self) -> usize {
        self.history * self.feature_dim
    }

    /// Shift every env's window back by one frame and write `frames`
    /// (`[num_envs, feature_dim]`) at index 0. The oldest frame is dropped.
    ///
    /// # Panics
    ///
    /// Panics if `frames.len() != num_envs * feature_dim`.
    pub fn push(&mut self, frames: &[f32]) {
        assert_eq!(
            frames.len(),
            self.num_envs * self.feature_dim,
            "AMP frame batch: expected {} values ({} envs x {}), got {}",
            self.num_envs * self.feature_dim,
            self.num_envs,
            self.feature_dim,
            frames.len()
        );
        let row = self.observation_dim();
        let d = self.feature_dim;
        for (env, frame) in frames.chunks_exact(d.max(1)).take(self.num_envs).enumerate() {
            let start = env * row;
            self.data.copy_within(start..start + row - d, start + d);
            self.data[start..start + d].copy_from_slice(frame);
        }
    }

    /// Overwrite whole rows with reference windows.
    ///
    /// `windows` holds one `K × feature_dim` row per id, in id order, laid out
    /// like the buffer (newest first). Rows not named in `env_ids` are left
    /// untouched.
    ///
    /// # Panics
    ///
    /// Panics if an id is out of range or `windows` has the wrong length.
    pub fn reset_envs(&mut self, env_ids: &[EnvId], windows: &[f32]) {
        let row = self.observation_dim();
        assert_eq!(
            windows.len(),
            env_ids.len() * row,
            "AMP reset windows: expected {} values ({} envs x {}), got {}",
            env_ids.len() * row,
            env_ids.len(),
            row,
            windows.len()
        );
        for (i, id) in env_ids.iter().enumerate() {
            assert!(
                id.slot() < self.num_envs,
                "{id} out of range ({} envs)",
                self.num_envs
            );
            let start = id.slot() * row;
            self.data[start..start + row].copy_from_slice(&windows[i * row..(i + 1) * row]);
        }
    }

    /// All envs, `[num_envs, K × feature_dim]` row-major.
    #[must_use]
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    /// One env's window, frame 0 first.
    #[must_use]
    pub fn window(&self, env: EnvId) -> &[f32] {
        let row = self.observation_dim();
        let start = env.slot() * row;
        &self.data[start..start + row]
    }

    /// Frame `k` (0 = newest) of one env.
    #[must_use]
    pub fn frame(&self, env: EnvId, k: usize) -> &[f32] {
        assert!(k < self.history, "frame {k} out of range (history {})", self.history);
        let start = env.slot() * self.observation_dim() + k * self.feature_dim;
        &self.data[start..start + self.feature_dim]
    }

    /// One env's window as an [`Observation`].
    #[must_use]
    pub fn get(&self, env: EnvId) -> Observation {
        Observation::new(self.window(env).to_vec())
    }

    /// Zero every window.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
