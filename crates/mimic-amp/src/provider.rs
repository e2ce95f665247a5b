//! Reference (expert) observations from the motion clip.
//!
//! The provider turns clip times into AMP windows in exactly the buffer's
//! layout, for discriminator batches and for reseeding environments on reset.

use std::sync::Arc;

use mimic_core::config::{AmpConfig, FeatureTerm};
use mimic_core::error::{ConfigError, MimicError};
use mimic_core::types::EnvId;
use mimic_motion::clip::MotionClip;
use mimic_motion::names::NameIndexMap;
use mimic_motion::sampler::SampledFrame;
use nalgebra::Vector3;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::buffer::AmpObservationBuffer;
use crate::encoder::{FeatureEncoder, FrameKinematics};
use crate::sim::{RootState, SkeletonSink};

// ---------------------------------------------------------------------------
// ReferenceBatch
// ---------------------------------------------------------------------------

/// `[num_samples, K × feature_dim]` reference windows and the times they
/// were taken at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceBatch {
    times: Vec<f64>,
    observation_dim: usize,
    data: Vec<f32>,
}

impl ReferenceBatch {
    /// Current-frame time of each row.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn num_samples(&self) -> usize {
        self.times.len()
    }

    pub const fn observation_dim(&self) -> usize {
        self.observation_dim
    }

    pub fn row(&self, sample: usize) -> &[f32] {
        &self.data[sample * self.observation_dim..(sample + 1) * self.observation_dim]
    }

    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }
}

// ---------------------------------------------------------------------------
// ReferenceMotionProvider
// ---------------------------------------------------------------------------

/// Samples the clip and encodes it with the shared feature layout.
#[derive(Debug, Clone)]
pub struct ReferenceMotionProvider {
    clip: Arc<MotionClip>,
    /// Simulator joint order to clip joint indices.
    dof_map: NameIndexMap,
    root_body: usize,
    key_bodies: NameIndexMap,
    encoder: FeatureEncoder,
    history: usize,
    root_lift: f32,
}

impl ReferenceMotionProvider {
    /// Resolve every name against the clip.
    ///
    /// `joint_names` is the simulator's joint ordering; features are emitted
    /// in that order. `history` must be at least 1.
    pub fn new<J, K>(
        clip: Arc<MotionClip>,
        joint_names: &[J],
        reference_body: &str,
        key_body_names: &[K],
        terms: &[FeatureTerm],
        history: usize,
        root_lift: f32,
    ) -> Result<Self, MimicError>
    where
        J: AsRef<str>,
        K: AsRef<str>,
    {
        if history == 0 {
            return Err(ConfigError::InvalidValue {
                field: "num_amp_observations".into(),
                message: "must be >= 1".into(),
            }
            .into());
        }
        let dof_map = clip.get_dof_index(joint_names)?;
        let root = clip.get_body_index(&[reference_body])?;
        let key_bodies = clip.get_body_index(key_body_names)?;
        let encoder = FeatureEncoder::new(terms, dof_map.len(), key_bodies.len());
        Ok(Self {
            clip,
            dof_map,
            root_body: root.indices()[0],
            key_bodies,
            encoder,
            history,
            root_lift,
        })
    }

    /// Build from configuration and check the configured feature width.
    pub fn from_config<J: AsRef<str>>(
        config: &AmpConfig,
        clip: Arc<MotionClip>,
        joint_names: &[J],
    ) -> Result<Self, MimicError> {
        config.validate()?;
        let provider = Self::new(
            clip,
            joint_names,
            &config.reference_body,
            &config.key_body_names,
            config.terms(),
            config.num_amp_observations,
            config.root_lift,
        )?;
        provider.encoder.check_dim(config.amp_observation_dim)?;
        info!(
            reference_body = %config.reference_body,
            key_bodies = provider.key_bodies.len(),
            dofs = provider.dof_map.len(),
            feature_dim = provider.feature_dim(),
            history = provider.history,
            "reference motion provider ready"
        );
        Ok(provider)
    }

    pub fn clip(&self) -> &MotionClip {
        &self.clip
    }

    pub const fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// History length K.
    pub const fn history(&self) -> usize {
        self.history
    }

    pub const fn feature_dim(&self) -> usize {
        self.encoder.dim()
    }

    /// `K × feature_dim`.
    pub const fn observation_dim(&self) -> usize {
        self.history * self.encoder.dim()
    }

    /// Zeroed observation window sized for this provider.
    #[must_use]
    pub fn new_buffer(&self, num_envs: usize) -> AmpObservationBuffer {
        AmpObservationBuffer::new(num_envs, self.history, self.feature_dim())
    }

    /// Append the encoding of every sample in `sampled` to `out`.
    pub fn encode_sampled(&self, sampled: &SampledFrame, out: &mut Vec<f32>) {
        let mut dof_positions = Vec::with_capacity(self.dof_map.len());
        let mut dof_velocities = Vec::with_capacity(self.dof_map.len());
        let mut key_positions: Vec<Vector3<f32>> = Vec::with_capacity(self.key_bodies.len());
        out.reserve(sampled.num_samples() * self.feature_dim());

        for s in 0..sampled.num_samples() {
            dof_positions.clear();
            dof_velocities.clear();
            key_positions.clear();
            self.dof_map.gather_into(sampled.dof_positions(s), &mut dof_positions);
            self.dof_map.gather_into(sampled.dof_velocities(s), &mut dof_velocities);
            key_positions.extend(
                self.key_bodies
                    .indices()
                    .iter()
                    .map(|&b| sampled.body(s, b).position),
            );
            self.encoder.encode_into(
                &FrameKinematics {
                    dof_positions: &dof_positions,
                    dof_velocities: &dof_velocities,
                    root: sampled.body(s, self.root_body),
                    key_body_positions: &key_positions,
                },
                out,
            );
        }
    }

    /// Sample the history of every time and encode it.
    fn sample_windows(&self, times: &[f64]) -> (SampledFrame, Vec<f32>) {
        let history_times = self.clip.history_times(times, self.history);
        let sampled = self.clip.sample(&history_times);
        let mut data = Vec::with_capacity(times.len() * self.observation_dim());
        self.encode_sampled(&sampled, &mut data);
        (sampled, data)
    }

    /// Reference windows at `num_samples` uniformly drawn clip times.
    pub fn collect_reference<R: Rng + ?Sized>(&self, rng: &mut R, num_samples: usize) -> ReferenceBatch {
        let times = self.clip.sample_times(rng, num_samples);
        self.collect_reference_at(&times)
    }

    /// Reference windows ending at the given times.
    ///
    /// Row `i` holds frames at `times[i], times[i] - dt, ...`, newest first,
    /// laid out exactly like a buffer row.
    #[must_use]
    pub fn collect_reference_at(&self, times: &[f64]) -> ReferenceBatch {
        let (_, data) = self.sample_windows(times);
        ReferenceBatch {
            times: times.to_vec(),
            observation_dim: self.observation_dim(),
            data,
        }
    }

    /// Reset `env_ids` at random clip times. Returns the times drawn.
    pub fn reset_envs<R, S>(
        &self,
        rng: &mut R,
        env_ids: &[EnvId],
        buffer: &mut AmpObservationBuffer,
        sink: &mut S,
    ) -> Vec<f64>
    where
        R: Rng + ?Sized,
        S: SkeletonSink + ?Sized,
    {
        let times = self.clip.sample_times(rng, env_ids.len());
        self.reset_envs_at(env_ids, &times, buffer, sink);
        times
    }

    /// Place each env at its reference pose and reseed its window from the
    /// same time.
    ///
    /// The root is offset by the env origin and lifted by `root_lift`.
    ///
    /// # Panics
    ///
    /// Panics if `times.len() != env_ids.len()`.
    pub fn reset_envs_at<S: SkeletonSink + ?Sized>(
        &self,
        env_ids: &[EnvId],
        times: &[f64],
        buffer: &mut AmpObservationBuffer,
        sink: &mut S,
    ) {
        assert_eq!(
            env_ids.len(),
            times.len(),
            "reset: {} env ids but {} times",
            env_ids.len(),
            times.len()
        );
        if env_ids.is_empty() {
            return;
        }
        let (sampled, windows) = self.sample_windows(times);

        let mut positions = Vec::with_capacity(self.dof_map.len());
        let mut velocities = Vec::with_capacity(self.dof_map.len());
        for (i, &env) in env_ids.iter().enumerate() {
            let current = i * self.history;
            let mut root = RootState::from_body_state(sampled.body(current, self.root_body));
            let origin = sink.env_origin(env);
            for (p, o) in root.position.iter_mut().zip(origin) {
                *p += o;
            }
            root.position[2] += self.root_lift;
            sink.write_root_state(env, &root);

            positions.clear();
            velocities.clear();
            self.dof_map.gather_into(sampled.dof_positions(current), &mut positions);
            self.dof_map.gather_into(sampled.dof_velocities(current), &mut velocities);
            sink.write_joint_state(env, &positions, &velocities);
        }

        buffer.reset_envs(env_ids, &windows);
        debug!(envs = env_ids.len(), ?times, "reset environments from reference motion");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
