//! Simulator collaborator interface.
//!
//! The pipeline reads live skeleton state through [`SkeletonSource`] and
//! writes reset poses through [`SkeletonSink`]. Rotations cross this boundary
//! as scalar-first `[w, x, y, z]`, the same convention as the motion archive.

use bevy::prelude::*;
use mimic_core::config::AmpConfig;
use mimic_core::error::{MimicError, NameKind, UnknownNameError};
use mimic_core::types::EnvId;
use mimic_motion::clip::BodyState;
use mimic_motion::names::NameIndexMap;
use mimic_motion::quat::{quat_from_wxyz, quat_to_wxyz};
use nalgebra::Vector3;

use crate::encoder::{FeatureEncoder, FrameKinematics};

// ---------------------------------------------------------------------------
// RawBodyState
// ---------------------------------------------------------------------------

/// World-frame body kinematics as plain arrays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBodyState {
    pub position: [f32; 3],
    /// Scalar-first `[w, x, y, z]`.
    pub rotation: [f32; 4],
    pub linear_velocity: [f32; 3],
    pub angular_velocity: [f32; 3],
}

/// Root pose and velocity written to the simulator on reset.
pub type RootState = RawBodyState;

impl RawBodyState {
    /// Identity pose at rest at the origin.
    pub const IDENTITY: Self = Self {
        position: [0.0; 3],
        rotation: [1.0, 0.0, 0.0, 0.0],
        linear_velocity: [0.0; 3],
        angular_velocity: [0.0; 3],
    };

    #[must_use]
    pub fn to_body_state(&self) -> BodyState {
        BodyState {
            position: Vector3::from(self.position),
            rotation: quat_from_wxyz(self.rotation),
            linear_velocity: Vector3::from(self.linear_velocity),
            angular_velocity: Vector3::from(self.angular_velocity),
        }
    }

    #[must_use]
    pub fn from_body_state(body: &BodyState) -> Self {
        Self {
            position: body.position.into(),
            rotation: quat_to_wxyz(&body.rotation),
            linear_velocity: body.linear_velocity.into(),
            angular_velocity: body.angular_velocity.into(),
        }
    }
}

impl Default for RawBodyState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read access to the live skeleton of every environment.
///
/// Joint arrays use the simulator's own joint ordering, which is the
/// canonical ordering of the feature vector.
pub trait SkeletonSource {
    fn num_envs(&self) -> usize;
    fn joint_names(&self) -> &[String];
    fn body_names(&self) -> &[String];
    fn dof_positions(&self, env: EnvId) -> &[f32];
    fn dof_velocities(&self, env: EnvId) -> &[f32];
    fn body_state(&self, env: EnvId, body: usize) -> RawBodyState;
}

/// Write access used to place an environment at a reference pose.
pub trait SkeletonSink {
    fn write_root_state(&mut self, env: EnvId, state: &RootState);
    /// Positions and velocities in the simulator's joint ordering.
    fn write_joint_state(&mut self, env: EnvId, positions: &[f32], velocities: &[f32]);
    /// World offset of the environment's local frame.
    fn env_origin(&self, env: EnvId) -> [f32; 3];
}

// ---------------------------------------------------------------------------
// KinematicSkeleton
// ---------------------------------------------------------------------------

/// Array-backed skeleton with no dynamics.
///
/// Stores whatever is written to it. Used for offline pipelines (replaying a
/// clip through the live path) and as the stand-in simulator in tests.
///
/// There is no forward kinematics: [`SkeletonSink::write_root_state`] moves
/// only the root body, and every other body keeps its last pose until it is
/// set with [`KinematicSkeleton::set_body`].
#[derive(Resource, Debug, Clone)]
pub struct KinematicSkeleton {
    num_envs: usize,
    joint_names: Vec<String>,
    body_names: Vec<String>,
    root_body: usize,
    dof_positions: Vec<f32>,
    dof_velocities: Vec<f32>,
    bodies: Vec<RawBodyState>,
    origins: Vec<[f32; 3]>,
}

impl KinematicSkeleton {
    /// All joints at zero, all bodies at the identity pose, root is body 0.
    #[must_use]
    pub fn new(num_envs: usize, joint_names: Vec<String>, body_names: Vec<String>) -> Self {
        let j = joint_names.len();
        let b = body_names.len();
        Self {
            num_envs,
            joint_names,
            body_names,
            root_body: 0,
            dof_positions: vec![0.0; num_envs * j],
            dof_velocities: vec![0.0; num_envs * j],
            bodies: vec![RawBodyState::IDENTITY; num_envs * b],
            origins: vec![[0.0; 3]; num_envs],
        }
    }

    /// Select the body that [`SkeletonSink::write_root_state`] moves.
    pub fn with_root_body(mut self, name: &str) -> Result<Self, UnknownNameError> {
        let map = NameIndexMap::build(&[name], &self.body_names, NameKind::Body, "skeleton")?;
        self.root_body = map.indices()[0];
        Ok(self)
    }

    /// Lay environment origins out on a square grid in the XY plane.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn with_env_spacing(mut self, spacing: f32) -> Self {
        let side = (self.num_envs as f64).sqrt().ceil().max(1.0) as usize;
        for (i, origin) in self.origins.iter_mut().enumerate() {
            *origin = [(i % side) as f32 * spacing, (i / side) as f32 * spacing, 0.0];
        }
        self
    }

    #[must_use]
    pub const fn root_body(&self) -> usize {
        self.root_body
    }

    pub fn set_env_origin(&mut self, env: EnvId, origin: [f32; 3]) {
        self.origins[env.slot()] = origin;
    }

    pub fn set_body(&mut self, env: EnvId, body: usize, state: RawBodyState) {
        let b = self.body_names.len();
        self.bodies[env.slot() * b + body] = state;
    }

    fn joint_range(&self, env: EnvId) -> std::ops::Range<usize> {
        let j = self.joint_names.len();
        env.slot() * j..(env.slot() + 1) * j
    }
}

impl SkeletonSource for KinematicSkeleton {
    fn num_envs(&self) -> usize {
        self.num_envs
    }

    fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    fn body_names(&self) -> &[String] {
        &self.body_names
    }

    fn dof_positions(&self, env: EnvId) -> &[f32] {
        &self.dof_positions[self.joint_range(env)]
    }

    fn dof_velocities(&self, env: EnvId) -> &[f32] {
        &self.dof_velocities[self.joint_range(env)]
    }

    fn body_state(&self, env: EnvId, body: usize) -> RawBodyState {
        self.bodies[env.slot() * self.body_names.len() + body]
    }
}

impl SkeletonSink for KinematicSkeleton {
    fn write_root_state(&mut self, env: EnvId, state: &RootState) {
        let root = self.root_body;
        self.set_body(env, root, *state);
    }

    fn write_joint_state(&mut self, env: EnvId, positions: &[f32], velocities: &[f32]) {
        let range = self.joint_range(env);
        self.dof_positions[range.clone()].copy_from_slice(positions);
        self.dof_velocities[range].copy_from_slice(velocities);
    }

    fn env_origin(&self, env: EnvId) -> [f32; 3] {
        self.origins[env.slot()]
    }
}

// ---------------------------------------------------------------------------
// LiveFeatureExtractor
// ---------------------------------------------------------------------------

/// Encodes the current frame of every environment from a [`SkeletonSource`].
#[derive(Debug, Clone)]
pub struct LiveFeatureExtractor {
    encoder: FeatureEncoder,
    root_body: usize,
    key_bodies: NameIndexMap,
}

impl LiveFeatureExtractor {
    /// Resolve body names against the live skeleton.
    ///
    /// `encoder` must have been built for the skeleton's joint count and the
    /// number of key bodies.
    pub fn new<S, N>(
        source: &S,
        reference_body: &str,
        key_body_names: &[N],
        encoder: FeatureEncoder,
    ) -> Result<Self, UnknownNameError>
    where
        S: SkeletonSource + ?Sized,
        N: AsRef<str>,
    {
        let root = NameIndexMap::build(&[reference_body], source.body_names(), NameKind::Body, "skeleton")?;
        let key_bodies =
            NameIndexMap::build(key_body_names, source.body_names(), NameKind::Body, "skeleton")?;
        Ok(Self {
            encoder,
            root_body: root.indices()[0],
            key_bodies,
        })
    }

    /// Build the configured encoder for this skeleton and check its width.
    pub fn from_config<S: SkeletonSource + ?Sized>(
        config: &AmpConfig,
        source: &S,
    ) -> Result<Self, MimicError> {
        config.validate()?;
        let encoder = FeatureEncoder::new(
            config.terms(),
            source.joint_names().len(),
            config.key_body_names.len(),
        );
        encoder.check_dim(config.amp_observation_dim)?;
        Ok(Self::new(
            source,
            &config.reference_body,
            &config.key_body_names,
            encoder,
        )?)
    }

    pub const fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Append one environment's encoded frame to `out`.
    pub fn encode_env<S: SkeletonSource + ?Sized>(&self, source: &S, env: EnvId, out: &mut Vec<f32>) {
        let root = source.body_state(env, self.root_body).to_body_state();
        let key_positions: Vec<Vector3<f32>> = self
            .key_bodies
            .indices()
            .iter()
            .map(|&b| Vector3::from(source.body_state(env, b).position))
            .collect();
        self.encoder.encode_into(
            &FrameKinematics {
                dof_positions: source.dof_positions(env),
                dof_velocities: source.dof_velocities(env),
                root: &root,
                key_body_positions: &key_positions,
            },
            out,
        );
    }

    /// Replace `out` with `[num_envs, feature_dim]` features of every env.
    ///
    /// # Panics
    ///
    /// Panics if the source reports more than [`MAX_ENVS`] environments.
    ///
    /// [`MAX_ENVS`]: mimic_core::types::MAX_ENVS
    pub fn encode_all<S: SkeletonSource + ?Sized>(&self, source: &S, out: &mut Vec<f32>) {
        out.clear();
        out.reserve(source.num_envs() * self.encoder.dim());
        for env in 0..source.num_envs() {
            let id = EnvId(u16::try_from(env).expect("env index overflow"));
            self.encode_env(source, id, out);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
