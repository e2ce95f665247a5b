//! Bevy integration: reset and record systems in [`MimicSet`] order.

use std::marker::PhantomData;
use std::sync::Arc;

use bevy::prelude::*;
use mimic_core::MimicCorePlugin;
use mimic_core::MimicSet;
use mimic_core::config::AmpConfig;
use mimic_core::error::{ConfigError, MimicError};
use mimic_core::seed::{RESET_STREAM, SeedHierarchy};
use mimic_core::types::EnvId;
use mimic_motion::clip::MotionClip;
use rand_chacha::ChaCha8Rng;

use crate::buffer::AmpObservationBuffer;
use crate::provider::ReferenceMotionProvider;
use crate::sim::{LiveFeatureExtractor, SkeletonSink, SkeletonSource};

// ---------------------------------------------------------------------------
// PendingResets
// ---------------------------------------------------------------------------

/// Environments to reset at the start of the next step.
#[derive(Resource, Clone, Debug, Default)]
pub struct PendingResets {
    envs: Vec<EnvId>,
}

impl PendingResets {
    pub fn request(&mut self, env: EnvId) {
        self.envs.push(env);
    }

    pub fn request_all(&mut self, envs: impl IntoIterator<Item = EnvId>) {
        self.envs.extend(envs);
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    /// Take the queued ids, sorted and deduplicated.
    pub fn drain(&mut self) -> Vec<EnvId> {
        let mut envs = std::mem::take(&mut self.envs);
        envs.sort_unstable();
        envs.dedup();
        envs
    }
}

// ---------------------------------------------------------------------------
// AmpRuntime
// ---------------------------------------------------------------------------

/// Provider, live extractor and reset RNG of one AMP environment variant.
#[derive(Resource, Debug)]
pub struct AmpRuntime {
    pub provider: ReferenceMotionProvider,
    pub extractor: LiveFeatureExtractor,
    pub reset_rng: ChaCha8Rng,
    scratch: Vec<f32>,
}

impl AmpRuntime {
    /// Resolve the configuration against the clip and the live skeleton.
    ///
    /// Both paths share one encoder, resolved from the configured terms.
    pub fn from_config<S: SkeletonSource + ?Sized>(
        config: &AmpConfig,
        clip: Arc<MotionClip>,
        source: &S,
    ) -> Result<Self, MimicError> {
        config.validate()?;
        if source.num_envs() != config.num_envs {
            return Err(ConfigError::InvalidValue {
                field: "num_envs".into(),
                message: format!(
                    "configured {} but the simulator has {}",
                    config.num_envs,
                    source.num_envs()
                ),
            }
            .into());
        }
        let provider = ReferenceMotionProvider::from_config(config, clip, source.joint_names())?;
        let extractor = LiveFeatureExtractor::new(
            source,
            &config.reference_body,
            &config.key_body_names,
            provider.encoder().clone(),
        )?;
        Ok(Self {
            provider,
            extractor,
            reset_rng: SeedHierarchy::new(config.seed).stream_rng(RESET_STREAM),
            scratch: Vec::new(),
        })
    }
}

/// Insert [`AmpRuntime`] and a matching [`AmpObservationBuffer`], resolving
/// names against the `S` resource already in the world.
pub fn insert_amp_resources<S: SkeletonSource + Resource>(
    app: &mut App,
    config: &AmpConfig,
    clip: Arc<MotionClip>,
) -> Result<(), MimicError> {
    let sim = app
        .world()
        .get_resource::<S>()
        .ok_or_else(|| ConfigError::MissingField("simulator resource".into()))?;
    let runtime = AmpRuntime::from_config(config, clip, sim)?;
    let buffer = runtime.provider.new_buffer(config.num_envs);
    app.insert_resource(runtime)
        .insert_resource(buffer)
        .insert_resource(config.clone());
    Ok(())
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// Reset every queued env from the reference motion.
///
/// Runs in [`MimicSet::Reset`].
#[allow(clippy::needless_pass_by_value)]
pub fn amp_reset_system<S: SkeletonSink + Resource>(
    mut pending: ResMut<PendingResets>,
    runtime: Option<ResMut<AmpRuntime>>,
    buffer: Option<ResMut<AmpObservationBuffer>>,
    sim: Option<ResMut<S>>,
) {
    let (Some(mut runtime), Some(mut buffer), Some(mut sim)) = (runtime, buffer, sim) else {
        return;
    };
    if pending.is_empty() {
        return;
    }
    let envs = pending.drain();
    let AmpRuntime {
        provider,
        reset_rng,
        ..
    } = &mut *runtime;
    provider.reset_envs(reset_rng, &envs, &mut buffer, &mut *sim);
}

/// Encode the live frame of every env and push it into the window.
///
/// Runs in [`MimicSet::Record`].
#[allow(clippy::needless_pass_by_value)]
pub fn amp_record_system<S: SkeletonSource + Resource>(
    runtime: Option<ResMut<AmpRuntime>>,
    buffer: Option<ResMut<AmpObservationBuffer>>,
    sim: Option<Res<S>>,
) {
    let (Some(mut runtime), Some(mut buffer), Some(sim)) = (runtime, buffer, sim) else {
        return;
    };
    let AmpRuntime {
        extractor, scratch, ..
    } = &mut *runtime;
    extractor.encode_all(&*sim, scratch);
    buffer.push(scratch);
}

// ---------------------------------------------------------------------------
// AmpPlugin
// ---------------------------------------------------------------------------

/// Schedules the AMP systems for simulator resource `S`.
///
/// Systems do nothing until [`AmpRuntime`] and [`AmpObservationBuffer`] are
/// present (see [`insert_amp_resources`]).
pub struct AmpPlugin<S> {
    _marker: PhantomData<fn() -> S>,
}

impl<S> Default for AmpPlugin<S> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<S: SkeletonSource + SkeletonSink + Resource> Plugin for AmpPlugin<S> {
    fn build(&self, app: &mut App) {
        if !app.is_plugin_added::<MimicCorePlugin>() {
            app.add_plugins(MimicCorePlugin);
        }
        app.init_resource::<PendingResets>().add_systems(
            Update,
            (
                amp_reset_system::<S>.in_set(MimicSet::Reset),
                amp_record_system::<S>.in_set(MimicSet::Record),
            ),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
