// mimic-amp: style features, the AMP observation window and reference motion.

pub mod buffer;
pub mod encoder;
pub mod plugin;
pub mod provider;
pub mod sim;

pub use plugin::AmpPlugin;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        AmpPlugin,
        buffer::AmpObservationBuffer,
        encoder::{FeatureEncoder, FeatureVector, FrameKinematics},
        plugin::{AmpRuntime, PendingResets, insert_amp_resources},
        provider::{ReferenceBatch, ReferenceMotionProvider},
        sim::{
            KinematicSkeleton, LiveFeatureExtractor, RawBodyState, RootState, SkeletonSink,
            SkeletonSource,
        },
    };
}
