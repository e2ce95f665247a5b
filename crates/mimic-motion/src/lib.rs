// mimic-motion: reference clip archive, name resolution and temporal sampling.

pub mod clip;
pub mod names;
pub mod quat;
pub mod sampler;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        clip::{BodyState, MotionArchive, MotionClip},
        names::NameIndexMap,
        quat::{quat_from_wxyz, quat_to_wxyz, slerp_shortest},
        sampler::{FrameBlend, SampledFrame},
    };
}
