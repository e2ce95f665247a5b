//! Per-frame style feature encoding.
//!
//! The same [`FeatureEncoder`] instance serves the live simulator path and
//! the archival path, so identical kinematic input always yields bit-identical
//! features.

use mimic_core::config::FeatureTerm;
use mimic_core::error::MimicError;
use mimic_motion::clip::BodyState;
use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// FrameKinematics
// ---------------------------------------------------------------------------

/// One frame of skeletal state, already gathered into canonical order.
///
/// Joint arrays follow the simulator's joint ordering; `key_body_positions`
/// follows the configured key-body list and is in world frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameKinematics<'a> {
    pub dof_positions: &'a [f32],
    pub dof_velocities: &'a [f32],
    pub root: &'a BodyState,
    pub key_body_positions: &'a [Vector3<f32>],
}

// ---------------------------------------------------------------------------
// FeatureVector
// ---------------------------------------------------------------------------

/// Encoded features of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Term functions
// ---------------------------------------------------------------------------

type TermFn = fn(&FrameKinematics<'_>, &mut Vec<f32>);

fn root_height(frame: &FrameKinematics<'_>, out: &mut Vec<f32>) {
    out.push(frame.root.position.z);
}

fn root_tangent_normal(frame: &FrameKinematics<'_>, out: &mut Vec<f32>) {
    let tangent = frame.root.rotation * Vector3::x();
    let normal = frame.root.rotation * Vector3::z();
    out.extend_from_slice(tangent.as_slice());
    out.extend_from_slice(normal.as_slice());
}

fn root_linear_velocity(frame: &FrameKinematics<'_>, out: &mut Vec<f32>) {
    out.extend_from_slice(frame.root.linear_velocity.as_slice());
}

fn root_angular_velocity(frame: &FrameKinematics<'_>, out: &mut Vec<f32>) {
    out.extend_from_slice(frame.root.angular_velocity.as_slice());
}

fn dof_positions(frame: &FrameKinematics<'_>, out: &mut Vec<f32>) {
    out.extend_from_slice(frame.dof_positions);
}

fn dof_velocities(frame: &FrameKinematics<'_>, out: &mut Vec<f32>) {
    out.extend_from_slice(frame.dof_velocities);
}

fn key_body_positions(frame: &FrameKinematics<'_>, out: &mut Vec<f32>) {
    for p in frame.key_body_positions {
        out.extend_from_slice((p - frame.root.position).as_slice());
    }
}

fn resolve(term: FeatureTerm) -> TermFn {
    match term {
        FeatureTerm::RootHeight => root_height,
        FeatureTerm::RootTangentNormal => root_tangent_normal,
        FeatureTerm::RootLinearVelocity => root_linear_velocity,
        FeatureTerm::RootAngularVelocity => root_angular_velocity,
        FeatureTerm::DofPositions => dof_positions,
        FeatureTerm::DofVelocities => dof_velocities,
        FeatureTerm::KeyBodyPositions => key_body_positions,
    }
}

// ---------------------------------------------------------------------------
// FeatureEncoder
// ---------------------------------------------------------------------------

/// Resolved term list for a fixed skeleton size.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    terms: Vec<FeatureTerm>,
    handles: Vec<TermFn>,
    num_dofs: usize,
    num_key_bodies: usize,
    dim: usize,
}

impl FeatureEncoder {
    #[must_use]
    pub fn new(terms: &[FeatureTerm], num_dofs: usize, num_key_bodies: usize) -> Self {
        Self {
            terms: terms.to_vec(),
            handles: terms.iter().copied().map(resolve).collect(),
            num_dofs,
            num_key_bodies,
            dim: terms
                .iter()
                .map(|t| t.dim(num_dofs, num_key_bodies))
                .sum(),
        }
    }

    /// Encoder for [`FeatureTerm::AMP_STYLE`]:
    /// `1 + 6 + 3 + 3 + 2·num_dofs + 3·num_key_bodies` values.
    #[must_use]
    pub fn amp_style(num_dofs: usize, num_key_bodies: usize) -> Self {
        Self::new(&FeatureTerm::AMP_STYLE, num_dofs, num_key_bodies)
    }

    /// Output length per frame.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    #[must_use]
    pub const fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    #[must_use]
    pub const fn num_key_bodies(&self) -> usize {
        self.num_key_bodies
    }

    pub fn terms(&self) -> &[FeatureTerm] {
        &self.terms
    }

    /// Fail with [`MimicError::DimensionMismatch`] unless `configured == dim()`.
    pub fn check_dim(&self, configured: usize) -> Result<(), MimicError> {
        if configured == self.dim {
            Ok(())
        } else {
            Err(MimicError::DimensionMismatch {
                configured,
                actual: self.dim,
            })
        }
    }

    /// Append the encoded frame to `out`.
    ///
    /// # Panics
    ///
    /// Panics if the frame's joint or key-body counts differ from the
    /// encoder's.
    pub fn encode_into(&self, frame: &FrameKinematics<'_>, out: &mut Vec<f32>) {
        assert_eq!(
            frame.dof_positions.len(),
            self.num_dofs,
            "dof_positions: expected {} values, got {}",
            self.num_dofs,
            frame.dof_positions.len()
        );
        assert_eq!(
            frame.dof_velocities.len(),
            self.num_dofs,
            "dof_velocities: expected {} values, got {}",
            self.num_dofs,
            frame.dof_velocities.len()
        );
        assert_eq!(
            frame.key_body_positions.len(),
            self.num_key_bodies,
            "key_body_positions: expected {} bodies, got {}",
            self.num_key_bodies,
            frame.key_body_positions.len()
        );
        out.reserve(self.dim);
        for handle in &self.handles {
            handle(frame, out);
        }
    }

    /// Encode one frame into a fresh vector.
    #[must_use]
    pub fn encode(&self, frame: &FrameKinematics<'_>) -> FeatureVector {
        let mut out = Vec::with_capacity(self.dim);
        self.encode_into(frame, &mut out);
        FeatureVector(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;
    use std::f32::consts::FRAC_PI_2;

    fn root() -> BodyState {
        BodyState {
            position: Vector3::new(1.0, 2.0, 0.8),
            rotation: UnitQuaternion::identity(),
            linear_velocity: Vector3::new(0.5, 0.0, 0.0),
            angular_velocity: Vector3::new(0.0, 0.0, 0.1),
        }
    }

    #[test]
    fn amp_style_dim_matches_g1() {
        assert_eq!(FeatureEncoder::amp_style(29, 10).dim(), 101);
        assert_eq!(FeatureEncoder::amp_style(0, 0).dim(), 13);
    }

    #[test]
    fn layout_follows_term_order() {
        let root = root();
        let key = [Vector3::new(1.0, 2.5, 0.1)];
        let frame = FrameKinematics {
            dof_positions: &[0.1, 0.2],
            dof_velocities: &[-1.0, -2.0],
            root: &root,
            key_body_positions: &key,
        };
        let v = FeatureEncoder::amp_style(2, 1).encode(&frame);
        let expected = [
            0.8, // height
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, // tangent, normal
            0.5, 0.0, 0.0, // linear velocity
            0.0, 0.0, 0.1, // angular velocity
            0.1, 0.2, -1.0, -2.0, // dofs
        ];
        assert_eq!(v.len(), 20);
        assert_eq!(&v.as_slice()[..17], &expected);
        let rel = &v.as_slice()[17..];
        assert!((rel[0] - 0.0).abs() < 1e-6);
        assert!((rel[1] - 0.5).abs() < 1e-6);
        assert!((rel[2] + 0.7).abs() < 1e-6);
    }

    #[test]
    fn tangent_normal_rotates_axes() {
        let mut root = root();
        // Quarter turn about Y sends X to -Z and Z to X.
        root.rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2);
        let frame = FrameKinematics {
            dof_positions: &[],
            dof_velocities: &[],
            root: &root,
            key_body_positions: &[],
        };
        let enc = FeatureEncoder::new(&[FeatureTerm::RootTangentNormal], 0, 0);
        let v = enc.encode(&frame);
        let expected = [0.0, 0.0, -1.0, 1.0, 0.0, 0.0];
        for (a, b) in v.as_slice().iter().zip(expected) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn custom_terms_change_layout() {
        let root = root();
        let frame = FrameKinematics {
            dof_positions: &[3.0],
            dof_velocities: &[4.0],
            root: &root,
            key_body_positions: &[],
        };
        let enc = FeatureEncoder::new(&[FeatureTerm::DofVelocities, FeatureTerm::RootHeight], 1, 0);
        assert_eq!(enc.dim(), 2);
        assert_eq!(enc.encode(&frame).as_slice(), &[4.0, 0.8]);
    }

    #[test]
    fn check_dim_reports_mismatch() {
        let enc = FeatureEncoder::amp_style(2, 1);
        assert!(enc.check_dim(20).is_ok());
        let err = enc.check_dim(21).unwrap_err();
        assert!(matches!(
            err,
            MimicError::DimensionMismatch {
                configured: 21,
                actual: 20
            }
        ));
    }

    #[test]
    #[should_panic(expected = "dof_positions")]
    fn wrong_joint_count_panics() {
        let root = root();
        let frame = FrameKinematics {
            dof_positions: &[1.0],
            dof_velocities: &[1.0, 2.0],
            root: &root,
            key_body_positions: &[],
        };
        let _ = FeatureEncoder::amp_style(2, 0).encode(&frame);
    }
}
