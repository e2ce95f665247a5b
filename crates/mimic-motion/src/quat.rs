//! Quaternion conventions and shortest-arc interpolation.
//!
//! Every external boundary (archive files, simulator adapters) carries
//! rotations as scalar-first `[w, x, y, z]`. Both the archive loader and the
//! simulator adapters go through [`quat_from_wxyz`], so the two feature paths
//! see bit-identical rotations for identical raw input.

use nalgebra::{Quaternion, UnitQuaternion};

/// Below this angle cosine distance, slerp falls back to normalized lerp.
const SLERP_EPSILON: f32 = 1e-6;

/// Build a unit quaternion from scalar-first components.
#[must_use]
pub fn quat_from_wxyz(q: [f32; 4]) -> UnitQuaternion<f32> {
    UnitQuaternion::new_normalize(Quaternion::new(q[0], q[1], q[2], q[3]))
}

/// Scalar-first components of a unit quaternion.
#[must_use]
pub fn quat_to_wxyz(q: &UnitQuaternion<f32>) -> [f32; 4] {
    [q.w, q.i, q.j, q.k]
}

/// Spherical interpolation along the shorter arc.
///
/// If `q0·q1 < 0` the second endpoint is negated before interpolating. At
/// `t <= 0` and `t >= 1` the stored endpoints are returned unchanged.
#[must_use]
pub fn slerp_shortest(q0: &UnitQuaternion<f32>, q1: &UnitQuaternion<f32>, t: f32) -> UnitQuaternion<f32> {
    if t <= 0.0 {
        return *q0;
    }
    if t >= 1.0 {
        return *q1;
    }

    let a = q0.coords;
    let mut b = q1.coords;
    let mut cos = a.dot(&b);
    if cos < 0.0 {
        b = -b;
        cos = -cos;
    }

    let coords = if cos > 1.0 - SLERP_EPSILON {
        a.lerp(&b, t)
    } else {
        let theta = cos.acos();
        let sin = theta.sin();
        a * (((1.0 - t) * theta).sin() / sin) + b * ((t * theta).sin() / sin)
    };
    UnitQuaternion::new_normalize(Quaternion::from_vector(coords))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn wxyz_roundtrip_preserves_components() {
        let q = quat_from_wxyz([0.5, 0.5, 0.5, 0.5]);
        let back = quat_to_wxyz(&q);
        for (a, b) in back.iter().zip([0.5, 0.5, 0.5, 0.5]) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn scalar_first_identity() {
        let q = quat_from_wxyz([1.0, 0.0, 0.0, 0.0]);
        assert!(q.angle().abs() < 1e-6);
    }

    #[test]
    fn endpoints_are_returned_exactly() {
        let q0 = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3);
        let q1 = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 1.1);
        assert_eq!(slerp_shortest(&q0, &q1, 0.0), q0);
        assert_eq!(slerp_shortest(&q0, &q1, 1.0), q1);
    }

    #[test]
    fn midpoint_is_unit_and_halfway() {
        let q0 = UnitQuaternion::identity();
        let q1 = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let mid = slerp_shortest(&q0, &q1, 0.5);
        assert!((mid.coords.norm() - 1.0).abs() < 1e-6);
        assert!((mid.angle() - FRAC_PI_2 / 2.0).abs() < 1e-5);
    }

    #[test]
    fn negated_endpoint_takes_shorter_arc() {
        let q0 = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.2);
        let q1 = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.6);
        // Same rotation as q1, opposite hemisphere.
        let q1_neg = UnitQuaternion::new_unchecked(-q1.into_inner());
        let mid = slerp_shortest(&q0, &q1_neg, 0.5);
        assert!(q0.coords.dot(&mid.coords) >= 0.0);
        assert!((mid.coords.norm() - 1.0).abs() < 1e-6);
        assert!((mid.angle() - 0.4).abs() < 1e-5);
    }

    #[test]
    fn nearly_parallel_falls_back_to_lerp() {
        let q0 = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.5);
        let q1 = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.500_000_1);
        let mid = slerp_shortest(&q0, &q1, 0.5);
        assert!((mid.coords.norm() - 1.0).abs() < 1e-6);
        assert!(mid.angle_to(&q0) < 1e-4);
    }
}
