//! Temporal sampling of a [`MotionClip`] at arbitrary query times.

use rand::Rng;
use rand::distributions::Uniform;

use crate::clip::{BodyState, MotionClip};
use crate::quat::slerp_shortest;

/// Blend weights are snapped to this many decimal places.
const WEIGHT_SCALE: f64 = 1e5;

// ---------------------------------------------------------------------------
// FrameBlend
// ---------------------------------------------------------------------------

/// The two stored frames bracketing a query time and the blend between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameBlend {
    pub f0: usize,
    pub f1: usize,
    /// Weight of `f1`, in `[0, 1)`.
    pub weight: f32,
}

impl FrameBlend {
    /// `true` when the query lands on stored frame `f0`.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.weight == 0.0
    }
}

// ---------------------------------------------------------------------------
// SampledFrame
// ---------------------------------------------------------------------------

/// Interpolated kinematics for a batch of query times, in archive ordering.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    num_samples: usize,
    num_dofs: usize,
    num_bodies: usize,
    dof_positions: Vec<f32>,
    dof_velocities: Vec<f32>,
    bodies: Vec<BodyState>,
}

impl SampledFrame {
    pub const fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub const fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub const fn num_bodies(&self) -> usize {
        self.num_bodies
    }

    pub fn dof_positions(&self, sample: usize) -> &[f32] {
        &self.dof_positions[sample * self.num_dofs..(sample + 1) * self.num_dofs]
    }

    pub fn dof_velocities(&self, sample: usize) -> &[f32] {
        &self.dof_velocities[sample * self.num_dofs..(sample + 1) * self.num_dofs]
    }

    /// All bodies of one sample.
    pub fn bodies(&self, sample: usize) -> &[BodyState] {
        &self.bodies[sample * self.num_bodies..(sample + 1) * self.num_bodies]
    }

    pub fn body(&self, sample: usize, body: usize) -> &BodyState {
        &self.bodies[sample * self.num_bodies + body]
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

impl MotionClip {
    /// Locate query time `t` on the frame grid.
    ///
    /// Times at or before zero (and NaN) map to frame 0; times at or past the
    /// last frame map to the last frame. A weight that snaps to 1 advances to
    /// the next frame, so multiples of `dt` always land on a stored frame.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn frame_blend(&self, t: f64) -> FrameBlend {
        let last = self.num_frames() - 1;
        if t.is_nan() || t <= 0.0 {
            return FrameBlend {
                f0: 0,
                f1: 1.min(last),
                weight: 0.0,
            };
        }

        let x = t / self.dt();
        let mut f0 = x.floor();
        let mut weight = ((x - f0) * WEIGHT_SCALE).round() / WEIGHT_SCALE;
        if weight >= 1.0 {
            f0 += 1.0;
            weight = 0.0;
        }
        if f0 >= last as f64 {
            return FrameBlend {
                f0: last,
                f1: last,
                weight: 0.0,
            };
        }

        let f0 = f0 as usize;
        FrameBlend {
            f0,
            f1: f0 + 1,
            weight: weight as f32,
        }
    }

    /// Interpolate the clip at every query time.
    ///
    /// Queries are independent: any order, duplicates and out-of-range values
    /// are accepted.
    #[must_use]
    pub fn sample(&self, times: &[f64]) -> SampledFrame {
        let j = self.num_dofs();
        let b = self.num_bodies();
        let mut out = SampledFrame {
            num_samples: times.len(),
            num_dofs: j,
            num_bodies: b,
            dof_positions: Vec::with_capacity(times.len() * j),
            dof_velocities: Vec::with_capacity(times.len() * j),
            bodies: Vec::with_capacity(times.len() * b),
        };

        for &t in times {
            let blend = self.frame_blend(t);
            if blend.is_exact() {
                out.dof_positions.extend_from_slice(self.dof_positions(blend.f0));
                out.dof_velocities.extend_from_slice(self.dof_velocities(blend.f0));
                out.bodies.extend((0..b).map(|body| self.body_state(blend.f0, body)));
                continue;
            }

            let w = blend.weight;
            lerp_into(
                self.dof_positions(blend.f0),
                self.dof_positions(blend.f1),
                w,
                &mut out.dof_positions,
            );
            lerp_into(
                self.dof_velocities(blend.f0),
                self.dof_velocities(blend.f1),
                w,
                &mut out.dof_velocities,
            );
            out.bodies.extend((0..b).map(|body| {
                let a = self.body_state(blend.f0, body);
                let c = self.body_state(blend.f1, body);
                BodyState {
                    position: a.position.lerp(&c.position, w),
                    rotation: slerp_shortest(&a.rotation, &c.rotation, w),
                    linear_velocity: a.linear_velocity.lerp(&c.linear_velocity, w),
                    angular_velocity: a.angular_velocity.lerp(&c.angular_velocity, w),
                }
            }));
        }
        out
    }

    /// Draw `n` independent times uniformly from `[0, duration)`.
    pub fn sample_times<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<f64> {
        let dist = Uniform::new(0.0, self.duration());
        (0..n).map(|_| rng.sample(dist)).collect()
    }

    /// History query times `t, t - dt, ..., t - (k-1) dt` for every `t`,
    /// flattened sample-major.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn history_times(&self, current: &[f64], k: usize) -> Vec<f64> {
        let dt = self.dt();
        current
            .iter()
            .flat_map(|&t| (0..k).map(move |j| t - j as f64 * dt))
            .collect()
    }
}

fn lerp_into(a: &[f32], b: &[f32], w: f32, dst: &mut Vec<f32>) {
    dst.extend(a.iter().zip(b).map(|(x, y)| (1.0 - w) * x + w * y));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::tests::three_frame_archive;
    use nalgebra::Vector3;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn clip() -> MotionClip {
        MotionClip::from_archive(three_frame_archive()).unwrap()
    }

    fn assert_same_sample(a: &SampledFrame, i: usize, b: &SampledFrame, j: usize) {
        assert_eq!(a.dof_positions(i), b.dof_positions(j));
        assert_eq!(a.dof_velocities(i), b.dof_velocities(j));
        assert_eq!(a.bodies(i), b.bodies(j));
    }

    #[test]
    fn multiples_of_dt_return_stored_frames() {
        let clip = clip();
        for f in 0..clip.num_frames() {
            #[allow(clippy::cast_precision_loss)]
            let t = f as f64 * 0.1;
            let s = clip.sample(&[t]);
            assert_eq!(s.dof_positions(0), clip.dof_positions(f));
            assert_eq!(s.dof_velocities(0), clip.dof_velocities(f));
            for body in 0..clip.num_bodies() {
                assert_eq!(*s.body(0, body), clip.body_state(f, body));
            }
        }
    }

    #[test]
    fn weight_snapping_advances_frame() {
        // 0.3 / 0.1 is just below 3 in f64.
        let archive = {
            let mut a = three_frame_archive();
            a.dof_positions.push(vec![30.0, 31.0]);
            a.dof_velocities.push(vec![-3.0, -4.0]);
            a.body_positions.push(vec![[3.0, 0.0, 30.0], [3.0, 1.0, 30.0]]);
            a.body_rotations.push(vec![[1.0, 0.0, 0.0, 0.0]; 2]);
            a.body_linear_velocities.push(vec![[0.0; 3]; 2]);
            a.body_angular_velocities.push(vec![[0.0; 3]; 2]);
            a
        };
        let clip = MotionClip::from_archive(archive).unwrap();
        let blend = clip.frame_blend(0.3);
        assert_eq!(blend.f0, 3);
        assert!(blend.is_exact());
        assert_eq!(clip.sample(&[0.3]).dof_positions(0), &[30.0, 31.0]);
    }

    #[test]
    fn midpoint_is_mean_of_neighbours() {
        let s = clip().sample(&[0.05]);
        assert_eq!(s.dof_positions(0), &[5.0, 6.0]);
        assert_eq!(s.dof_velocities(0), &[-0.5, -1.5]);
        let pelvis = s.body(0, 0);
        assert!((pelvis.position - Vector3::new(0.5, 0.0, 5.0)).norm() < 1e-6);
        assert!((pelvis.rotation.angle() - 0.25).abs() < 1e-5);
        assert!((pelvis.linear_velocity - Vector3::new(0.5, 0.5, 0.5)).norm() < 1e-6);
        assert!((pelvis.angular_velocity - Vector3::new(0.0, 0.0, 0.5)).norm() < 1e-6);
        let foot = s.body(0, 1);
        assert_eq!(foot.linear_velocity, Vector3::zeros());
        assert_eq!(foot.angular_velocity, Vector3::zeros());
    }

    #[test]
    fn past_duration_returns_final_frame() {
        let clip = clip();
        let just_before_end = clip.duration() - 1e-9;
        let s = clip.sample(&[just_before_end, 0.25, clip.duration(), 100.0, f64::INFINITY]);
        for i in 0..s.num_samples() {
            assert_eq!(s.dof_positions(i), clip.dof_positions(2));
            assert_same_sample(&s, i, &s, 0);
        }
    }

    #[test]
    fn negative_and_nan_times_return_first_frame() {
        let clip = clip();
        let s = clip.sample(&[-0.5, f64::NAN]);
        assert_eq!(s.dof_positions(0), clip.dof_positions(0));
        assert_eq!(s.dof_positions(1), clip.dof_positions(0));
    }

    #[test]
    fn batch_order_does_not_matter() {
        let clip = clip();
        let forward = clip.sample(&[0.0, 0.07, 0.13, 0.2]);
        let shuffled = clip.sample(&[0.13, 0.2, 0.0, 0.07]);
        assert_same_sample(&forward, 0, &shuffled, 2);
        assert_same_sample(&forward, 1, &shuffled, 3);
        assert_same_sample(&forward, 2, &shuffled, 0);
        assert_same_sample(&forward, 3, &shuffled, 1);
    }

    #[test]
    fn empty_query_yields_empty_frame() {
        let s = clip().sample(&[]);
        assert_eq!(s.num_samples(), 0);
    }

    #[test]
    fn sample_times_within_duration() {
        let clip = clip();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let times = clip.sample_times(&mut rng, 1000);
        assert_eq!(times.len(), 1000);
        assert!(times.iter().all(|&t| (0.0..clip.duration()).contains(&t)));
    }

    #[test]
    fn sample_times_deterministic_per_seed() {
        let clip = clip();
        let a = clip.sample_times(&mut ChaCha8Rng::seed_from_u64(3), 16);
        let b = clip.sample_times(&mut ChaCha8Rng::seed_from_u64(3), 16);
        assert_eq!(a, b);
    }

    #[test]
    fn history_times_are_sample_major() {
        let times = clip().history_times(&[0.12, 0.2], 2);
        assert_eq!(times.len(), 4);
        assert!((times[0] - 0.12).abs() < 1e-12);
        assert!((times[1] - 0.02).abs() < 1e-12);
        assert!((times[2] - 0.2).abs() < 1e-12);
        assert!((times[3] - 0.1).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn blend_stays_on_grid(t in -1.0f64..1.0) {
            let clip = clip();
            let blend = clip.frame_blend(t);
            prop_assert!(blend.f0 <= blend.f1);
            prop_assert!(blend.f1 < clip.num_frames());
            prop_assert!((0.0..1.0).contains(&blend.weight));
        }

        #[test]
        fn interpolated_joints_stay_between_neighbours(t in 0.0f64..0.2) {
            let clip = clip();
            let blend = clip.frame_blend(t);
            let s = clip.sample(&[t]);
            let a = clip.dof_positions(blend.f0);
            let b = clip.dof_positions(blend.f1);
            for (i, v) in s.dof_positions(0).iter().enumerate() {
                prop_assert!(*v >= a[i].min(b[i]) - 1e-4);
                prop_assert!(*v <= a[i].max(b[i]) + 1e-4);
            }
        }

        #[test]
        fn sampled_rotations_are_unit(t in -0.5f64..0.5) {
            let s = clip().sample(&[t]);
            for body in s.bodies(0) {
                prop_assert!((body.rotation.coords.norm() - 1.0).abs() < 1e-5);
            }
        }
    }
}
