//! Synthetic motion archives and matching configurations.

use std::f32::consts::TAU;
use std::path::{Path, PathBuf};

use mimic_core::config::AmpConfig;
use mimic_motion::clip::MotionArchive;

use crate::rng::deterministic_vec;

/// Joint ordering of [`walk_archive`].
pub const WALK_JOINTS: [&str; 5] = [
    "left_hip_pitch_joint",
    "right_hip_pitch_joint",
    "waist_yaw_joint",
    "left_knee_joint",
    "right_knee_joint",
];

/// Body ordering of [`walk_archive`].
pub const WALK_BODIES: [&str; 4] = [
    "pelvis",
    "torso_link",
    "left_ankle_roll_link",
    "right_ankle_roll_link",
];

/// Frame time of [`walk_archive`].
pub const WALK_DT: f64 = 1.0 / 30.0;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

fn empty_archive(dt: f64, dof_names: Vec<String>, body_names: Vec<String>) -> MotionArchive {
    MotionArchive {
        dt,
        dof_names,
        body_names,
        dof_positions: Vec::new(),
        dof_velocities: Vec::new(),
        body_positions: Vec::new(),
        body_rotations: Vec::new(),
        body_linear_velocities: Vec::new(),
        body_angular_velocities: Vec::new(),
    }
}

/// Three frames at `dt = 0.1`: joints `hip`, `knee`; bodies `pelvis`, `foot`.
///
/// Frame `f` stores joint positions `[10f, 10f + 1]`, velocities
/// `[-f, -f - 1]`, pelvis at `(f, 0, 10f)` yawed by `0.5 f` rad, foot at
/// `(f, 1, 10f)` with identity rotation.
#[allow(clippy::cast_precision_loss)]
pub fn three_frame_archive() -> MotionArchive {
    let mut archive = empty_archive(0.1, names(&["hip", "knee"]), names(&["pelvis", "foot"]));
    for f in 0..3 {
        let fv = f as f32;
        let half = 0.25 * fv;
        archive.dof_positions.push(vec![10.0 * fv, 10.0 * fv + 1.0]);
        archive.dof_velocities.push(vec![-fv, -fv - 1.0]);
        archive
            .body_positions
            .push(vec![[fv, 0.0, 10.0 * fv], [fv, 1.0, 10.0 * fv]]);
        archive
            .body_rotations
            .push(vec![[half.cos(), 0.0, 0.0, half.sin()], [1.0, 0.0, 0.0, 0.0]]);
        archive
            .body_linear_velocities
            .push(vec![[fv, fv, fv], [0.0, 0.0, 0.0]]);
        archive
            .body_angular_velocities
            .push(vec![[0.0, 0.0, fv], [0.0, 0.0, 0.0]]);
    }
    archive
}

/// A smooth walking-like cycle over [`WALK_JOINTS`] and [`WALK_BODIES`],
/// `num_frames` frames at [`WALK_DT`].
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn walk_archive(num_frames: usize) -> MotionArchive {
    let mut archive = empty_archive(WALK_DT, names(&WALK_JOINTS), names(&WALK_BODIES));
    let phases = deterministic_vec(WALK_JOINTS.len(), 7);
    let omega = TAU; // one stride per second
    let dt = WALK_DT as f32;

    for f in 0..num_frames {
        let t = f as f32 * dt;
        archive.dof_positions.push(
            phases
                .iter()
                .map(|p| 0.4 * (omega * t + TAU * p).sin())
                .collect(),
        );
        archive.dof_velocities.push(
            phases
                .iter()
                .map(|p| 0.4 * omega * (omega * t + TAU * p).cos())
                .collect(),
        );

        let x = 0.5 * t;
        let z = 0.78 + 0.02 * (2.0 * omega * t).sin();
        let yaw = 0.1 * (omega * t).sin();
        let (s, c) = (0.5 * yaw).sin_cos();
        let yaw_rate = 0.1 * omega * (omega * t).cos();
        let swing = 0.15 * (omega * t).sin();

        archive.body_positions.push(vec![
            [x, 0.0, z],
            [x, 0.0, z + 0.3],
            [x + swing, 0.1, 0.05],
            [x - swing, -0.1, 0.05],
        ]);
        archive.body_rotations.push(vec![
            [c, 0.0, 0.0, s],
            [c, 0.0, 0.0, s],
            [1.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
        ]);
        archive.body_linear_velocities.push(vec![
            [0.5, 0.0, 0.04 * omega * (2.0 * omega * t).cos()],
            [0.5, 0.0, 0.04 * omega * (2.0 * omega * t).cos()],
            [0.5 + 0.15 * omega * (omega * t).cos(), 0.0, 0.0],
            [0.5 - 0.15 * omega * (omega * t).cos(), 0.0, 0.0],
        ]);
        archive.body_angular_velocities.push(vec![
            [0.0, 0.0, yaw_rate],
            [0.0, 0.0, yaw_rate],
            [0.0; 3],
            [0.0; 3],
        ]);
    }
    archive
}

/// Configuration matching [`walk_archive`]: pelvis reference, both ankles as
/// key bodies, `K = 2`, feature width `13 + 2·5 + 3·2 = 29`.
pub fn walk_config(motion_file: impl Into<PathBuf>) -> AmpConfig {
    AmpConfig {
        motion_file: motion_file.into(),
        reference_body: "pelvis".into(),
        key_body_names: names(&["left_ankle_roll_link", "right_ankle_roll_link"]),
        num_amp_observations: 2,
        amp_observation_dim: 29,
        root_lift: 0.05,
        seed: 42,
        num_envs: 4,
        feature_terms: None,
    }
}

/// Write `archive` as JSON to `path`.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_archive(path: impl AsRef<Path>, archive: &MotionArchive) {
    let json = serde_json::to_string(archive).expect("serialize archive");
    std::fs::write(path, json).expect("write archive");
}

/// Write `config` as TOML to `path`.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_config(path: impl AsRef<Path>, config: &AmpConfig) {
    let text = toml::to_string(config).expect("serialize config");
    std::fs::write(path, text).expect("write config");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
