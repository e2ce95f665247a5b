//! Motion archive format and the immutable [`MotionClip`].
//!
//! An archive is a JSON document of named arrays:
//!
//! | key                       | shape         | notes                                |
//! |---------------------------|---------------|--------------------------------------|
//! | `dof_names`               | `[J]`         | archive joint ordering               |
//! | `body_names`              | `[B]`         | archive body ordering                |
//! | `dt` (or `fps`)           | scalar        | seconds per frame (`dt = 1 / fps`)   |
//! | `dof_positions`           | `[F][J]`      |                                      |
//! | `dof_velocities`          | `[F][J]`      |                                      |
//! | `body_positions`          | `[F][B][3]`   | world frame                          |
//! | `body_rotations`          | `[F][B][4]`   | scalar-first `[w, x, y, z]`          |
//! | `body_linear_velocities`  | `[F][B][3]`   | world frame                          |
//! | `body_angular_velocities` | `[F][B][3]`   | world frame                          |

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use mimic_core::error::{ArchiveError, NameKind, UnknownNameError};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::names::NameIndexMap;
use crate::quat::{quat_from_wxyz, quat_to_wxyz};

/// Largest tolerated deviation of a stored rotation's norm from 1.
pub const ROTATION_NORM_TOLERANCE: f32 = 1e-3;

// ---------------------------------------------------------------------------
// BodyState
// ---------------------------------------------------------------------------

/// World-frame kinematics of one rigid body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub linear_velocity: Vector3<f32>,
    pub angular_velocity: Vector3<f32>,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

// ---------------------------------------------------------------------------
// MotionArchive
// ---------------------------------------------------------------------------

/// Serialized form of a clip, exactly as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionArchive {
    pub dt: f64,
    pub dof_names: Vec<String>,
    pub body_names: Vec<String>,
    pub dof_positions: Vec<Vec<f32>>,
    pub dof_velocities: Vec<Vec<f32>>,
    pub body_positions: Vec<Vec<[f32; 3]>>,
    pub body_rotations: Vec<Vec<[f32; 4]>>,
    pub body_linear_velocities: Vec<Vec<[f32; 3]>>,
    pub body_angular_velocities: Vec<Vec<[f32; 3]>>,
}

/// On-disk document with every key optional, so a missing key is reported by
/// name instead of as a generic parse failure.
#[derive(Deserialize)]
struct RawArchive {
    dt: Option<f64>,
    fps: Option<f64>,
    dof_names: Option<Vec<String>>,
    body_names: Option<Vec<String>>,
    dof_positions: Option<Vec<Vec<f32>>>,
    dof_velocities: Option<Vec<Vec<f32>>>,
    body_positions: Option<Vec<Vec<[f32; 3]>>>,
    body_rotations: Option<Vec<Vec<[f32; 4]>>>,
    body_linear_velocities: Option<Vec<Vec<[f32; 3]>>>,
    body_angular_velocities: Option<Vec<Vec<[f32; 3]>>>,
}

impl RawArchive {
    fn into_archive(self) -> Result<MotionArchive, ArchiveError> {
        let dt = match (self.dt, self.fps) {
            (Some(dt), _) => dt,
            (None, Some(fps)) if fps > 0.0 => 1.0 / fps,
            (None, Some(fps)) => return Err(ArchiveError::InvalidTimeStep(fps)),
            (None, None) => return Err(ArchiveError::MissingKey("dt")),
        };
        Ok(MotionArchive {
            dt,
            dof_names: required(self.dof_names, "dof_names")?,
            body_names: required(self.body_names, "body_names")?,
            dof_positions: required(self.dof_positions, "dof_positions")?,
            dof_velocities: required(self.dof_velocities, "dof_velocities")?,
            body_positions: required(self.body_positions, "body_positions")?,
            body_rotations: required(self.body_rotations, "body_rotations")?,
            body_linear_velocities: required(self.body_linear_velocities, "body_linear_velocities")?,
            body_angular_velocities: required(
                self.body_angular_velocities,
                "body_angular_velocities",
            )?,
        })
    }
}

fn required<T>(value: Option<T>, key: &'static str) -> Result<T, ArchiveError> {
    value.ok_or(ArchiveError::MissingKey(key))
}

// ---------------------------------------------------------------------------
// MotionClip
// ---------------------------------------------------------------------------

/// One captured motion, validated and laid out frame-major.
///
/// Immutable after construction and `Send + Sync`; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct MotionClip {
    dt: f64,
    num_frames: usize,
    dof_names: Vec<String>,
    body_names: Vec<String>,
    /// `[F * J]`
    pub(crate) dof_positions: Vec<f32>,
    /// `[F * J]`
    pub(crate) dof_velocities: Vec<f32>,
    /// `[F * B]`
    pub(crate) body_positions: Vec<Vector3<f32>>,
    pub(crate) body_rotations: Vec<UnitQuaternion<f32>>,
    pub(crate) body_linear_velocities: Vec<Vector3<f32>>,
    pub(crate) body_angular_velocities: Vec<Vector3<f32>>,
}

impl MotionClip {
    /// Load and validate an archive file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let raw: RawArchive = serde_json::from_reader(reader)?;
        let clip = Self::from_archive(raw.into_archive()?)?;
        info!(
            path = %path.display(),
            frames = clip.num_frames,
            dt = clip.dt,
            duration = clip.duration(),
            dofs = clip.num_dofs(),
            bodies = clip.num_bodies(),
            "loaded motion clip"
        );
        Ok(clip)
    }

    /// Write the clip in archive format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArchiveError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &self.to_archive())?;
        Ok(())
    }

    /// Validate an in-memory archive.
    pub fn from_archive(archive: MotionArchive) -> Result<Self, ArchiveError> {
        if !archive.dt.is_finite() || archive.dt <= 0.0 {
            return Err(ArchiveError::InvalidTimeStep(archive.dt));
        }
        check_unique(&archive.dof_names, NameKind::Joint)?;
        check_unique(&archive.body_names, NameKind::Body)?;

        let num_frames = archive.dof_positions.len();
        if num_frames < 2 {
            return Err(ArchiveError::TooFewFrames(num_frames));
        }
        let num_dofs = archive.dof_names.len();
        let num_bodies = archive.body_names.len();

        let dof_positions = flatten_rows(&archive.dof_positions, "dof_positions", num_frames, num_dofs)?;
        let dof_velocities =
            flatten_rows(&archive.dof_velocities, "dof_velocities", num_frames, num_dofs)?;
        let body_positions =
            vector_rows(&archive.body_positions, "body_positions", num_frames, num_bodies)?;
        let body_linear_velocities = vector_rows(
            &archive.body_linear_velocities,
            "body_linear_velocities",
            num_frames,
            num_bodies,
        )?;
        let body_angular_velocities = vector_rows(
            &archive.body_angular_velocities,
            "body_angular_velocities",
            num_frames,
            num_bodies,
        )?;

        let raw_rotations = flatten_rows(&archive.body_rotations, "body_rotations", num_frames, num_bodies)?;
        let mut body_rotations = Vec::with_capacity(raw_rotations.len());
        for (i, q) in raw_rotations.iter().enumerate() {
            let norm = q.iter().map(|v| v * v).sum::<f32>().sqrt();
            if (norm - 1.0).abs() > ROTATION_NORM_TOLERANCE {
                return Err(ArchiveError::NonUnitRotation {
                    frame: i / num_bodies,
                    body: i % num_bodies,
                    norm,
                });
            }
            body_rotations.push(quat_from_wxyz(*q));
        }

        Ok(Self {
            dt: archive.dt,
            num_frames,
            dof_names: archive.dof_names,
            body_names: archive.body_names,
            dof_positions,
            dof_velocities,
            body_positions,
            body_rotations,
            body_linear_velocities,
            body_angular_velocities,
        })
    }

    /// Serializable copy of the clip.
    #[must_use]
    pub fn to_archive(&self) -> MotionArchive {
        let (j, b) = (self.num_dofs(), self.num_bodies());
        MotionArchive {
            dt: self.dt,
            dof_names: self.dof_names.clone(),
            body_names: self.body_names.clone(),
            dof_positions: split_rows(&self.dof_positions, self.num_frames, j, |v| *v),
            dof_velocities: split_rows(&self.dof_velocities, self.num_frames, j, |v| *v),
            body_positions: split_rows(&self.body_positions, self.num_frames, b, vec3_array),
            body_rotations: split_rows(&self.body_rotations, self.num_frames, b, quat_to_wxyz),
            body_linear_velocities: split_rows(
                &self.body_linear_velocities,
                self.num_frames,
                b,
                vec3_array,
            ),
            body_angular_velocities: split_rows(
                &self.body_angular_velocities,
                self.num_frames,
                b,
                vec3_array,
            ),
        }
    }

    /// Seconds per frame.
    pub const fn dt(&self) -> f64 {
        self.dt
    }

    pub const fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// `(frames - 1) * dt`.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> f64 {
        (self.num_frames - 1) as f64 * self.dt
    }

    pub fn dof_names(&self) -> &[String] {
        &self.dof_names
    }

    pub fn body_names(&self) -> &[String] {
        &self.body_names
    }

    pub fn num_dofs(&self) -> usize {
        self.dof_names.len()
    }

    pub fn num_bodies(&self) -> usize {
        self.body_names.len()
    }

    /// Joint positions of one stored frame, archive ordering.
    pub fn dof_positions(&self, frame: usize) -> &[f32] {
        let j = self.num_dofs();
        &self.dof_positions[frame * j..(frame + 1) * j]
    }

    /// Joint velocities of one stored frame, archive ordering.
    pub fn dof_velocities(&self, frame: usize) -> &[f32] {
        let j = self.num_dofs();
        &self.dof_velocities[frame * j..(frame + 1) * j]
    }

    /// Kinematics of one body at one stored frame.
    pub fn body_state(&self, frame: usize, body: usize) -> BodyState {
        let i = frame * self.num_bodies() + body;
        BodyState {
            position: self.body_positions[i],
            rotation: self.body_rotations[i],
            linear_velocity: self.body_linear_velocities[i],
            angular_velocity: self.body_angular_velocities[i],
        }
    }

    /// Map an external joint ordering onto this clip's joints.
    pub fn get_dof_index<S: AsRef<str>>(&self, names: &[S]) -> Result<NameIndexMap, UnknownNameError> {
        NameIndexMap::build(names, &self.dof_names, NameKind::Joint, "motion archive")
    }

    /// Map an external body list onto this clip's bodies.
    pub fn get_body_index<S: AsRef<str>>(&self, names: &[S]) -> Result<NameIndexMap, UnknownNameError> {
        NameIndexMap::build(names, &self.body_names, NameKind::Body, "motion archive")
    }
}

fn split_rows<T, U>(flat: &[T], num_frames: usize, width: usize, f: impl Fn(&T) -> U) -> Vec<Vec<U>> {
    (0..num_frames)
        .map(|frame| flat[frame * width..(frame + 1) * width].iter().map(&f).collect())
        .collect()
}

fn vec3_array(v: &Vector3<f32>) -> [f32; 3] {
    [v.x, v.y, v.z]
}

fn check_unique(names: &[String], kind: NameKind) -> Result<(), ArchiveError> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ArchiveError::DuplicateName {
                kind,
                name: name.clone(),
            });
        }
    }
    Ok(())
}

/// Check frame count, row width and finiteness, then concatenate rows.
fn flatten_rows<T: Copy + FiniteCheck>(
    rows: &[Vec<T>],
    key: &'static str,
    num_frames: usize,
    width: usize,
) -> Result<Vec<T>, ArchiveError> {
    if rows.len() != num_frames {
        return Err(ArchiveError::FrameCountMismatch {
            key,
            expected: num_frames,
            got: rows.len(),
        });
    }
    let mut flat = Vec::with_capacity(num_frames * width);
    for (frame, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(ArchiveError::RowWidthMismatch {
                key,
                frame,
                expected: width,
                got: row.len(),
            });
        }
        if !row.iter().all(FiniteCheck::is_all_finite) {
            return Err(ArchiveError::NonFinite { key, frame });
        }
        flat.extend_from_slice(row);
    }
    Ok(flat)
}

fn vector_rows(
    rows: &[Vec<[f32; 3]>],
    key: &'static str,
    num_frames: usize,
    width: usize,
) -> Result<Vec<Vector3<f32>>, ArchiveError> {
    Ok(flatten_rows(rows, key, num_frames, width)?
        .into_iter()
        .map(Vector3::from)
        .collect())
}

trait FiniteCheck {
    fn is_all_finite(&self) -> bool;
}

impl FiniteCheck for f32 {
    fn is_all_finite(&self) -> bool {
        self.is_finite()
    }
}

impl<const N: usize> FiniteCheck for [f32; N] {
    fn is_all_finite(&self) -> bool {
        self.iter().all(|v| v.is_finite())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Three frames, `dt = 0.1`, two joints, two bodies. Frame `f` stores
    /// joint values `10f + j` and body positions `(f, b, 10f)`.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn three_frame_archive() -> MotionArchive {
        let frames = 3;
        let mut archive = MotionArchive {
            dt: 0.1,
            dof_names: vec!["hip".into(), "knee".into()],
            body_names: vec!["pelvis".into(), "foot".into()],
            dof_positions: Vec::new(),
            dof_velocities: Vec::new(),
            body_positions: Vec::new(),
            body_rotations: Vec::new(),
            body_linear_velocities: Vec::new(),
            body_angular_velocities: Vec::new(),
        };
        for f in 0..frames {
            let fv = f as f32;
            archive.dof_positions.push(vec![10.0 * fv, 10.0 * fv + 1.0]);
            archive.dof_velocities.push(vec![-fv, -fv - 1.0]);
            archive
                .body_positions
                .push(vec![[fv, 0.0, 10.0 * fv], [fv, 1.0, 10.0 * fv]]);
            let half = 0.25 * fv;
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

    #[test]
    fn from_archive_builds_clip() {
        let clip = MotionClip::from_archive(three_frame_archive()).unwrap();
        assert_eq!(clip.num_frames(), 3);
        assert_eq!(clip.num_dofs(), 2);
        assert_eq!(clip.num_bodies(), 2);
        assert!((clip.duration() - 0.2).abs() < 1e-12);
        assert_eq!(clip.dof_positions(2), &[20.0, 21.0]);
        assert_eq!(clip.body_state(1, 1).position, Vector3::new(1.0, 1.0, 10.0));
    }

    #[test]
    fn rejects_non_positive_dt() {
        let mut archive = three_frame_archive();
        archive.dt = 0.0;
        assert!(matches!(
            MotionClip::from_archive(archive),
            Err(ArchiveError::InvalidTimeStep(_))
        ));
    }

    #[test]
    fn rejects_single_frame() {
        let mut archive = three_frame_archive();
        archive.dof_positions.truncate(1);
        assert!(matches!(
            MotionClip::from_archive(archive),
            Err(ArchiveError::TooFewFrames(1))
        ));
    }

    #[test]
    fn rejects_frame_count_mismatch() {
        let mut archive = three_frame_archive();
        archive.body_linear_velocities.pop();
        let err = MotionClip::from_archive(archive).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::FrameCountMismatch {
                key: "body_linear_velocities",
                expected: 3,
                got: 2
            }
        ));
    }

    #[test]
    fn rejects_row_width_mismatch() {
        let mut archive = three_frame_archive();
        archive.dof_velocities[1].push(0.0);
        assert!(matches!(
            MotionClip::from_archive(archive),
            Err(ArchiveError::RowWidthMismatch { frame: 1, .. })
        ));
    }

    #[test]
    fn rejects_non_unit_rotation() {
        let mut archive = three_frame_archive();
        archive.body_rotations[2][1] = [2.0, 0.0, 0.0, 0.0];
        assert!(matches!(
            MotionClip::from_archive(archive),
            Err(ArchiveError::NonUnitRotation { frame: 2, body: 1, .. })
        ));
    }

    #[test]
    fn rejects_non_finite_values() {
        let mut archive = three_frame_archive();
        archive.body_positions[0][0][2] = f32::NAN;
        assert!(matches!(
            MotionClip::from_archive(archive),
            Err(ArchiveError::NonFinite {
                key: "body_positions",
                frame: 0
            })
        ));
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut archive = three_frame_archive();
        archive.dof_names[1] = "hip".into();
        assert!(matches!(
            MotionClip::from_archive(archive),
            Err(ArchiveError::DuplicateName { kind: NameKind::Joint, .. })
        ));
    }

    #[test]
    fn save_then_load_preserves_clip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walk.json");
        let clip = MotionClip::from_archive(three_frame_archive()).unwrap();
        clip.save(&path).unwrap();
        let loaded = MotionClip::load(&path).unwrap();
        let (a, b) = (loaded.to_archive(), clip.to_archive());
        assert_eq!(a.dof_names, b.dof_names);
        assert_eq!(a.dof_positions, b.dof_positions);
        assert_eq!(a.body_positions, b.body_positions);
        assert!((a.dt - b.dt).abs() < 1e-15);
        for (qa, qb) in a.body_rotations.iter().flatten().zip(b.body_rotations.iter().flatten()) {
            for (x, y) in qa.iter().zip(qb) {
                assert!((x - y).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn load_reports_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        let mut value = serde_json::to_value(three_frame_archive()).unwrap();
        value.as_object_mut().unwrap().remove("body_rotations");
        std::fs::write(&path, value.to_string()).unwrap();
        assert!(matches!(
            MotionClip::load(&path),
            Err(ArchiveError::MissingKey("body_rotations"))
        ));
    }

    #[test]
    fn load_accepts_fps_instead_of_dt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fps.json");
        let mut value = serde_json::to_value(three_frame_archive()).unwrap();
        let obj = value.as_object_mut().unwrap();
        obj.remove("dt");
        obj.insert("fps".into(), serde_json::json!(50.0));
        std::fs::write(&path, value.to_string()).unwrap();
        let clip = MotionClip::load(&path).unwrap();
        assert!((clip.dt() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn load_reports_missing_time_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_dt.json");
        let mut value = serde_json::to_value(three_frame_archive()).unwrap();
        value.as_object_mut().unwrap().remove("dt");
        std::fs::write(&path, value.to_string()).unwrap();
        assert!(matches!(
            MotionClip::load(&path),
            Err(ArchiveError::MissingKey("dt"))
        ));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        assert!(matches!(
            MotionClip::load("/nonexistent/clip.json"),
            Err(ArchiveError::Io(_))
        ));
    }

    #[test]
    fn name_indices_resolve_against_clip() {
        let clip = MotionClip::from_archive(three_frame_archive()).unwrap();
        assert_eq!(clip.get_dof_index(&["knee", "hip"]).unwrap().indices(), &[1, 0]);
        assert_eq!(clip.get_body_index(&["foot"]).unwrap().indices(), &[1]);
        let err = clip.get_body_index(&["head"]).unwrap_err();
        assert_eq!(err.kind, NameKind::Body);
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn clip_is_send_sync() {
        assert_send_sync::<MotionClip>();
    }
}
