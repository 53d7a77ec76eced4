//! # Rigid bone enforcement
//!
//! Pose trackers produce bones whose length drifts from frame to frame. This module replaces
//! every bone of a [`JointHierarchy`] by a bone of constant length, keeping its measured
//! orientation.
//!
//! ## Algorithm
//! -----------------
//! 1. **Statistics** – for every `(parent, child)` edge, the Euclidean length is measured at
//!    each frame. NaN lengths are ignored; the median and the population standard deviation
//!    of the remaining lengths are kept ([`BoneStatistics`]).
//! 2. **Forward pass** – edges are visited in breadth-first order from the root, every frame
//!    independently:
//!
//! ```text
//! direction ← (1, 0, 0)
//! for (parent, child) in bfs_edges:
//!     v ← raw[child] − rigid[parent]
//!     if |v| is finite and |v| > DIRECTION_EPS: direction ← v / |v|
//!     rigid[child] ← rigid[parent] + direction × median(parent, child)
//! ```
//!
//! The root and every marker outside the hierarchy keep their raw positions. When a bone is
//! degenerate at some frame (coincident or NaN endpoints), it reuses the last valid direction
//! of that frame.
//!
//! ## Errors
//! -----------------
//! A hierarchy that is not a tree is refused by [`RigidBoneEngine::new`] with
//! [`BonefitError::InvalidJointHierarchy`]. A hierarchy marker missing from the trajectory
//! fails with [`BonefitError::MarkerNotFound`].
use std::fmt;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use tracing::{debug, warn};

use crate::anatomical_structure::JointHierarchy;
use crate::aspect::{Aspect, TrajectoryName};
use crate::biomechanics::{AnatomicalCalculation, CalculationResult};
use crate::bonefit_errors::BonefitError;
use crate::constants::{MarkerName, Position, DEFAULT_DIRECTION, DIRECTION_EPS};
use crate::trajectory::Trajectory;

/// Length statistics of one bone over all frames.
///
/// Fields
/// -----------------
/// * `median` – median of the non-NaN lengths (mean of the two middle values for an even
///   count), the target length of the bone.
/// * `stdev` – population standard deviation of the non-NaN lengths.
/// * `valid_frames` – number of frames with a non-NaN length.
///
/// Both `median` and `stdev` are NaN when `valid_frames == 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneStatistics {
    pub parent: MarkerName,
    pub child: MarkerName,
    pub median: f64,
    pub stdev: f64,
    pub valid_frames: usize,
}

impl fmt::Display for BoneStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: median = {:.4}, stdev = {:.4} ({} frames)",
            self.parent, self.child, self.median, self.stdev, self.valid_frames
        )
    }
}

/// Median and population standard deviation of the non-NaN values, with their count.
fn nan_median_stdev(lengths: impl IntoIterator<Item = f64>) -> (f64, f64, usize) {
    let sorted: Vec<f64> = lengths
        .into_iter()
        .filter(|length| !length.is_nan())
        .map(OrderedFloat)
        .sorted()
        .map(OrderedFloat::into_inner)
        .collect();

    let n = sorted.len();
    if n == 0 {
        return (f64::NAN, f64::NAN, 0);
    }

    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    };

    let mean = sorted.iter().sum::<f64>() / n as f64;
    let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;

    (median, variance.sqrt(), n)
}

/// Enforces constant bone lengths along a joint hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct RigidBoneEngine<'a> {
    hierarchy: &'a JointHierarchy,
}

impl<'a> RigidBoneEngine<'a> {
    /// Engine over `hierarchy`, which must be a tree.
    ///
    /// A hierarchy taken from an [`AnatomicalStructure`](crate::anatomical_structure::AnatomicalStructure)
    /// was already checked when the structure was built. Hand-made or deserialized hierarchies
    /// are checked here, since a marker with two parents would be moved by both bones and
    /// keep only one of their lengths.
    ///
    /// Return
    /// ----------
    /// * `Err(BonefitError::InvalidJointHierarchy)` if `hierarchy` is not a tree, see
    ///   [`JointHierarchy::check_tree`].
    pub fn new(hierarchy: &'a JointHierarchy) -> Result<Self, BonefitError> {
        hierarchy.check_tree()?;
        Ok(RigidBoneEngine { hierarchy })
    }

    /// Resolve the breadth-first edges to column indices of `trajectory`.
    fn edge_indices(&self, trajectory: &Trajectory) -> Result<Vec<(usize, usize)>, BonefitError> {
        let index = |marker: &str| {
            trajectory
                .marker_index(marker)
                .ok_or_else(|| BonefitError::MarkerNotFound(marker.to_string()))
        };
        self.hierarchy
            .bfs_edges()
            .into_iter()
            .map(|(parent, child)| Ok::<_, BonefitError>((index(parent)?, index(child)?)))
            .collect()
    }

    /// Length statistics of every bone, in breadth-first order from the root.
    ///
    /// Arguments
    /// -----------------
    /// * `trajectory`: raw marker positions holding every hierarchy marker.
    ///
    /// Return
    /// ----------
    /// * One [`BoneStatistics`] per edge, in the order of [`JointHierarchy::bfs_edges`].
    /// * `Err(BonefitError::MarkerNotFound)` if a hierarchy marker is not in `trajectory`.
    pub fn bone_statistics(
        &self,
        trajectory: &Trajectory,
    ) -> Result<Vec<BoneStatistics>, BonefitError> {
        let indices = self.edge_indices(trajectory)?;

        let statistics = self
            .hierarchy
            .bfs_edges()
            .into_iter()
            .zip(indices)
            .map(|((parent, child), (parent_idx, child_idx))| {
                let lengths = trajectory
                    .frames()
                    .map(|row| (row[child_idx] - row[parent_idx]).norm());
                let (median, stdev, valid_frames) = nan_median_stdev(lengths);

                let bone = BoneStatistics {
                    parent: parent.to_string(),
                    child: child.to_string(),
                    median,
                    stdev,
                    valid_frames,
                };
                if valid_frames == 0 {
                    warn!(parent, child, "bone has no valid length in any frame");
                } else {
                    debug!("{bone}");
                }
                bone
            })
            .collect();

        Ok(statistics)
    }

    /// Forward pass with precomputed statistics.
    ///
    /// `statistics` must be aligned with [`JointHierarchy::bfs_edges`], as returned by
    /// [`bone_statistics`](RigidBoneEngine::bone_statistics).
    pub fn forward_pass(
        &self,
        trajectory: &Trajectory,
        statistics: &[BoneStatistics],
    ) -> Result<Trajectory, BonefitError> {
        let indices = self.edge_indices(trajectory)?;
        if indices.len() != statistics.len() {
            return Err(BonefitError::ShapeMismatch {
                context: "bone statistics of the joint hierarchy".into(),
                expected: indices.len(),
                found: statistics.len(),
            });
        }

        let edges: Vec<(usize, usize, f64)> = indices
            .into_iter()
            .zip(statistics)
            .map(|((parent, child), bone)| (parent, child, bone.median))
            .collect();

        let seed = Position::from(DEFAULT_DIRECTION);
        let width = trajectory.num_markers().max(1);
        let mut rigid = trajectory.as_slice().to_vec();

        for row in rigid.chunks_exact_mut(width) {
            let mut direction = seed;
            for &(parent, child, length) in &edges {
                let vector = row[child] - row[parent];
                let norm = vector.norm();
                if norm.is_finite() && norm > DIRECTION_EPS {
                    direction = vector / norm;
                }
                row[child] = row[parent] + direction * length;
            }
        }

        Trajectory::new(
            TrajectoryName::RigidXyz.as_str(),
            rigid,
            trajectory.marker_names().to_vec(),
            trajectory.num_frames(),
        )
    }

    /// Compute the bone statistics of `trajectory`, then rigidify it.
    ///
    /// The output is named `rigid_3d_xyz` and has the same markers as the input.
    pub fn enforce(&self, trajectory: &Trajectory) -> Result<Trajectory, BonefitError> {
        let statistics = self.bone_statistics(trajectory)?;
        self.forward_pass(trajectory, &statistics)
    }
}

/// Pipeline task storing `rigid_3d_xyz` on the aspect.
#[derive(Debug, Clone, Copy, Default)]
pub struct RigidBonesEnforcement;

impl AnatomicalCalculation for RigidBonesEnforcement {
    fn name(&self) -> &'static str {
        "rigid_bones"
    }

    fn calculate(&self, aspect: &Aspect) -> Result<CalculationResult, BonefitError> {
        let Some(hierarchy) = aspect.anatomical_structure().joint_hierarchy() else {
            return Ok(CalculationResult::skipped(format!(
                "No joint hierarchy defined for aspect: {}, skipping rigid bones enforcement",
                aspect.name()
            )));
        };
        let Some(trajectory) = aspect.xyz() else {
            return Ok(CalculationResult::skipped(format!(
                "No {} trajectory for aspect: {}, skipping rigid bones enforcement",
                TrajectoryName::Xyz,
                aspect.name()
            )));
        };

        debug!(aspect = aspect.name(), "enforcing rigid bones");
        let rigid = RigidBoneEngine::new(hierarchy)?.enforce(trajectory)?;

        Ok(CalculationResult::succeeded(
            [rigid],
            format!("Successfully enforced rigid bones for aspect: {}", aspect.name()),
        ))
    }

    fn store(&self, aspect: &mut Aspect, mut result: CalculationResult) {
        if let Some(rigid) = result.take(TrajectoryName::RigidXyz) {
            aspect.add_trajectory(rigid);
        }
    }
}

#[cfg(test)]
mod rigid_bones_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_median_and_stdev() {
        let (median, stdev, n) = nan_median_stdev([3.0, 1.0, 2.0]);
        assert_eq!(median, 2.0);
        assert_relative_eq!(stdev, (2.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_eq!(n, 3);

        let (median, stdev, n) = nan_median_stdev([4.0, f64::NAN, 1.0, 2.0, 3.0]);
        assert_eq!(median, 2.5);
        assert_relative_eq!(stdev, 1.25_f64.sqrt(), epsilon = 1e-12);
        assert_eq!(n, 4);

        let (median, stdev, n) = nan_median_stdev([f64::NAN, f64::NAN]);
        assert!(median.is_nan());
        assert!(stdev.is_nan());
        assert_eq!(n, 0);
    }

    fn chain(frames: &[[Position; 3]]) -> Trajectory {
        Trajectory::new(
            "3d_xyz",
            frames.iter().flatten().copied().collect(),
            vec!["a".into(), "b".into(), "c".into()],
            frames.len(),
        )
        .unwrap()
    }

    #[test]
    fn test_degenerate_bone_reuses_previous_direction() {
        let hierarchy = JointHierarchy::new("a").joint("a", ["b"]).joint("b", ["c"]);
        let trajectory = chain(&[
            [
                Position::new(0.0, 0.0, 0.0),
                Position::new(0.0, 2.0, 0.0),
                Position::new(0.0, 4.0, 0.0),
            ],
            [
                Position::new(0.0, 0.0, 0.0),
                Position::new(0.0, 2.0, 0.0),
                Position::new(0.0, 2.0, 0.0),
            ],
            [
                Position::new(0.0, 0.0, 0.0),
                Position::new(0.0, 2.0, 0.0),
                Position::new(0.0, 4.0, 0.0),
            ],
        ]);

        let rigid = RigidBoneEngine::new(&hierarchy).unwrap().enforce(&trajectory).unwrap();
        // b→c is coincident at frame 1: it follows a→b, i.e. +Y.
        assert_relative_eq!(
            *rigid.position(1, 2).unwrap(),
            Position::new(0.0, 4.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_degenerate_first_bone_uses_seed() {
        let hierarchy = JointHierarchy::new("a").joint("a", ["b"]);
        let trajectory = Trajectory::new(
            "3d_xyz",
            vec![
                Position::new(1.0, 1.0, 1.0),
                Position::new(1.0, 1.0, 1.0),
                Position::new(0.0, 0.0, 0.0),
                Position::new(0.0, 0.0, 2.0),
                Position::new(0.0, 0.0, 0.0),
                Position::new(0.0, 0.0, 2.0),
            ],
            vec!["a".into(), "b".into()],
            3,
        )
        .unwrap();

        let rigid = RigidBoneEngine::new(&hierarchy).unwrap().enforce(&trajectory).unwrap();
        assert_relative_eq!(
            *rigid.position(0, 1).unwrap(),
            Position::new(3.0, 1.0, 1.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_missing_hierarchy_marker() {
        let hierarchy = JointHierarchy::new("a").joint("a", ["wrist"]);
        let trajectory = chain(&[[Position::zeros(); 3]]);
        let err = RigidBoneEngine::new(&hierarchy)
            .unwrap()
            .enforce(&trajectory)
            .unwrap_err();
        assert_eq!(err, BonefitError::MarkerNotFound("wrist".into()));
    }

    #[test]
    fn test_statistics_alignment_checked() {
        let hierarchy = JointHierarchy::new("a").joint("a", ["b", "c"]);
        let trajectory = chain(&[[Position::zeros(); 3]]);
        let engine = RigidBoneEngine::new(&hierarchy).unwrap();
        let mut statistics = engine.bone_statistics(&trajectory).unwrap();
        statistics.pop();
        assert!(matches!(
            engine.forward_pass(&trajectory, &statistics),
            Err(BonefitError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_engine_refuses_non_tree() {
        let diamond = JointHierarchy::new("a")
            .joint("a", ["b", "c"])
            .joint("b", ["d"])
            .joint("c", ["d"]);
        assert_eq!(
            RigidBoneEngine::new(&diamond).unwrap_err(),
            BonefitError::InvalidJointHierarchy("marker 'd' has more than one parent".into())
        );

        let repeated = JointHierarchy::new("a").joint("a", ["b"]).joint("a", ["c"]);
        assert!(matches!(
            RigidBoneEngine::new(&repeated),
            Err(BonefitError::InvalidJointHierarchy(_))
        ));
    }

    #[test]
    fn test_display() {
        let bone = BoneStatistics {
            parent: "hip".into(),
            child: "knee".into(),
            median: 0.5,
            stdev: 0.01,
            valid_frames: 10,
        };
        assert_eq!(
            bone.to_string(),
            "hip -> knee: median = 0.5000, stdev = 0.0100 (10 frames)"
        );
    }
}
