//! # Aspects: one tracked subregion and its trajectories
//!
//! An [`Aspect`] pairs an [`AnatomicalStructure`] (body, face, hand…) with the trajectories
//! computed for it. Raw tracker output enters through [`Aspect::add_tracked_points`], which
//! builds the `3d_xyz` trajectory; calculations of the
//! [`biomechanics`](crate::biomechanics) module read it and store their outputs back under
//! the names of [`TrajectoryName`]. The tracker's per-marker
//! [`ReprojectionError`] can be attached next to them with
//! [`Aspect::add_reprojection_error`].
use std::collections::BTreeMap;
use std::fmt;

use crate::anatomical_structure::AnatomicalStructure;
use crate::bonefit_errors::BonefitError;
use crate::constants::NameMap;
use crate::reprojection_error::{ErrorFrames, ReprojectionError};
use crate::trajectory::{TrackedFrames, Trajectory};

/// Canonical names under which an aspect stores its trajectories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrajectoryName {
    /// Raw tracked points plus virtual markers.
    Xyz,
    /// Output of rigid bone enforcement.
    RigidXyz,
    TotalBodyCom,
    SegmentCom,
}

impl TrajectoryName {
    pub const ALL: [TrajectoryName; 4] = [
        TrajectoryName::Xyz,
        TrajectoryName::RigidXyz,
        TrajectoryName::TotalBodyCom,
        TrajectoryName::SegmentCom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TrajectoryName::Xyz => "3d_xyz",
            TrajectoryName::RigidXyz => "rigid_3d_xyz",
            TrajectoryName::TotalBodyCom => "total_body_com",
            TrajectoryName::SegmentCom => "segment_com",
        }
    }
}

impl fmt::Display for TrajectoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named anatomical structure and its trajectories.
#[derive(Debug, Clone, PartialEq)]
pub struct Aspect {
    name: String,
    anatomical_structure: AnatomicalStructure,
    trajectories: NameMap<Trajectory>,
    reprojection_error: Option<ReprojectionError>,
    metadata: BTreeMap<String, String>,
}

impl Aspect {
    pub fn new(name: impl Into<String>, anatomical_structure: AnatomicalStructure) -> Self {
        Aspect {
            name: name.into(),
            anatomical_structure,
            trajectories: NameMap::default(),
            reprojection_error: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn anatomical_structure(&self) -> &AnatomicalStructure {
        &self.anatomical_structure
    }

    /// Ingest raw tracker rows as the `3d_xyz` trajectory, replacing any previous one.
    ///
    /// See [`Trajectory::from_tracked_points`] for the expected layout and errors.
    pub fn add_tracked_points(&mut self, frames: &TrackedFrames) -> Result<(), BonefitError> {
        let xyz = Trajectory::from_tracked_points(
            TrajectoryName::Xyz.as_str(),
            frames,
            &self.anatomical_structure,
        )?;
        self.add_trajectory(xyz);
        Ok(())
    }

    /// Store `trajectory` under its own name, replacing a trajectory of the same name.
    pub fn add_trajectory(&mut self, trajectory: Trajectory) {
        self.trajectories
            .insert(trajectory.name().to_string(), trajectory);
    }

    pub fn trajectory(&self, name: &str) -> Option<&Trajectory> {
        self.trajectories.get(name)
    }

    /// Names of the stored trajectories, sorted.
    pub fn trajectory_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.trajectories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Stored trajectories, sorted by name.
    pub fn trajectories(&self) -> impl Iterator<Item = &Trajectory> {
        self.trajectory_names()
            .into_iter()
            .filter_map(|name| self.trajectories.get(name))
    }

    pub fn xyz(&self) -> Option<&Trajectory> {
        self.trajectory(TrajectoryName::Xyz.as_str())
    }

    pub fn rigid_xyz(&self) -> Option<&Trajectory> {
        self.trajectory(TrajectoryName::RigidXyz.as_str())
    }

    pub fn total_body_com(&self) -> Option<&Trajectory> {
        self.trajectory(TrajectoryName::TotalBodyCom.as_str())
    }

    pub fn segment_com(&self) -> Option<&Trajectory> {
        self.trajectory(TrajectoryName::SegmentCom.as_str())
    }

    /// Attach the tracker's reprojection error, one value per tracked point and frame,
    /// replacing any previous one.
    ///
    /// Return
    /// ----------
    /// * `Err(BonefitError::ShapeMismatch)` if a row does not hold one value per tracked point,
    ///   or if a `3d_xyz` trajectory is stored with a different number of frames.
    pub fn add_reprojection_error(&mut self, frames: &ErrorFrames) -> Result<(), BonefitError> {
        if let Some(xyz) = self.xyz() {
            if xyz.num_frames() != frames.len() {
                return Err(BonefitError::ShapeMismatch {
                    context: format!("frames of reprojection error of aspect '{}'", self.name),
                    expected: xyz.num_frames(),
                    found: frames.len(),
                });
            }
        }

        let error = ReprojectionError::from_frames(
            frames,
            self.anatomical_structure.tracked_point_names().to_vec(),
        )?;
        self.reprojection_error = Some(error);
        Ok(())
    }

    pub fn reprojection_error(&self) -> Option<&ReprojectionError> {
        self.reprojection_error.as_ref()
    }

    /// Merge `metadata` into the aspect's metadata, overriding existing keys.
    pub fn add_metadata<K, V>(&mut self, metadata: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata.extend(
            metadata
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Aspect: {}", self.name)?;
        writeln!(f, "  Anatomical Structure:\n{}", self.anatomical_structure)?;
        if self.trajectories.is_empty() {
            writeln!(f, "  Trajectories: No trajectories")?;
        } else {
            writeln!(
                f,
                "  Trajectories: {} trajectories: {:?}",
                self.trajectories.len(),
                self.trajectory_names()
            )?;
        }
        match &self.reprojection_error {
            Some(error) => writeln!(f, "  Error: {error}")?,
            None => writeln!(f, "  Error: No reprojection error")?,
        }
        if self.metadata.is_empty() {
            write!(f, "  Metadata: No metadata")
        } else {
            write!(f, "  Metadata: {:?}", self.metadata)
        }
    }
}
