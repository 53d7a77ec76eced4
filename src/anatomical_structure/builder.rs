//! # Staged builder for [`AnatomicalStructure`]
//!
//! The builder accepts the structure's tables in their dependency order:
//!
//! ```text
//! tracked points ─► virtual markers ─► segment connections ─► center of mass
//!        │
//!        └──────────────────────────────────────────────► joint hierarchy
//! ```
//!
//! Every `with_*` stage consumes the builder, validates its input against the *cumulative*
//! set of valid marker names (tracked points, then each virtual marker as soon as it is
//! accepted) and returns a new builder, or a configuration [`BonefitError`]. Only the tracked
//! points are mandatory; [`AnatomicalStructureBuilder::build`] fails without them.
//!
//! Validation rules
//! -----------------
//! * Tracked points: non-empty, unique names.
//! * Virtual markers (in definition order): as many weights as names, weights summing into
//!   [`WEIGHT_SUM_MIN`, `WEIGHT_SUM_MAX`], components already valid, new unique name.
//! * Segment connections: unique segment names, proximal and distal markers valid.
//! * Center of mass: segment connections already set, every segment declared, `length` and
//!   `percentage` in `[0, 1]`. A total percentage far from 1 is only logged.
//! * Joint hierarchy: see [`JointHierarchy`].
//!
//! Each stage may be applied at most once, and virtual markers are refused once segment
//! connections or a joint hierarchy were set.
use std::collections::HashSet;

use ahash::RandomState;
use tracing::warn;

use crate::anatomical_structure::{
    AnatomicalStructure, JointHierarchy, SegmentComDefinition, SegmentConnection,
    VirtualMarkerDefinition,
};
use crate::bonefit_errors::BonefitError;
use crate::constants::{MarkerName, MASS_PERCENTAGE_TOLERANCE, WEIGHT_SUM_MAX, WEIGHT_SUM_MIN};

/// Builder for [`AnatomicalStructure`], with staged validation.
#[derive(Debug, Clone, Default)]
pub struct AnatomicalStructureBuilder {
    tracked_point_names: Option<Vec<MarkerName>>,
    virtual_markers: Option<Vec<VirtualMarkerDefinition>>,
    segment_connections: Option<Vec<SegmentConnection>>,
    center_of_mass_definitions: Option<Vec<SegmentComDefinition>>,
    joint_hierarchy: Option<JointHierarchy>,
    valid_markers: HashSet<MarkerName, RandomState>,
}

impl AnatomicalStructureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_tracked_points(&self, stage: &'static str) -> Result<(), BonefitError> {
        if self.tracked_point_names.is_none() {
            return Err(BonefitError::MissingPrerequisite {
                stage,
                requires: "tracked point names",
            });
        }
        Ok(())
    }

    fn ensure_unset<T>(slot: &Option<T>, stage: &'static str) -> Result<(), BonefitError> {
        if slot.is_some() {
            return Err(BonefitError::StageAlreadySet(stage));
        }
        Ok(())
    }

    /// Virtual markers must come before every stage that references markers.
    fn ensure_no_marker_consumer(&self, stage: &'static str) -> Result<(), BonefitError> {
        let consumers = [
            ("segment connections", self.segment_connections.is_some()),
            ("joint hierarchy", self.joint_hierarchy.is_some()),
        ];
        match consumers.into_iter().find(|(_, set)| *set) {
            Some((after, _)) => Err(BonefitError::StageOutOfOrder { stage, after }),
            None => Ok(()),
        }
    }

    /// Declare the markers output by the tracker, in the column order of the raw data.
    pub fn with_tracked_points<I, S>(mut self, names: I) -> Result<Self, BonefitError>
    where
        I: IntoIterator<Item = S>,
        S: Into<MarkerName>,
    {
        Self::ensure_unset(&self.tracked_point_names, "tracked point names")?;

        let names: Vec<MarkerName> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(BonefitError::EmptyTrackedPoints);
        }
        for name in &names {
            if !self.valid_markers.insert(name.clone()) {
                return Err(BonefitError::DuplicateMarker(name.clone()));
            }
        }

        self.tracked_point_names = Some(names);
        Ok(self)
    }

    /// Declare virtual markers. Later definitions may reference earlier ones.
    ///
    /// Must be called before [`with_segment_connections`](Self::with_segment_connections) and
    /// [`with_joint_hierarchy`](Self::with_joint_hierarchy), otherwise it fails with
    /// [`BonefitError::StageOutOfOrder`].
    pub fn with_virtual_markers(
        mut self,
        definitions: Vec<VirtualMarkerDefinition>,
    ) -> Result<Self, BonefitError> {
        self.require_tracked_points("virtual markers")?;
        Self::ensure_unset(&self.virtual_markers, "virtual markers")?;
        self.ensure_no_marker_consumer("virtual markers")?;

        for definition in &definitions {
            if definition.marker_names.len() != definition.marker_weights.len() {
                return Err(BonefitError::WeightCountMismatch {
                    virtual_marker: definition.name.clone(),
                    names: definition.marker_names.len(),
                    weights: definition.marker_weights.len(),
                });
            }

            if let Some(invalid) = definition
                .marker_names
                .iter()
                .find(|component| !self.valid_markers.contains(*component))
            {
                return Err(BonefitError::UnknownMarker {
                    context: format!("virtual marker '{}'", definition.name),
                    marker: invalid.clone(),
                });
            }

            let sum: f64 = definition.marker_weights.iter().sum();
            if !(WEIGHT_SUM_MIN..=WEIGHT_SUM_MAX).contains(&sum) {
                return Err(BonefitError::InvalidWeightSum {
                    virtual_marker: definition.name.clone(),
                    sum,
                });
            }

            if !self.valid_markers.insert(definition.name.clone()) {
                return Err(BonefitError::DuplicateMarker(definition.name.clone()));
            }
        }

        self.virtual_markers = Some(definitions);
        Ok(self)
    }

    /// Declare segments between valid markers (tracked or virtual).
    pub fn with_segment_connections(
        mut self,
        segments: Vec<SegmentConnection>,
    ) -> Result<Self, BonefitError> {
        self.require_tracked_points("segment connections")?;
        Self::ensure_unset(&self.segment_connections, "segment connections")?;

        let mut names: HashSet<&str, RandomState> = HashSet::default();
        for segment in &segments {
            if !names.insert(segment.name.as_str()) {
                return Err(BonefitError::DuplicateSegment(segment.name.clone()));
            }
            for (end, marker) in [("proximal", &segment.proximal), ("distal", &segment.distal)] {
                if !self.valid_markers.contains(marker) {
                    return Err(BonefitError::UnknownMarker {
                        context: format!("{end} end of segment '{}'", segment.name),
                        marker: marker.clone(),
                    });
                }
            }
        }

        self.segment_connections = Some(segments);
        Ok(self)
    }

    /// Attach anthropometric center-of-mass data to already declared segments.
    pub fn with_center_of_mass(
        mut self,
        definitions: Vec<SegmentComDefinition>,
    ) -> Result<Self, BonefitError> {
        Self::ensure_unset(&self.center_of_mass_definitions, "center of mass definitions")?;
        let Some(segments) = self.segment_connections.as_ref() else {
            return Err(BonefitError::MissingPrerequisite {
                stage: "center of mass definitions",
                requires: "segment connections",
            });
        };

        let mut seen: HashSet<&str, RandomState> = HashSet::default();
        for definition in &definitions {
            if !segments.iter().any(|s| s.name == definition.segment) {
                return Err(BonefitError::UnknownSegment(definition.segment.clone()));
            }
            if !seen.insert(definition.segment.as_str()) {
                return Err(BonefitError::DuplicateSegment(definition.segment.clone()));
            }
            for (field, value) in [
                ("length", definition.length),
                ("percentage", definition.percentage),
            ] {
                if !(0.0..=1.0).contains(&value) {
                    return Err(BonefitError::InvalidComFraction {
                        segment: definition.segment.clone(),
                        field,
                        value,
                    });
                }
            }
        }

        let total: f64 = definitions.iter().map(|d| d.percentage).sum();
        if !definitions.is_empty() && (total - 1.0).abs() > MASS_PERCENTAGE_TOLERANCE {
            warn!(
                total,
                "Segment mass percentages do not sum to 1; total body center of mass will not be normalized"
            );
        }

        self.center_of_mass_definitions = Some(definitions);
        Ok(self)
    }

    /// Declare the joint hierarchy used for rigid-bone enforcement.
    pub fn with_joint_hierarchy(mut self, hierarchy: JointHierarchy) -> Result<Self, BonefitError> {
        self.require_tracked_points("joint hierarchy")?;
        Self::ensure_unset(&self.joint_hierarchy, "joint hierarchy")?;

        hierarchy.validate(&self.valid_markers)?;

        self.joint_hierarchy = Some(hierarchy);
        Ok(self)
    }

    /// Finalize the builder into an immutable [`AnatomicalStructure`].
    ///
    /// Return
    /// ----------
    /// * `Err(BonefitError::MissingPrerequisite)` if tracked point names were never supplied.
    pub fn build(self) -> Result<AnatomicalStructure, BonefitError> {
        let Some(tracked_point_names) = self.tracked_point_names else {
            return Err(BonefitError::MissingPrerequisite {
                stage: "anatomical structure",
                requires: "tracked point names",
            });
        };

        Ok(AnatomicalStructure::from_validated_parts(
            tracked_point_names,
            self.virtual_markers.unwrap_or_default(),
            self.segment_connections,
            self.center_of_mass_definitions,
            self.joint_hierarchy,
        ))
    }
}
