//! # Anatomical structure of a tracked subject
//!
//! An [`AnatomicalStructure`] is the validated, immutable description of one tracked subregion
//! (a body, a face, a hand…). It declares:
//!
//! 1. the **tracked points**, i.e. the markers directly output by the pose tracker,
//! 2. the **virtual markers**, weighted linear combinations of earlier markers,
//! 3. the **segment connections**, named bones between a proximal and a distal marker,
//! 4. the **center-of-mass definitions**, anthropometric fractions attached to segments,
//! 5. the **joint hierarchy**, a rooted tree over markers used to rigidify bones.
//!
//! Structures are only produced by the staged [`AnatomicalStructureBuilder`], which validates
//! every stage against the markers declared by the previous ones. Items 2 to 5 are optional:
//! a face aspect typically has no center-of-mass table nor joint hierarchy.
//!
//! ## Example
//!
//! ```rust
//! use bonefit::anatomical_structure::{
//!     AnatomicalStructureBuilder, JointHierarchy, SegmentComDefinition, SegmentConnection,
//!     VirtualMarkerDefinition,
//! };
//!
//! # fn main() -> Result<(), bonefit::bonefit_errors::BonefitError> {
//! let structure = AnatomicalStructureBuilder::new()
//!     .with_tracked_points(["left_hip", "right_hip", "left_knee"])?
//!     .with_virtual_markers(vec![VirtualMarkerDefinition::new(
//!         "hips_center",
//!         [("left_hip", 0.5), ("right_hip", 0.5)],
//!     )])?
//!     .with_segment_connections(vec![SegmentConnection::new(
//!         "left_thigh", "left_hip", "left_knee",
//!     )])?
//!     .with_center_of_mass(vec![SegmentComDefinition::new("left_thigh", 0.433, 0.1)])?
//!     .with_joint_hierarchy(
//!         JointHierarchy::new("hips_center")
//!             .joint("hips_center", ["left_hip"])
//!             .joint("left_hip", ["left_knee"]),
//!     )?
//!     .build()?;
//!
//! assert_eq!(structure.marker_names().len(), 4);
//! # Ok(()) }
//! ```
//!
//! ## See also
//! ------------
//! * [`Trajectory::from_tracked_points`](crate::trajectory::Trajectory::from_tracked_points) – Consumes a structure to name and extend raw data.
//! * [`CenterOfMassEngine`](crate::biomechanics::center_of_mass::CenterOfMassEngine) – Uses segment and COM tables.
//! * [`RigidBoneEngine`](crate::biomechanics::rigid_bones::RigidBoneEngine) – Uses the joint hierarchy.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{MarkerName, NameMap, SegmentName};

pub mod builder;
pub mod joint_hierarchy;

pub use builder::AnatomicalStructureBuilder;
pub use joint_hierarchy::{Joint, JointHierarchy};

/// A derived marker, computed as a weighted sum of other markers.
///
/// `marker_names` and `marker_weights` are parallel lists. The weights must sum to
/// approximately 1 (see [`WEIGHT_SUM_MIN`](crate::constants::WEIGHT_SUM_MIN)); every component
/// must be a tracked point or a virtual marker defined *before* this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMarkerDefinition {
    pub name: MarkerName,
    pub marker_names: Vec<MarkerName>,
    pub marker_weights: Vec<f64>,
}

impl VirtualMarkerDefinition {
    /// Build a definition from `(component, weight)` pairs.
    pub fn new<S, I, C>(name: S, components: I) -> Self
    where
        S: Into<MarkerName>,
        I: IntoIterator<Item = (C, f64)>,
        C: Into<MarkerName>,
    {
        let (marker_names, marker_weights) = components
            .into_iter()
            .map(|(component, weight)| (component.into(), weight))
            .unzip();
        VirtualMarkerDefinition {
            name: name.into(),
            marker_names,
            marker_weights,
        }
    }

    /// Iterate over `(component, weight)` pairs.
    pub fn components(&self) -> impl Iterator<Item = (&str, f64)> {
        self.marker_names
            .iter()
            .map(String::as_str)
            .zip(self.marker_weights.iter().copied())
    }
}

/// A named segment (bone) between two markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConnection {
    pub name: SegmentName,
    pub proximal: MarkerName,
    pub distal: MarkerName,
}

impl SegmentConnection {
    pub fn new(
        name: impl Into<SegmentName>,
        proximal: impl Into<MarkerName>,
        distal: impl Into<MarkerName>,
    ) -> Self {
        SegmentConnection {
            name: name.into(),
            proximal: proximal.into(),
            distal: distal.into(),
        }
    }
}

/// Anthropometric center-of-mass data of one segment.
///
/// Fields
/// -----------------
/// * `segment` – name of a segment declared in the segment connections.
/// * `length` – fraction of the proximal→distal vector at which the segment COM lies.
/// * `percentage` – fraction of the total body mass carried by the segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentComDefinition {
    pub segment: SegmentName,
    #[serde(alias = "segment_com_length")]
    pub length: f64,
    #[serde(alias = "segment_com_percentage")]
    pub percentage: f64,
}

impl SegmentComDefinition {
    pub fn new(segment: impl Into<SegmentName>, length: f64, percentage: f64) -> Self {
        SegmentComDefinition {
            segment: segment.into(),
            length,
            percentage,
        }
    }
}

/// Validated description of the markers and relationships of a tracked subject.
///
/// Build it with [`AnatomicalStructureBuilder`]; once built, it is immutable.
/// The full marker order is the tracked points followed by the virtual markers in
/// definition order, which is also the column order of every
/// [`Trajectory`](crate::trajectory::Trajectory) created from this structure.
#[derive(Debug, Clone, PartialEq)]
pub struct AnatomicalStructure {
    tracked_point_names: Vec<MarkerName>,
    virtual_markers: Vec<VirtualMarkerDefinition>,
    segment_connections: Option<Vec<SegmentConnection>>,
    center_of_mass_definitions: Option<Vec<SegmentComDefinition>>,
    joint_hierarchy: Option<JointHierarchy>,
    marker_indices: NameMap<usize>,
}

impl AnatomicalStructure {
    pub(crate) fn from_validated_parts(
        tracked_point_names: Vec<MarkerName>,
        virtual_markers: Vec<VirtualMarkerDefinition>,
        segment_connections: Option<Vec<SegmentConnection>>,
        center_of_mass_definitions: Option<Vec<SegmentComDefinition>>,
        joint_hierarchy: Option<JointHierarchy>,
    ) -> Self {
        let marker_indices = tracked_point_names
            .iter()
            .chain(virtual_markers.iter().map(|vm| &vm.name))
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();

        AnatomicalStructure {
            tracked_point_names,
            virtual_markers,
            segment_connections,
            center_of_mass_definitions,
            joint_hierarchy,
            marker_indices,
        }
    }

    /// Create a new, empty [`AnatomicalStructureBuilder`].
    pub fn builder() -> AnatomicalStructureBuilder {
        AnatomicalStructureBuilder::new()
    }

    /// Names of the markers directly output by the tracker, in input column order.
    pub fn tracked_point_names(&self) -> &[MarkerName] {
        &self.tracked_point_names
    }

    /// Virtual marker definitions, in definition order.
    pub fn virtual_marker_definitions(&self) -> &[VirtualMarkerDefinition] {
        &self.virtual_markers
    }

    /// Names of the virtual markers, in definition order (empty if none are declared).
    pub fn virtual_marker_names(&self) -> Vec<&str> {
        self.virtual_markers.iter().map(|vm| vm.name.as_str()).collect()
    }

    /// Full ordered list of marker names: tracked points, then virtual markers.
    pub fn marker_names(&self) -> Vec<MarkerName> {
        self.tracked_point_names
            .iter()
            .chain(self.virtual_markers.iter().map(|vm| &vm.name))
            .cloned()
            .collect()
    }

    /// Total number of markers, virtual markers included.
    pub fn num_markers(&self) -> usize {
        self.tracked_point_names.len() + self.virtual_markers.len()
    }

    /// Position of `name` in [`marker_names`](AnatomicalStructure::marker_names).
    pub fn marker_index(&self, name: &str) -> Option<usize> {
        self.marker_indices.get(name).copied()
    }

    /// Segment connections, or `None` when no segment is declared.
    pub fn segment_connections(&self) -> Option<&[SegmentConnection]> {
        self.segment_connections
            .as_deref()
            .filter(|segments| !segments.is_empty())
    }

    /// Look up a single segment connection by name.
    pub fn segment_connection(&self, name: &str) -> Option<&SegmentConnection> {
        self.segment_connections()?
            .iter()
            .find(|segment| segment.name == name)
    }

    /// Center-of-mass definitions, or `None` when no definition is declared.
    pub fn center_of_mass_definitions(&self) -> Option<&[SegmentComDefinition]> {
        self.center_of_mass_definitions
            .as_deref()
            .filter(|definitions| !definitions.is_empty())
    }

    /// Joint hierarchy, or `None` when the structure does not declare one.
    pub fn joint_hierarchy(&self) -> Option<&JointHierarchy> {
        self.joint_hierarchy
            .as_ref()
            .filter(|hierarchy| !hierarchy.is_empty())
    }
}

impl fmt::Display for AnatomicalStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {} tracked points", self.tracked_point_names.len())?;
        match self.virtual_markers.len() {
            0 => writeln!(f, "  No virtual markers")?,
            n => writeln!(f, "  {n} virtual markers")?,
        }
        match self.segment_connections() {
            Some(segments) => writeln!(f, "  {} segments", segments.len())?,
            None => writeln!(f, "  No segment connections")?,
        }
        match self.center_of_mass_definitions() {
            Some(defs) => writeln!(f, "  {} center of mass definitions", defs.len())?,
            None => writeln!(f, "  No center of mass definitions")?,
        }
        match self.joint_hierarchy() {
            Some(hierarchy) => write!(
                f,
                "  Joint hierarchy rooted at '{}' with {} bones",
                hierarchy.root(),
                hierarchy.num_edges()
            ),
            None => write!(f, "  No joint hierarchy"),
        }
    }
}
