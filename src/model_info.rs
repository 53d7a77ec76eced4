//! # Tracker model descriptions
//!
//! A [`ModelInfo`] describes everything a tracker outputs, split into **aspects** (body, face,
//! hands…), and is read from a TOML file:
//!
//! ```toml
//! name = "mediapipe"
//! tracker_name = "MediapipeHolisticTracker"
//! order = ["body", "face"]
//!
//! [aspects.body.tracked_points]
//! names = ["nose", "left_hip", "right_hip", "left_knee"]
//!
//! [[aspects.body.virtual_markers]]
//! name = "hips_center"
//! marker_names = ["left_hip", "right_hip"]
//! marker_weights = [0.5, 0.5]
//!
//! [[aspects.body.segments]]
//! name = "left_thigh"
//! proximal = "left_hip"
//! distal = "left_knee"
//!
//! [[aspects.body.center_of_mass]]
//! segment = "left_thigh"
//! length = 0.433
//! percentage = 0.1
//!
//! [aspects.body.joint_hierarchy]
//! root = "hips_center"
//! joints = [
//!     { parent = "hips_center", children = ["left_hip"] },
//!     { parent = "left_hip", children = ["left_knee"] },
//! ]
//!
//! [aspects.face.tracked_points]
//! convention = "face_{}"
//! count = 468
//! ```
//!
//! Tracked points are either listed (`names`) or generated (`convention` + `count`, each `{}`
//! being replaced by the point index). `order` gives the column order of the aspects in a
//! combined tracker array, see [`ModelInfo::tracked_point_slices`].
//!
//! The description is only checked for self-consistency on load; each aspect becomes a fully
//! validated [`AnatomicalStructure`] through [`ModelInfo::anatomical_structures`].
use std::collections::HashSet;
use std::ops::Range;

use ahash::RandomState;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::anatomical_structure::{
    AnatomicalStructure, AnatomicalStructureBuilder, JointHierarchy, SegmentComDefinition,
    SegmentConnection, VirtualMarkerDefinition,
};
use crate::bonefit_errors::BonefitError;
use crate::constants::{MarkerName, NameMap};

/// How the tracked points of an aspect are named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackedPoints {
    /// Explicit list, in tracker column order.
    Names { names: Vec<MarkerName> },
    /// `count` names generated from `convention`, e.g. `"face_{}"` → `face_0`, `face_1`…
    Generated { convention: String, count: usize },
}

impl TrackedPoints {
    pub fn names(&self) -> Vec<MarkerName> {
        match self {
            TrackedPoints::Names { names } => names.clone(),
            TrackedPoints::Generated { convention, count } => (0..*count)
                .map(|idx| convention.replace("{}", &idx.to_string()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TrackedPoints::Names { names } => names.len(),
            TrackedPoints::Generated { count, .. } => *count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tables of one aspect, as written in the model description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectInfo {
    pub tracked_points: TrackedPoints,
    #[serde(default)]
    pub virtual_markers: Vec<VirtualMarkerDefinition>,
    #[serde(default)]
    pub segments: Vec<SegmentConnection>,
    #[serde(default)]
    pub center_of_mass: Vec<SegmentComDefinition>,
    #[serde(default)]
    pub joint_hierarchy: Option<JointHierarchy>,
}

impl AspectInfo {
    /// Run the tables through [`AnatomicalStructureBuilder`], skipping the empty ones.
    pub fn anatomical_structure(&self) -> Result<AnatomicalStructure, BonefitError> {
        let mut builder =
            AnatomicalStructureBuilder::new().with_tracked_points(self.tracked_points.names())?;

        if !self.virtual_markers.is_empty() {
            builder = builder.with_virtual_markers(self.virtual_markers.clone())?;
        }
        if !self.segments.is_empty() {
            builder = builder.with_segment_connections(self.segments.clone())?;
        }
        if !self.center_of_mass.is_empty() {
            builder = builder.with_center_of_mass(self.center_of_mass.clone())?;
        }
        if let Some(hierarchy) = &self.joint_hierarchy {
            builder = builder.with_joint_hierarchy(hierarchy.clone())?;
        }
        builder.build()
    }

    /// Number of markers once virtual markers are appended.
    pub fn num_landmarks(&self) -> usize {
        self.tracked_points.len() + self.virtual_markers.len()
    }
}

/// Description of a tracker's output, split into ordered aspects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    name: String,
    tracker_name: String,
    order: Vec<String>,
    aspects: NameMap<AspectInfo>,
}

impl ModelInfo {
    /// Parse and check a model description.
    ///
    /// Return
    /// ----------
    /// * `Err(BonefitError::TomlParsingError)` on malformed TOML or missing fields.
    /// * `Err(BonefitError::InvalidModelInfo)` if `order` is empty, repeats an aspect, names an
    ///   aspect that has no table, or if a generated naming convention has no `{}`.
    pub fn from_toml_str(content: &str) -> Result<Self, BonefitError> {
        let model: ModelInfo = toml::from_str(content)?;
        model.check()?;
        Ok(model)
    }

    /// Read a model description from a TOML file.
    pub fn from_path(path: &Utf8Path) -> Result<Self, BonefitError> {
        let content = std::fs::read_to_string(path)?;
        ModelInfo::from_toml_str(&content)
    }

    fn check(&self) -> Result<(), BonefitError> {
        if self.order.is_empty() {
            return Err(BonefitError::InvalidModelInfo(format!(
                "model '{}' has an empty aspect order",
                self.name
            )));
        }

        let mut seen: HashSet<&str, RandomState> = HashSet::default();
        for aspect in &self.order {
            if !seen.insert(aspect.as_str()) {
                return Err(BonefitError::InvalidModelInfo(format!(
                    "aspect '{aspect}' appears more than once in the aspect order"
                )));
            }
            self.aspect_info(aspect)?;
        }

        for (name, info) in &self.aspects {
            if let TrackedPoints::Generated { convention, count } = &info.tracked_points {
                if *count > 1 && !convention.contains("{}") {
                    return Err(BonefitError::InvalidModelInfo(format!(
                        "naming convention '{convention}' of aspect '{name}' has no '{{}}' placeholder"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracker_name(&self) -> &str {
        &self.tracker_name
    }

    /// Aspect names, in their column order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Tables of the aspect called `name`.
    pub fn aspect_info(&self, name: &str) -> Result<&AspectInfo, BonefitError> {
        self.aspects.get(name).ok_or_else(|| {
            let mut available: Vec<&str> = self.aspects.keys().map(String::as_str).collect();
            available.sort_unstable();
            BonefitError::InvalidModelInfo(format!(
                "aspect '{name}' is in the aspect order but has no configuration, available aspects: {available:?}"
            ))
        })
    }

    /// All tracked point names, aspect after aspect in `order`.
    pub fn tracked_point_names(&self) -> Result<Vec<MarkerName>, BonefitError> {
        let mut names = Vec::new();
        for aspect in &self.order {
            names.extend(self.aspect_info(aspect)?.tracked_points.names());
        }
        Ok(names)
    }

    /// One validated structure per aspect, in `order`.
    pub fn anatomical_structures(&self) -> Result<Vec<(String, AnatomicalStructure)>, BonefitError> {
        self.order
            .iter()
            .map(|aspect| {
                let structure = self.aspect_info(aspect)?.anatomical_structure()?;
                Ok::<_, BonefitError>((aspect.clone(), structure))
            })
            .collect()
    }

    fn slices(
        &self,
        width: impl Fn(&AspectInfo) -> usize,
    ) -> Result<Vec<(String, Range<usize>)>, BonefitError> {
        let mut start = 0;
        self.order
            .iter()
            .map(|aspect| {
                let end = start + width(self.aspect_info(aspect)?);
                let range = start..end;
                start = end;
                Ok::<_, BonefitError>((aspect.clone(), range))
            })
            .collect()
    }

    /// Column range of each aspect in a combined array of tracked points.
    pub fn tracked_point_slices(&self) -> Result<Vec<(String, Range<usize>)>, BonefitError> {
        self.slices(|info| info.tracked_points.len())
    }

    /// Column range of each aspect in a combined array of landmarks (tracked points followed
    /// by the virtual markers of each aspect).
    pub fn landmark_slices(&self) -> Result<Vec<(String, Range<usize>)>, BonefitError> {
        self.slices(AspectInfo::num_landmarks)
    }
}

#[cfg(test)]
mod model_info_test {
    use super::*;

    const MODEL: &str = r#"
name = "mediapipe"
tracker_name = "MediapipeHolisticTracker"
order = ["body", "face"]

[aspects.body.tracked_points]
names = ["left_hip", "right_hip", "left_knee"]

[[aspects.body.virtual_markers]]
name = "hips_center"
marker_names = ["left_hip", "right_hip"]
marker_weights = [0.5, 0.5]

[[aspects.body.segments]]
name = "left_thigh"
proximal = "left_hip"
distal = "left_knee"

[[aspects.body.center_of_mass]]
segment = "left_thigh"
segment_com_length = 0.433
segment_com_percentage = 1.0

[aspects.body.joint_hierarchy]
root = "hips_center"
joints = [
    { parent = "hips_center", children = ["left_hip"] },
    { parent = "left_hip", children = ["left_knee"] },
]

[aspects.face.tracked_points]
convention = "face_{}"
count = 3
"#;

    #[test]
    fn test_parse_model() {
        let model = ModelInfo::from_toml_str(MODEL).unwrap();
        assert_eq!(model.name(), "mediapipe");
        assert_eq!(model.tracker_name(), "MediapipeHolisticTracker");
        assert_eq!(model.order(), &["body", "face"]);
        assert_eq!(
            model.tracked_point_names().unwrap(),
            vec!["left_hip", "right_hip", "left_knee", "face_0", "face_1", "face_2"]
        );

        let body = model.aspect_info("body").unwrap();
        assert_eq!(body.center_of_mass[0].length, 0.433);
        assert_eq!(body.joint_hierarchy.as_ref().unwrap().root(), "hips_center");
    }

    #[test]
    fn test_slices() {
        let model = ModelInfo::from_toml_str(MODEL).unwrap();
        assert_eq!(
            model.tracked_point_slices().unwrap(),
            vec![("body".to_string(), 0..3), ("face".to_string(), 3..6)]
        );
        assert_eq!(
            model.landmark_slices().unwrap(),
            vec![("body".to_string(), 0..4), ("face".to_string(), 4..7)]
        );
    }

    #[test]
    fn test_anatomical_structures() {
        let model = ModelInfo::from_toml_str(MODEL).unwrap();
        let structures = model.anatomical_structures().unwrap();
        assert_eq!(structures.len(), 2);

        let (name, body) = &structures[0];
        assert_eq!(name, "body");
        assert_eq!(body.num_markers(), 4);
        assert!(body.center_of_mass_definitions().is_some());
        assert_eq!(body.joint_hierarchy().unwrap().num_edges(), 2);

        let (_, face) = &structures[1];
        assert!(face.segment_connections().is_none());
        assert!(face.joint_hierarchy().is_none());
    }

    #[test]
    fn test_order_without_aspect() {
        let broken = MODEL.replace(r#"order = ["body", "face"]"#, r#"order = ["body", "left_hand"]"#);
        let err = ModelInfo::from_toml_str(&broken).unwrap_err();
        assert!(matches!(err, BonefitError::InvalidModelInfo(_)));
        assert!(err.is_configuration_error());

        let repeated = MODEL.replace(r#"order = ["body", "face"]"#, r#"order = ["body", "body"]"#);
        assert!(matches!(
            ModelInfo::from_toml_str(&repeated),
            Err(BonefitError::InvalidModelInfo(_))
        ));
    }

    #[test]
    fn test_bad_convention() {
        let broken = MODEL.replace(r#"convention = "face_{}""#, r#"convention = "face""#);
        assert!(matches!(
            ModelInfo::from_toml_str(&broken),
            Err(BonefitError::InvalidModelInfo(_))
        ));
    }

    #[test]
    fn test_malformed_toml() {
        let err = ModelInfo::from_toml_str("name = ").unwrap_err();
        assert!(matches!(err, BonefitError::TomlParsingError(_)));
    }

    #[test]
    fn test_invalid_tables_fail_at_structure_build() {
        let broken = MODEL.replace("marker_weights = [0.5, 0.5]", "marker_weights = [0.5, 0.6]");
        let model = ModelInfo::from_toml_str(&broken).unwrap();
        assert!(matches!(
            model.anatomical_structures(),
            Err(BonefitError::InvalidWeightSum { .. })
        ));
    }
}
