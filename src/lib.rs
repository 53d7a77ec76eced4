pub mod actor;
pub mod anatomical_structure;
pub mod aspect;
pub mod biomechanics;
pub mod bonefit_errors;
pub mod constants;
pub mod model_info;
pub mod reprojection_error;
pub mod trajectory;

pub use actor::Actor;
pub use anatomical_structure::{AnatomicalStructure, AnatomicalStructureBuilder, JointHierarchy};
pub use aspect::{Aspect, TrajectoryName};
pub use biomechanics::{
    AnatomicalCalculation, CalculationPipeline, CalculationResult, CenterOfMassEngine,
    RigidBoneEngine,
};
pub use bonefit_errors::BonefitError;
pub use constants::{MarkerName, Position, SegmentName};
pub use model_info::ModelInfo;
pub use reprojection_error::ReprojectionError;
pub use trajectory::Trajectory;
