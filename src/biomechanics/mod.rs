//! # Biomechanical calculations over aspects
//!
//! A calculation reads an [`Aspect`], produces new named trajectories, and writes them back
//! into that aspect. Each one implements [`AnatomicalCalculation`]; a
//! [`CalculationPipeline`] runs an ordered list of them against one aspect.
//!
//! ## Result Model
//! -----------------
//! Every call to [`AnatomicalCalculation::calculate`] returns
//!
//! ```text
//! Result<CalculationResult, BonefitError>
//! ```
//!
//! * `Ok(result)` with `result.success == true` – outputs are in `result.data`, ready to be
//!   stored,
//! * `Ok(result)` with `result.success == false` – the aspect lacks an optional input (no
//!   center-of-mass table, no joint hierarchy, no `3d_xyz` trajectory). The task is
//!   **skipped**, `result.messages` says why, and the pipeline moves on,
//! * `Err(BonefitError)` – a shape or lookup failure. The pipeline stops and propagates it.
//!
//! ## Built-in calculations
//! -----------------
//! * [`CenterOfMassCalculation`] – segment and total-body center of mass
//!   (see [`center_of_mass`]).
//! * [`RigidBonesEnforcement`] – constant bone lengths along the joint hierarchy
//!   (see [`rigid_bones`]).
//!
//! [`CalculationPipeline::standard`] runs them in that order.
use std::fmt;

use tracing::{info, warn};

use crate::aspect::{Aspect, TrajectoryName};
use crate::bonefit_errors::BonefitError;
use crate::constants::NameMap;
use crate::trajectory::Trajectory;

pub mod center_of_mass;
pub mod rigid_bones;

pub use center_of_mass::{CenterOfMassCalculation, CenterOfMassEngine};
pub use rigid_bones::{BoneStatistics, RigidBoneEngine, RigidBonesEnforcement};

/// Outcome of one calculation on one aspect.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalculationResult {
    pub success: bool,
    /// Output trajectories, keyed by the name they are stored under.
    pub data: NameMap<Trajectory>,
    pub messages: Vec<String>,
}

impl CalculationResult {
    /// A successful result holding `trajectories`, keyed by their own names.
    pub fn succeeded(
        trajectories: impl IntoIterator<Item = Trajectory>,
        message: impl Into<String>,
    ) -> Self {
        CalculationResult {
            success: true,
            data: trajectories
                .into_iter()
                .map(|trajectory| (trajectory.name().to_string(), trajectory))
                .collect(),
            messages: vec![message.into()],
        }
    }

    /// A non-fatal skip: nothing to store, `message` explains why.
    pub fn skipped(message: impl Into<String>) -> Self {
        CalculationResult {
            success: false,
            data: NameMap::default(),
            messages: vec![message.into()],
        }
    }

    /// Move the trajectory stored under `name` out of the result.
    pub fn take(&mut self, name: TrajectoryName) -> Option<Trajectory> {
        self.data.remove(name.as_str())
    }
}

/// What a calculation left behind once stored: whether it ran and its messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculationReport {
    pub task: &'static str,
    pub success: bool,
    pub messages: Vec<String>,
}

impl fmt::Display for CalculationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "done" } else { "skipped" };
        write!(f, "[{}] {}: {}", self.task, status, self.messages.join("; "))
    }
}

/// A calculation that derives trajectories from an aspect and stores them back.
pub trait AnatomicalCalculation {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &'static str;

    /// Compute the outputs from the aspect, without modifying it.
    fn calculate(&self, aspect: &Aspect) -> Result<CalculationResult, BonefitError>;

    /// Write the outputs of a successful `result` into the aspect.
    fn store(&self, aspect: &mut Aspect, result: CalculationResult);

    /// Run [`calculate`](AnatomicalCalculation::calculate), then
    /// [`store`](AnatomicalCalculation::store) when it succeeded.
    fn calculate_and_store(&self, aspect: &mut Aspect) -> Result<CalculationReport, BonefitError> {
        let result = self.calculate(aspect)?;
        let report = CalculationReport {
            task: self.name(),
            success: result.success,
            messages: result.messages.clone(),
        };

        if result.success {
            self.store(aspect, result);
        }
        Ok(report)
    }
}

/// Ordered list of calculations run against one aspect at a time.
pub struct CalculationPipeline {
    tasks: Vec<Box<dyn AnatomicalCalculation>>,
}

impl CalculationPipeline {
    pub fn new(tasks: Vec<Box<dyn AnatomicalCalculation>>) -> Self {
        CalculationPipeline { tasks }
    }

    /// Center of mass, then rigid bones.
    pub fn standard() -> Self {
        CalculationPipeline::new(vec![
            Box::new(CenterOfMassCalculation),
            Box::new(RigidBonesEnforcement),
        ])
    }

    /// Append a task at the end of the pipeline.
    pub fn with_task(mut self, task: Box<dyn AnatomicalCalculation>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Names of the tasks, in execution order.
    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|task| task.name()).collect()
    }

    /// Run every task in order on `aspect` and return one report per task.
    ///
    /// Skipped tasks do not stop the pipeline; the first error does.
    pub fn run_with_reports(
        &self,
        aspect: &mut Aspect,
    ) -> Result<Vec<CalculationReport>, BonefitError> {
        let mut reports = Vec::with_capacity(self.tasks.len());

        for task in &self.tasks {
            let report = task.calculate_and_store(aspect)?;
            if report.success {
                info!(aspect = aspect.name(), task = report.task, "calculation stored");
            } else {
                warn!(
                    aspect = aspect.name(),
                    task = report.task,
                    reason = %report.messages.join("; "),
                    "calculation skipped"
                );
            }
            reports.push(report);
        }
        Ok(reports)
    }

    /// Run every task in order on `aspect` and return all their messages.
    pub fn run(&self, aspect: &mut Aspect) -> Result<Vec<String>, BonefitError> {
        Ok(self
            .run_with_reports(aspect)?
            .into_iter()
            .flat_map(|report| report.messages)
            .collect())
    }
}

impl Default for CalculationPipeline {
    fn default() -> Self {
        CalculationPipeline::standard()
    }
}

impl fmt::Debug for CalculationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculationPipeline")
            .field("tasks", &self.task_names())
            .finish()
    }
}

#[cfg(test)]
mod biomechanics_test {
    use super::*;
    use crate::anatomical_structure::AnatomicalStructureBuilder;
    use crate::constants::Position;

    struct Shift;

    impl AnatomicalCalculation for Shift {
        fn name(&self) -> &'static str {
            "shift"
        }

        fn calculate(&self, aspect: &Aspect) -> Result<CalculationResult, BonefitError> {
            let Some(xyz) = aspect.xyz() else {
                return Ok(CalculationResult::skipped("nothing to shift"));
            };
            let shifted: Vec<Position> = xyz
                .as_slice()
                .iter()
                .map(|p| p + Position::new(1.0, 0.0, 0.0))
                .collect();
            let trajectory = Trajectory::new(
                "shifted",
                shifted,
                xyz.marker_names().to_vec(),
                xyz.num_frames(),
            )?;
            Ok(CalculationResult::succeeded([trajectory], "shifted"))
        }

        fn store(&self, aspect: &mut Aspect, result: CalculationResult) {
            for (_, trajectory) in result.data {
                aspect.add_trajectory(trajectory);
            }
        }
    }

    fn aspect() -> Aspect {
        let structure = AnatomicalStructureBuilder::new()
            .with_tracked_points(["a"])
            .unwrap()
            .build()
            .unwrap();
        Aspect::new("body", structure)
    }

    #[test]
    fn test_skip_does_not_store() {
        let mut aspect = aspect();
        let report = Shift.calculate_and_store(&mut aspect).unwrap();
        assert!(!report.success);
        assert_eq!(report.messages, vec!["nothing to shift".to_string()]);
        assert!(aspect.trajectory("shifted").is_none());
    }

    #[test]
    fn test_custom_task_in_pipeline() {
        let mut aspect = aspect();
        aspect
            .add_tracked_points(&[vec![Position::new(0.0, 2.0, 0.0)]])
            .unwrap();

        let pipeline = CalculationPipeline::standard().with_task(Box::new(Shift));
        assert_eq!(pipeline.task_names(), vec!["center_of_mass", "rigid_bones", "shift"]);

        let reports = pipeline.run_with_reports(&mut aspect).unwrap();
        assert_eq!(reports.len(), 3);
        assert!(!reports[0].success);
        assert!(!reports[1].success);
        assert!(reports[2].success);
        assert_eq!(
            aspect.trajectory("shifted").unwrap().as_slice(),
            &[Position::new(1.0, 2.0, 0.0)]
        );
        assert_eq!(reports[2].to_string(), "[shift] done: shifted");
    }

    #[test]
    fn test_result_constructors() {
        let traj = Trajectory::new("x", vec![], vec!["a".into()], 0).unwrap();
        let mut result = CalculationResult::succeeded([traj], "ok");
        assert!(result.success);
        assert!(result.data.contains_key("x"));
        assert!(result.take(TrajectoryName::Xyz).is_none());

        let skipped = CalculationResult::skipped("no data");
        assert!(!skipped.success);
        assert!(skipped.data.is_empty());
    }
}
