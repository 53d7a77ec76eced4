//! # Actors: every aspect of one tracked subject
//!
//! An [`Actor`] owns the aspects described by a [`ModelInfo`], in the model's aspect order.
//! It splits a combined tracker array between its aspects, runs a
//! [`CalculationPipeline`] over each of them, and exports all trajectories as one long CSV
//! table with the columns:
//!
//! ```text
//! aspect, trajectory, frame, keypoint, x, y, z
//! ```
//!
//! Reprojection errors are split between the aspects the same way, and exported with the
//! columns `aspect, frame, keypoint, error`.
use std::fmt;
use std::ops::Range;

use camino::Utf8Path;
use serde::Serialize;
use tracing::info;

use crate::aspect::Aspect;
use crate::biomechanics::CalculationPipeline;
use crate::bonefit_errors::BonefitError;
use crate::constants::Position;
use crate::model_info::ModelInfo;
use crate::reprojection_error::ErrorFrames;
use crate::trajectory::TrackedFrames;

/// One row of the actor-wide tidy export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorRow<'a> {
    pub aspect: &'a str,
    pub trajectory: &'a str,
    pub frame: usize,
    pub keypoint: &'a str,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One row of the actor-wide reprojection error export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorErrorRow<'a> {
    pub aspect: &'a str,
    pub frame: usize,
    pub keypoint: &'a str,
    pub error: f64,
}

/// Columns `columns` of every row.
fn split_columns<T: Clone>(rows: &[Vec<T>], columns: &Range<usize>) -> Vec<Vec<T>> {
    rows.iter().map(|row| row[columns.clone()].to_vec()).collect()
}

/// A tracked subject, as the ordered set of its aspects.
#[derive(Debug, Clone)]
pub struct Actor {
    name: String,
    tracker_name: String,
    aspects: Vec<Aspect>,
    tracked_point_slices: Vec<(String, Range<usize>)>,
}

impl Actor {
    /// Create an actor with one empty aspect per aspect of `model`.
    ///
    /// Each aspect carries the tracker name in its `tracker` metadata.
    pub fn from_model_info(name: impl Into<String>, model: &ModelInfo) -> Result<Self, BonefitError> {
        let aspects = model
            .anatomical_structures()?
            .into_iter()
            .map(|(aspect_name, structure)| {
                let mut aspect = Aspect::new(aspect_name, structure);
                aspect.add_metadata([("tracker", model.tracker_name())]);
                aspect
            })
            .collect();

        Ok(Actor {
            name: name.into(),
            tracker_name: model.tracker_name().to_string(),
            aspects,
            tracked_point_slices: model.tracked_point_slices()?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracker_name(&self) -> &str {
        &self.tracker_name
    }

    /// Aspects, in model order.
    pub fn aspects(&self) -> &[Aspect] {
        &self.aspects
    }

    pub fn aspect(&self, name: &str) -> Option<&Aspect> {
        self.aspects.iter().find(|aspect| aspect.name() == name)
    }

    pub fn aspect_mut(&mut self, name: &str) -> Option<&mut Aspect> {
        self.aspects.iter_mut().find(|aspect| aspect.name() == name)
    }

    /// Total number of tracked points across all aspects.
    pub fn num_tracked_points(&self) -> usize {
        self.tracked_point_slices
            .last()
            .map(|(_, range)| range.end)
            .unwrap_or(0)
    }

    /// Check that every row holds one entry per tracked point of the actor.
    fn check_row_widths<T>(&self, rows: &[Vec<T>], what: &str) -> Result<(), BonefitError> {
        let expected = self.num_tracked_points();
        if let Some((frame, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != expected)
        {
            return Err(BonefitError::ShapeMismatch {
                context: format!("{what} of frame {frame} of actor '{}'", self.name),
                expected,
                found: row.len(),
            });
        }
        Ok(())
    }

    /// Split a combined tracker array between the aspects and ingest each part as `3d_xyz`.
    ///
    /// Every row must hold [`num_tracked_points`](Actor::num_tracked_points) positions, the
    /// aspects' columns following the model's aspect order.
    pub fn add_tracked_points(&mut self, frames: &TrackedFrames) -> Result<(), BonefitError> {
        self.check_row_widths(frames, "tracked points")?;

        for (aspect, (_, columns)) in self.aspects.iter_mut().zip(&self.tracked_point_slices) {
            let part: Vec<Vec<Position>> = split_columns(frames, columns);
            aspect.add_tracked_points(&part)?;
        }
        Ok(())
    }

    /// Split a combined reprojection error array between the aspects.
    ///
    /// The layout follows [`add_tracked_points`](Actor::add_tracked_points): one value per
    /// tracked point of the actor in every row. Virtual markers carry no error.
    pub fn add_reprojection_error(&mut self, frames: &ErrorFrames) -> Result<(), BonefitError> {
        self.check_row_widths(frames, "reprojection error")?;

        for (aspect, (_, columns)) in self.aspects.iter_mut().zip(&self.tracked_point_slices) {
            aspect.add_reprojection_error(&split_columns(frames, columns))?;
        }
        Ok(())
    }

    /// Reprojection error of `marker` over all frames, if `aspect` has one.
    pub fn error_marker(&self, aspect: &str, marker: &str) -> Option<Vec<f64>> {
        self.aspect(aspect)?.reprojection_error()?.marker(marker)
    }

    /// Reprojection error of every tracked point of `aspect` at `frame`, in marker order.
    pub fn error_frame(&self, aspect: &str, frame: usize) -> Option<&[f64]> {
        self.aspect(aspect)?.reprojection_error()?.frame(frame)
    }

    /// Run `pipeline` on every aspect, in order.
    ///
    /// Return
    /// ----------
    /// * The messages of each aspect, paired with the aspect name.
    pub fn calculate(
        &mut self,
        pipeline: &CalculationPipeline,
    ) -> Result<Vec<(String, Vec<String>)>, BonefitError> {
        let mut logs = Vec::with_capacity(self.aspects.len());
        for aspect in &mut self.aspects {
            let messages = pipeline.run(aspect)?;
            for message in &messages {
                info!(actor = %self.name, aspect = aspect.name(), "{message}");
            }
            logs.push((aspect.name().to_string(), messages));
        }
        Ok(logs)
    }

    /// Rows of every trajectory of every aspect: aspects in order, trajectories by name,
    /// then frame and marker.
    pub fn tidy_rows(&self) -> impl Iterator<Item = ActorRow<'_>> {
        self.aspects.iter().flat_map(|aspect| {
            aspect.trajectories().flat_map(move |trajectory| {
                trajectory.tidy_rows().map(move |row| ActorRow {
                    aspect: aspect.name(),
                    trajectory: trajectory.name(),
                    frame: row.frame,
                    keypoint: row.keypoint,
                    x: row.x,
                    y: row.y,
                    z: row.z,
                })
            })
        })
    }

    /// Reprojection error rows of every aspect that has one, aspects in order.
    pub fn error_rows(&self) -> impl Iterator<Item = ActorErrorRow<'_>> {
        self.aspects.iter().flat_map(|aspect| {
            aspect
                .reprojection_error()
                .into_iter()
                .flat_map(move |error| {
                    error.tidy_rows().map(move |row| ActorErrorRow {
                        aspect: aspect.name(),
                        frame: row.frame,
                        keypoint: row.keypoint,
                        error: row.error,
                    })
                })
        })
    }

    /// Write [`error_rows`](Actor::error_rows) to a CSV file.
    pub fn write_error_csv(&self, path: &Utf8Path) -> Result<(), BonefitError> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in self.error_rows() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        info!(actor = %self.name, path = %path, "reprojection errors written");
        Ok(())
    }

    /// Write [`tidy_rows`](Actor::tidy_rows) to a CSV file.
    pub fn write_csv(&self, path: &Utf8Path) -> Result<(), BonefitError> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in self.tidy_rows() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        info!(actor = %self.name, path = %path, "trajectories written");
        Ok(())
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.aspects.iter().map(Aspect::name).collect();
        write!(
            f,
            "Actor '{}' tracked by {} with aspects {:?}",
            self.name, self.tracker_name, names
        )
    }
}

#[cfg(test)]
mod actor_test {
    use super::*;

    const MODEL: &str = r#"
name = "toy"
tracker_name = "ToyTracker"
order = ["body", "hand"]

[aspects.body.tracked_points]
names = ["hip", "knee"]

[aspects.hand.tracked_points]
convention = "hand_{}"
count = 1
"#;

    fn actor() -> Actor {
        Actor::from_model_info("subject", &ModelInfo::from_toml_str(MODEL).unwrap()).unwrap()
    }

    #[test]
    fn test_split_tracked_points() {
        let mut actor = actor();
        assert_eq!(actor.num_tracked_points(), 3);

        actor
            .add_tracked_points(&[vec![
                Position::new(0.0, 0.0, 0.0),
                Position::new(0.0, -1.0, 0.0),
                Position::new(5.0, 5.0, 5.0),
            ]])
            .unwrap();

        let hand = actor.aspect("hand").unwrap().xyz().unwrap();
        assert_eq!(hand.marker_names(), &["hand_0"]);
        assert_eq!(hand.as_slice(), &[Position::new(5.0, 5.0, 5.0)]);
        assert_eq!(actor.aspect("body").unwrap().xyz().unwrap().num_markers(), 2);
        assert_eq!(actor.aspect("body").unwrap().metadata()["tracker"], "ToyTracker");
    }

    #[test]
    fn test_row_width_checked() {
        let mut actor = actor();
        let err = actor
            .add_tracked_points(&[vec![Position::zeros(); 2]])
            .unwrap_err();
        assert_eq!(
            err,
            BonefitError::ShapeMismatch {
                context: "tracked points of frame 0 of actor 'subject'".into(),
                expected: 3,
                found: 2,
            }
        );
    }

    #[test]
    fn test_split_reprojection_error() {
        let mut actor = actor();
        assert_eq!(actor.error_frame("body", 0), None);

        actor
            .add_reprojection_error(&[vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]])
            .unwrap();

        assert_eq!(actor.error_marker("hand", "hand_0"), Some(vec![0.3, 0.6]));
        assert_eq!(actor.error_frame("body", 1), Some(&[0.4, 0.5][..]));
        assert_eq!(actor.error_marker("body", "hand_0"), None);
        assert_eq!(actor.error_marker("face", "nose"), None);

        let rows: Vec<_> = actor.error_rows().collect();
        assert_eq!(rows.len(), 6);
        assert_eq!(
            rows[4],
            ActorErrorRow {
                aspect: "hand",
                frame: 0,
                keypoint: "hand_0",
                error: 0.3
            }
        );

        let err = actor
            .add_reprojection_error(&[vec![0.1, 0.2]])
            .unwrap_err();
        assert_eq!(
            err,
            BonefitError::ShapeMismatch {
                context: "reprojection error of frame 0 of actor 'subject'".into(),
                expected: 3,
                found: 2,
            }
        );
    }

    #[test]
    fn test_calculate_skips_without_tables() {
        let mut actor = actor();
        actor
            .add_tracked_points(&[vec![Position::zeros(); 3]])
            .unwrap();
        let logs = actor.calculate(&CalculationPipeline::standard()).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].0, "body");
        assert_eq!(logs[0].1.len(), 2);
        assert!(actor.aspect("body").unwrap().rigid_xyz().is_none());
    }

    #[test]
    fn test_tidy_rows_and_display() {
        let mut actor = actor();
        actor
            .add_tracked_points(&[vec![Position::zeros(); 3], vec![Position::zeros(); 3]])
            .unwrap();

        let rows: Vec<_> = actor.tidy_rows().collect();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].aspect, "body");
        assert_eq!(rows[0].trajectory, "3d_xyz");
        assert_eq!(rows[5].keypoint, "hand_0");
        assert_eq!(
            actor.to_string(),
            r#"Actor 'subject' tracked by ToyTracker with aspects ["body", "hand"]"#
        );
    }
}
