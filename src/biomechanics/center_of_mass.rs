//! # Segment and whole-body center of mass
//!
//! For each segment with a [`SegmentComDefinition`] and each frame:
//!
//! ```text
//! segment_com   = proximal + (distal − proximal) × length
//! total_body_com = Σ_segments segment_com × percentage
//! ```
//!
//! No NaN filtering is applied: a missing marker at one frame propagates to that frame's
//! segment COM and to the total body COM of the same frame.
//!
//! Outputs
//! -----------------
//! * `segment_com` – one marker per COM-defined segment (named after the segment, in
//!   definition order).
//! * `total_body_com` – a single marker, [`TOTAL_BODY_COM_MARKER`].
use tracing::debug;

use crate::anatomical_structure::{SegmentComDefinition, SegmentConnection};
use crate::aspect::{Aspect, TrajectoryName};
use crate::biomechanics::{AnatomicalCalculation, CalculationResult};
use crate::bonefit_errors::BonefitError;
use crate::constants::{NameMap, Position, TOTAL_BODY_COM_MARKER};
use crate::trajectory::{SegmentPositions, Trajectory};

/// Segment and total-body center-of-mass trajectories.
#[derive(Debug, Clone, PartialEq)]
pub struct CenterOfMassOutput {
    pub segment_com: Trajectory,
    pub total_body_com: Trajectory,
}

/// Computes centers of mass from segment endpoints and anthropometric fractions.
#[derive(Debug, Clone, Copy)]
pub struct CenterOfMassEngine<'a> {
    definitions: &'a [SegmentComDefinition],
}

impl<'a> CenterOfMassEngine<'a> {
    pub fn new(definitions: &'a [SegmentComDefinition]) -> Self {
        CenterOfMassEngine { definitions }
    }

    /// Segment COM positions, frame-major with one column per definition.
    ///
    /// Return
    /// ----------
    /// * A buffer of `num_frames × definitions.len()` positions.
    /// * `Err(BonefitError::SegmentDataNotFound)` if a defined segment has no entry in
    ///   `segments`.
    pub fn segment_com(
        &self,
        segments: &NameMap<SegmentPositions<'_>>,
        num_frames: usize,
    ) -> Result<Vec<Position>, BonefitError> {
        let columns = self
            .definitions
            .iter()
            .map(|definition| {
                segments
                    .get(&definition.segment)
                    .map(|positions| (positions, definition.length))
                    .ok_or_else(|| BonefitError::SegmentDataNotFound(definition.segment.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut buffer = Vec::with_capacity(num_frames * columns.len());
        for frame in 0..num_frames {
            for (positions, length) in &columns {
                let proximal = positions.proximal.get(frame);
                let distal = positions.distal.get(frame);
                let com = match (proximal, distal) {
                    (Some(p), Some(d)) => p + (d - p) * *length,
                    _ => Position::repeat(f64::NAN),
                };
                buffer.push(com);
            }
        }
        Ok(buffer)
    }

    /// Mass-weighted sum of the segment COMs, one position per frame.
    ///
    /// `segment_com` must be the frame-major buffer returned by
    /// [`segment_com`](CenterOfMassEngine::segment_com).
    pub fn total_body_com(&self, segment_com: &[Position]) -> Vec<Position> {
        let width = self.definitions.len();
        if width == 0 {
            return Vec::new();
        }
        segment_com
            .chunks_exact(width)
            .map(|row| {
                row.iter()
                    .zip(self.definitions)
                    .fold(Position::zeros(), |acc, (com, definition)| {
                        acc + com * definition.percentage
                    })
            })
            .collect()
    }

    /// Compute both outputs for `trajectory`, using `segments` to locate segment endpoints.
    pub fn compute(
        &self,
        trajectory: &Trajectory,
        segments: &[SegmentConnection],
    ) -> Result<CenterOfMassOutput, BonefitError> {
        let num_frames = trajectory.num_frames();
        let segment_data = trajectory.segment_data(segments);

        let segment_buffer = self.segment_com(&segment_data, num_frames)?;
        let total_buffer = self.total_body_com(&segment_buffer);

        let segment_names = self
            .definitions
            .iter()
            .map(|definition| definition.segment.clone())
            .collect();

        debug!(
            segments = self.definitions.len(),
            frames = num_frames,
            "center of mass computed"
        );

        Ok(CenterOfMassOutput {
            segment_com: Trajectory::new(
                TrajectoryName::SegmentCom.as_str(),
                segment_buffer,
                segment_names,
                num_frames,
            )?,
            total_body_com: Trajectory::new(
                TrajectoryName::TotalBodyCom.as_str(),
                total_buffer,
                vec![TOTAL_BODY_COM_MARKER.to_string()],
                num_frames,
            )?,
        })
    }
}

/// Pipeline task storing `segment_com` and `total_body_com` on the aspect.
#[derive(Debug, Clone, Copy, Default)]
pub struct CenterOfMassCalculation;

impl AnatomicalCalculation for CenterOfMassCalculation {
    fn name(&self) -> &'static str {
        "center_of_mass"
    }

    fn calculate(&self, aspect: &Aspect) -> Result<CalculationResult, BonefitError> {
        let structure = aspect.anatomical_structure();
        let Some(definitions) = structure.center_of_mass_definitions() else {
            return Ok(CalculationResult::skipped(format!(
                "No COM definitions for aspect: {}, skipping COM calculation",
                aspect.name()
            )));
        };
        let Some(trajectory) = aspect.xyz() else {
            return Ok(CalculationResult::skipped(format!(
                "No {} trajectory for aspect: {}, skipping COM calculation",
                TrajectoryName::Xyz,
                aspect.name()
            )));
        };

        // COM definitions can only exist on top of segment connections.
        let segments = structure.segment_connections().unwrap_or(&[]);
        let output = CenterOfMassEngine::new(definitions).compute(trajectory, segments)?;

        Ok(CalculationResult::succeeded(
            [output.segment_com, output.total_body_com],
            format!("Successfully calculated COM for aspect: {}", aspect.name()),
        ))
    }

    fn store(&self, aspect: &mut Aspect, mut result: CalculationResult) {
        for name in [TrajectoryName::SegmentCom, TrajectoryName::TotalBodyCom] {
            if let Some(trajectory) = result.take(name) {
                aspect.add_trajectory(trajectory);
            }
        }
    }
}
