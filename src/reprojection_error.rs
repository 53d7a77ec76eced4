//! # Per-marker reprojection error
//!
//! Multi-camera trackers report, for every frame and tracked point, how far the triangulated
//! point reprojects from its 2D detections. A [`ReprojectionError`] keeps these scalar values
//! in a single **frame-major** buffer, like [`Trajectory`](crate::trajectory::Trajectory)
//! does for positions:
//!
//! ```text
//! values = [ f0.m0, f0.m1, …, f0.mM-1, f1.m0, …, fF-1.mM-1 ]
//! ```
//!
//! Invariant: `values.len() == num_frames × marker_names.len()`, checked by every
//! constructor.
//!
//! Views
//! -----------------
//! * [`ReprojectionError::frame`] / [`ReprojectionError::frame_map`] – all markers of a frame.
//! * [`ReprojectionError::marker`] – one marker across all frames.
//! * [`ReprojectionError::tidy_rows`] / [`ReprojectionError::write_csv`] – long form with the
//!   columns `frame, keypoint, error`.
use std::fmt;

use ahash::RandomState;
use camino::Utf8Path;
use serde::Serialize;

use crate::bonefit_errors::BonefitError;
use crate::constants::{MarkerName, NameMap};

/// Raw reprojection error: one row of per-marker values per frame.
pub type ErrorFrames = [Vec<f64>];

/// Name under which an aspect stores its reprojection error.
pub const REPROJECTION_ERROR_NAME: &str = "reprojection_error";

/// One row of the long-form view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRow<'a> {
    pub frame: usize,
    pub keypoint: &'a str,
    pub error: f64,
}

/// Scalar error of an ordered list of markers over time.
#[derive(Debug, Clone, PartialEq)]
pub struct ReprojectionError {
    marker_names: Vec<MarkerName>,
    values: Vec<f64>,
    num_frames: usize,
    marker_indices: NameMap<usize>,
}

impl ReprojectionError {
    /// Build from a finished frame-major buffer.
    ///
    /// Return
    /// ----------
    /// * `Err(BonefitError::ShapeMismatch)` if `values` does not hold
    ///   `num_frames × marker_names.len()` entries.
    /// * `Err(BonefitError::DuplicateMarker)` if a name appears twice.
    pub fn new(
        values: Vec<f64>,
        marker_names: Vec<MarkerName>,
        num_frames: usize,
    ) -> Result<Self, BonefitError> {
        let expected = num_frames * marker_names.len();
        if values.len() != expected {
            return Err(BonefitError::ShapeMismatch {
                context: format!("values of {REPROJECTION_ERROR_NAME}"),
                expected,
                found: values.len(),
            });
        }

        let mut marker_indices =
            NameMap::with_capacity_and_hasher(marker_names.len(), RandomState::default());
        for (idx, marker) in marker_names.iter().enumerate() {
            if marker_indices.insert(marker.clone(), idx).is_some() {
                return Err(BonefitError::DuplicateMarker(marker.clone()));
            }
        }

        Ok(ReprojectionError {
            marker_names,
            values,
            num_frames,
            marker_indices,
        })
    }

    /// Build from one row per frame, each holding one value per name of `marker_names`.
    ///
    /// Return
    /// ----------
    /// * `Err(BonefitError::ShapeMismatch)` naming the first frame whose row has the wrong
    ///   length.
    pub fn from_frames(
        frames: &ErrorFrames,
        marker_names: Vec<MarkerName>,
    ) -> Result<Self, BonefitError> {
        let width = marker_names.len();
        if let Some((frame, row)) = frames
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != width)
        {
            return Err(BonefitError::ShapeMismatch {
                context: format!("markers of frame {frame} of {REPROJECTION_ERROR_NAME}"),
                expected: width,
                found: row.len(),
            });
        }

        let values = frames.iter().flatten().copied().collect();
        ReprojectionError::new(values, marker_names, frames.len())
    }

    pub fn name(&self) -> &str {
        REPROJECTION_ERROR_NAME
    }

    pub fn marker_names(&self) -> &[MarkerName] {
        &self.marker_names
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn num_markers(&self) -> usize {
        self.marker_names.len()
    }

    /// The whole frame-major buffer.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Errors of every marker at `frame`, in marker order.
    pub fn frame(&self, frame: usize) -> Option<&[f64]> {
        if frame >= self.num_frames {
            return None;
        }
        let width = self.num_markers();
        self.values.get(frame * width..(frame + 1) * width)
    }

    /// Errors at `frame`, keyed by marker name.
    pub fn frame_map(&self, frame: usize) -> Option<NameMap<f64>> {
        let row = self.frame(frame)?;
        Some(
            self.marker_names
                .iter()
                .cloned()
                .zip(row.iter().copied())
                .collect(),
        )
    }

    pub fn frames(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.num_markers().max(1))
    }

    /// Errors of the marker called `name` over all frames.
    pub fn marker(&self, name: &str) -> Option<Vec<f64>> {
        let idx = *self.marker_indices.get(name)?;
        Some(self.frames().map(|row| row[idx]).collect())
    }

    /// Rows ordered by frame, then by marker.
    pub fn tidy_rows(&self) -> impl Iterator<Item = ErrorRow<'_>> {
        self.frames().enumerate().flat_map(move |(frame, row)| {
            self.marker_names
                .iter()
                .zip(row)
                .map(move |(keypoint, &error)| ErrorRow {
                    frame,
                    keypoint,
                    error,
                })
        })
    }

    /// Write the tidy rows to a CSV file with a `frame,keypoint,error` header.
    pub fn write_csv(&self, path: &Utf8Path) -> Result<(), BonefitError> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in self.tidy_rows() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for ReprojectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reprojection error with {} frames and {} markers",
            self.num_frames,
            self.num_markers()
        )
    }
}
