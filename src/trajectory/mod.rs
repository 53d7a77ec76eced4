//! # Trajectories: named 3D marker time series
//!
//! A [`Trajectory`] stores the positions of an ordered list of markers over a number of
//! frames. Positions are kept in a single contiguous, **frame-major** buffer of
//! [`Position`](crate::constants::Position) (`nalgebra::Vector3<f64>`):
//!
//! ```text
//! positions = [ f0.m0, f0.m1, …, f0.mM-1, f1.m0, …, fF-1.mM-1 ]
//! ```
//!
//! Invariant: `positions.len() == num_frames × marker_names.len()`, checked by every
//! constructor.
//!
//! Construction paths
//! -----------------
//! * [`Trajectory::from_tracked_points`] – raw tracker rows + an
//!   [`AnatomicalStructure`]: names the columns and appends the virtual markers.
//! * [`Trajectory::new`] – a finished frame-major buffer with its marker names (used by the
//!   engines for their outputs).
//!
//! Views
//! -----------------
//! * [`Trajectory::as_slice`] / [`Trajectory::frame`] / [`Trajectory::frames`] – array views.
//! * [`Trajectory::marker`] / [`Trajectory::as_map`] – per-marker [`MarkerSeries`], zero-copy.
//! * [`Trajectory::segment_data`] – proximal/distal series per segment.
//! * [`Trajectory::tidy_rows`](crate::trajectory::Trajectory::tidy_rows) – one row per frame
//!   and marker, see [`tidy`](crate::trajectory::tidy).
//!
//! Virtual markers
//! -----------------
//! Each virtual marker is the weighted sum of its components at every frame. Components are
//! resolved against the columns already built, so a virtual marker may use any virtual marker
//! defined before it. No renormalization is applied: the weight sum was checked when the
//! structure was built.
use std::collections::HashMap;
use std::fmt;

use ahash::RandomState;

use crate::anatomical_structure::{AnatomicalStructure, SegmentConnection};
use crate::bonefit_errors::BonefitError;
use crate::constants::{MarkerName, NameMap, Position};

pub mod tidy;

/// Raw tracker output: one row of tracked-point positions per frame.
pub type TrackedFrames = [Vec<Position>];

/// Positions of a single marker across all frames, borrowed from a [`Trajectory`].
#[derive(Debug, Clone, Copy)]
pub struct MarkerSeries<'a> {
    positions: &'a [Position],
    stride: usize,
    offset: usize,
    num_frames: usize,
}

impl<'a> MarkerSeries<'a> {
    /// Position at `frame`, or `None` past the last frame.
    #[inline]
    pub fn get(&self, frame: usize) -> Option<&'a Position> {
        if frame >= self.num_frames {
            return None;
        }
        self.positions.get(frame * self.stride + self.offset)
    }

    pub fn len(&self) -> usize {
        self.num_frames
    }

    pub fn is_empty(&self) -> bool {
        self.num_frames == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Position> + 'a {
        let positions = self.positions;
        let (stride, offset) = (self.stride, self.offset);
        (0..self.num_frames).map(move |frame| &positions[frame * stride + offset])
    }

    /// Copy the series into an owned vector.
    pub fn to_vec(&self) -> Vec<Position> {
        self.iter().copied().collect()
    }
}

/// Proximal and distal series of one segment.
#[derive(Debug, Clone, Copy)]
pub struct SegmentPositions<'a> {
    pub proximal: MarkerSeries<'a>,
    pub distal: MarkerSeries<'a>,
}

/// 3D positions of an ordered list of markers over time.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    name: String,
    marker_names: Vec<MarkerName>,
    positions: Vec<Position>,
    num_frames: usize,
    marker_indices: NameMap<usize>,
}

impl Trajectory {
    /// Build a trajectory from a finished frame-major buffer.
    ///
    /// Arguments
    /// -----------------
    /// * `name`: identifier of the trajectory (e.g. `"rigid_3d_xyz"`).
    /// * `positions`: frame-major buffer, `num_frames × marker_names.len()` long.
    /// * `marker_names`: ordered, unique marker names (one per column).
    /// * `num_frames`: number of frames in the buffer.
    ///
    /// Return
    /// ----------
    /// * `Err(BonefitError::ShapeMismatch)` if the buffer length does not match,
    ///   `Err(BonefitError::DuplicateMarker)` if a name appears twice.
    pub fn new(
        name: impl Into<String>,
        positions: Vec<Position>,
        marker_names: Vec<MarkerName>,
        num_frames: usize,
    ) -> Result<Self, BonefitError> {
        let name = name.into();
        let expected = num_frames * marker_names.len();
        if positions.len() != expected {
            return Err(BonefitError::ShapeMismatch {
                context: format!("positions of trajectory '{name}'"),
                expected,
                found: positions.len(),
            });
        }

        let mut marker_indices = NameMap::with_capacity_and_hasher(
            marker_names.len(),
            RandomState::default(),
        );
        for (idx, marker) in marker_names.iter().enumerate() {
            if marker_indices.insert(marker.clone(), idx).is_some() {
                return Err(BonefitError::DuplicateMarker(marker.clone()));
            }
        }

        Ok(Trajectory {
            name,
            marker_names,
            positions,
            num_frames,
            marker_indices,
        })
    }

    /// Build a trajectory from raw tracker rows, appending the structure's virtual markers.
    ///
    /// Arguments
    /// -----------------
    /// * `name`: identifier of the trajectory (conventionally `"3d_xyz"`).
    /// * `frames`: one row per frame, each holding the positions of the tracked points in the
    ///   order of [`AnatomicalStructure::tracked_point_names`].
    /// * `structure`: provides the marker names and the virtual marker definitions.
    ///
    /// Return
    /// ----------
    /// * A trajectory whose markers are the tracked points followed by the virtual markers.
    /// * `Err(BonefitError::ShapeMismatch)` if a row does not hold exactly one position per
    ///   tracked point.
    pub fn from_tracked_points(
        name: impl Into<String>,
        frames: &TrackedFrames,
        structure: &AnatomicalStructure,
    ) -> Result<Self, BonefitError> {
        let name = name.into();
        let num_tracked = structure.tracked_point_names().len();

        if let Some((frame, row)) = frames
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != num_tracked)
        {
            return Err(BonefitError::ShapeMismatch {
                context: format!("markers of frame {frame} of trajectory '{name}'"),
                expected: num_tracked,
                found: row.len(),
            });
        }

        let components = structure
            .virtual_marker_definitions()
            .iter()
            .map(|vm| {
                vm.components()
                    .map(|(component, weight)| {
                        structure
                            .marker_index(component)
                            .map(|idx| (idx, weight))
                            .ok_or_else(|| BonefitError::MarkerNotFound(component.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let num_markers = structure.num_markers();
        let mut positions = Vec::with_capacity(frames.len() * num_markers);

        for row in frames {
            let frame_start = positions.len();
            positions.extend_from_slice(row);
            for weighted in &components {
                let virtual_position = weighted
                    .iter()
                    .fold(Position::zeros(), |acc, &(idx, weight)| {
                        acc + positions[frame_start + idx] * weight
                    });
                positions.push(virtual_position);
            }
        }

        Trajectory::new(name, positions, structure.marker_names(), frames.len())
    }

    pub fn name(&self) -> &str {
        &self.name
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
    pub fn as_slice(&self) -> &[Position] {
        &self.positions
    }

    /// Consume the trajectory and return its frame-major buffer.
    pub fn into_positions(self) -> Vec<Position> {
        self.positions
    }

    /// All marker positions of one frame, in marker order.
    pub fn frame(&self, frame: usize) -> Option<&[Position]> {
        if frame >= self.num_frames {
            return None;
        }
        let width = self.num_markers();
        self.positions.get(frame * width..(frame + 1) * width)
    }

    /// Iterate over frames, each as a slice of marker positions.
    pub fn frames(&self) -> impl Iterator<Item = &[Position]> {
        self.positions.chunks_exact(self.num_markers().max(1))
    }

    pub fn marker_index(&self, name: &str) -> Option<usize> {
        self.marker_indices.get(name).copied()
    }

    /// Position of `marker` at `frame`.
    pub fn position(&self, frame: usize, marker: usize) -> Option<&Position> {
        if marker >= self.num_markers() {
            return None;
        }
        self.frame(frame).map(|row| &row[marker])
    }

    /// Series of the marker stored in column `idx`.
    pub fn marker_at(&self, idx: usize) -> Option<MarkerSeries<'_>> {
        if idx >= self.num_markers() {
            return None;
        }
        Some(MarkerSeries {
            positions: &self.positions,
            stride: self.num_markers(),
            offset: idx,
            num_frames: self.num_frames,
        })
    }

    /// Series of the marker called `name`, or `None` if the trajectory does not hold it.
    pub fn marker(&self, name: &str) -> Option<MarkerSeries<'_>> {
        self.marker_index(name).and_then(|idx| self.marker_at(idx))
    }

    /// Like [`Trajectory::marker`], failing with [`BonefitError::MarkerNotFound`].
    pub fn try_marker(&self, name: &str) -> Result<MarkerSeries<'_>, BonefitError> {
        self.marker(name)
            .ok_or_else(|| BonefitError::MarkerNotFound(name.to_string()))
    }

    /// Map every marker name to its series.
    pub fn as_map(&self) -> HashMap<&str, MarkerSeries<'_>, RandomState> {
        self.marker_names
            .iter()
            .enumerate()
            .filter_map(|(idx, name)| Some((name.as_str(), self.marker_at(idx)?)))
            .collect()
    }

    /// Proximal and distal series of each segment.
    ///
    /// Segments whose proximal or distal marker is not held by this trajectory are left out
    /// (a hand trajectory does not carry the body segments). An empty slice gives an empty map.
    pub fn segment_data(&self, segments: &[SegmentConnection]) -> NameMap<SegmentPositions<'_>> {
        segments
            .iter()
            .filter_map(|segment| {
                let proximal = self.marker(&segment.proximal)?;
                let distal = self.marker(&segment.distal)?;
                Some((segment.name.clone(), SegmentPositions { proximal, distal }))
            })
            .collect()
    }
}

impl fmt::Display for Trajectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trajectory '{}' with {} frames and {} markers",
            self.name,
            self.num_frames,
            self.num_markers()
        )
    }
}
