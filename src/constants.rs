//! # Constants and type definitions for bonefit
//!
//! This module centralizes the **numerical tolerances** and **common type aliases** used
//! throughout the crate.
//!
//! ## Overview
//!
//! - Name aliases for markers and segments
//! - Tolerances used by the anatomical structure validation
//! - Numerical thresholds of the rigid-bone forward pass
//! - Marker names of synthesized outputs

use std::collections::HashMap;

use ahash::RandomState;
use nalgebra::Vector3;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Name of a marker (tracked point or virtual marker)
pub type MarkerName = String;
/// Name of a segment (bone) defined by a proximal and a distal marker
pub type SegmentName = String;
/// A 3D position, in the unit of the tracker output
pub type Position = Vector3<f64>;

/// Hash map used for name lookups across the crate.
///
/// Uses [`ahash`](https://docs.rs/ahash) for fast hashing of short string keys.
pub type NameMap<V> = HashMap<MarkerName, V, RandomState>;

// -------------------------------------------------------------------------------------------------
// Validation tolerances
// -------------------------------------------------------------------------------------------------

/// Lower bound accepted for the sum of virtual marker weights
pub const WEIGHT_SUM_MIN: f64 = 0.99;

/// Upper bound accepted for the sum of virtual marker weights
pub const WEIGHT_SUM_MAX: f64 = 1.01;

/// Allowed deviation of the summed segment mass percentages from 1 before a warning is logged
pub const MASS_PERCENTAGE_TOLERANCE: f64 = 0.01;

// -------------------------------------------------------------------------------------------------
// Rigid-bone forward pass
// -------------------------------------------------------------------------------------------------

/// Minimal norm of a parent→child vector for its direction to be trusted
pub const DIRECTION_EPS: f64 = 1e-6;

/// Direction seeded at the start of every frame, used until a well-defined bone is met
pub const DEFAULT_DIRECTION: [f64; 3] = [1.0, 0.0, 0.0];

// -------------------------------------------------------------------------------------------------
// Output marker names
// -------------------------------------------------------------------------------------------------

/// Marker name of the single column of the total body center of mass trajectory
pub const TOTAL_BODY_COM_MARKER: &str = "total_body_com";
