//! # Error type for bonefit
//!
//! Every fallible operation of the crate returns [`BonefitError`]. The variants fall into two
//! families:
//!
//! * **Configuration errors** – a malformed or cross-referentially invalid
//!   [`AnatomicalStructure`](crate::anatomical_structure::AnatomicalStructure) or model
//!   description (unknown marker references, bad weight sums, stages supplied out of order…).
//!   They are detected eagerly at build time. See [`BonefitError::is_configuration_error`].
//! * **Shape / reference errors** – a trajectory and a structure that do not agree
//!   (array dimensions, a marker missing during computation). They are raised immediately,
//!   since no safe recovery exists.
//!
//! Missing *optional* definitions (no center-of-mass table, no joint hierarchy) are **not**
//! errors: the calculations report them through
//! [`CalculationResult`](crate::biomechanics::CalculationResult) instead.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BonefitError {
    #[error("Cannot set {stage} before {requires}")]
    MissingPrerequisite {
        stage: &'static str,
        requires: &'static str,
    },

    #[error("The {0} stage was already applied to this builder")]
    StageAlreadySet(&'static str),

    #[error("Cannot set {stage} after {after}")]
    StageOutOfOrder {
        stage: &'static str,
        after: &'static str,
    },

    #[error("Tracked point names must contain at least one marker")]
    EmptyTrackedPoints,

    #[error("Duplicate marker name: {0}")]
    DuplicateMarker(String),

    #[error("Marker '{marker}' referenced by {context} is not a known marker")]
    UnknownMarker { context: String, marker: String },

    #[error(
        "Virtual marker '{virtual_marker}' has {names} marker names but {weights} marker weights"
    )]
    WeightCountMismatch {
        virtual_marker: String,
        names: usize,
        weights: usize,
    },

    #[error("Marker weights of virtual marker '{virtual_marker}' must sum to ~1, found {sum}")]
    InvalidWeightSum { virtual_marker: String, sum: f64 },

    #[error("Duplicate segment name: {0}")]
    DuplicateSegment(String),

    #[error("Segment '{0}' is not declared in the segment connections")]
    UnknownSegment(String),

    #[error("Center of mass {field} for segment '{segment}' must lie in [0, 1], found {value}")]
    InvalidComFraction {
        segment: String,
        field: &'static str,
        value: f64,
    },

    #[error("Invalid joint hierarchy: {0}")]
    InvalidJointHierarchy(String),

    #[error("Invalid model description: {0}")]
    InvalidModelInfo(String),

    #[error("Shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("Marker not found in trajectory: {0}")]
    MarkerNotFound(String),

    #[error("Segment positions not available for segment: {0}")]
    SegmentDataNotFound(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV writing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Error while parsing the model description: {0}")]
    TomlParsingError(#[from] toml::de::Error),
}

impl BonefitError {
    /// Whether this error belongs to the configuration family (detected while building an
    /// anatomical structure or reading a model description).
    pub fn is_configuration_error(&self) -> bool {
        use BonefitError::*;
        matches!(
            self,
            MissingPrerequisite { .. }
                | StageAlreadySet(_)
                | StageOutOfOrder { .. }
                | EmptyTrackedPoints
                | DuplicateMarker(_)
                | UnknownMarker { .. }
                | WeightCountMismatch { .. }
                | InvalidWeightSum { .. }
                | DuplicateSegment(_)
                | UnknownSegment(_)
                | InvalidComFraction { .. }
                | InvalidJointHierarchy(_)
                | InvalidModelInfo(_)
                | TomlParsingError(_)
        )
    }
}

impl PartialEq for BonefitError {
    fn eq(&self, other: &Self) -> bool {
        use BonefitError::*;
        match (self, other) {
            (
                MissingPrerequisite {
                    stage: a,
                    requires: b,
                },
                MissingPrerequisite {
                    stage: c,
                    requires: d,
                },
            ) => a == c && b == d,
            (StageAlreadySet(a), StageAlreadySet(b)) => a == b,
            (
                StageOutOfOrder { stage: a, after: b },
                StageOutOfOrder { stage: c, after: d },
            ) => a == c && b == d,
            (DuplicateMarker(a), DuplicateMarker(b)) => a == b,
            (
                UnknownMarker {
                    context: a,
                    marker: b,
                },
                UnknownMarker {
                    context: c,
                    marker: d,
                },
            ) => a == c && b == d,
            (
                WeightCountMismatch {
                    virtual_marker: a,
                    names: b,
                    weights: c,
                },
                WeightCountMismatch {
                    virtual_marker: d,
                    names: e,
                    weights: f,
                },
            ) => a == d && b == e && c == f,
            (
                InvalidWeightSum {
                    virtual_marker: a,
                    sum: b,
                },
                InvalidWeightSum {
                    virtual_marker: c,
                    sum: d,
                },
            ) => a == c && b == d,
            (DuplicateSegment(a), DuplicateSegment(b)) => a == b,
            (UnknownSegment(a), UnknownSegment(b)) => a == b,
            (
                InvalidComFraction {
                    segment: a,
                    field: b,
                    value: c,
                },
                InvalidComFraction {
                    segment: d,
                    field: e,
                    value: f,
                },
            ) => a == d && b == e && c == f,
            (InvalidJointHierarchy(a), InvalidJointHierarchy(b)) => a == b,
            (InvalidModelInfo(a), InvalidModelInfo(b)) => a == b,
            (
                ShapeMismatch {
                    context: a,
                    expected: b,
                    found: c,
                },
                ShapeMismatch {
                    context: d,
                    expected: e,
                    found: f,
                },
            ) => a == d && b == e && c == f,
            (MarkerNotFound(a), MarkerNotFound(b)) => a == b,
            (SegmentDataNotFound(a), SegmentDataNotFound(b)) => a == b,

            // Wrapped foreign errors: same variant means equal
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,
            (TomlParsingError(_), TomlParsingError(_)) => true,

            (EmptyTrackedPoints, EmptyTrackedPoints) => true,

            _ => false,
        }
    }
}
