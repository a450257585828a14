//! Rich diagnostic error types for the dcr-discovery pipeline.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers can tell a misconfigured rule
//! apart from ordinary data sparsity. Data sparsity never surfaces here: skipped
//! pairs are counted in the effect estimate instead.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the discovery pipeline.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum DcrError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Similarity(#[from] SimilarityError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pairs(#[from] PairsError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Metric(#[from] MetricError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("failed to read triples from {path}: {source}")]
    #[diagnostic(
        code(dcr::graph::io),
        help("Check that the triples file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed triples document: {message}")]
    #[diagnostic(
        code(dcr::graph::parse),
        help(
            "Triples are read from a JSON array of objects shaped like \
             {{\"s\": \"...\", \"p\": \"...\", \"o\": \"...\", \"literal\": false}}."
        )
    )]
    Parse { message: String },

    #[error("empty {position} in triple #{index}")]
    #[diagnostic(
        code(dcr::graph::empty_term),
        help("Subjects and predicates must be non-empty identifiers.")
    )]
    EmptyTerm { position: &'static str, index: usize },
}

// ---------------------------------------------------------------------------
// Oracle errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum OracleError {
    #[error("no embedding for entity '{entity}'")]
    #[diagnostic(
        code(dcr::oracle::unknown_entity),
        help(
            "The embedding model has no vector for this entity. \
             Re-export the embeddings or drop the entity from the candidate set."
        )
    )]
    UnknownEntity { entity: String },

    #[error("no embedding for relation '{relation}'")]
    #[diagnostic(
        code(dcr::oracle::unknown_relation),
        help("Every predicate visited by the similarity scorer needs a relation vector.")
    )]
    UnknownRelation { relation: String },

    #[error("embedding '{name}' has dimension {actual}, expected {expected}")]
    #[diagnostic(
        code(dcr::oracle::dim_mismatch),
        help("All entity and relation vectors of one model must share a dimension.")
    )]
    DimensionMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("oracle returned invalid distance {distance} for '{entity}'")]
    #[diagnostic(
        code(dcr::oracle::invalid_distance),
        help(
            "Distances must be finite, non-negative and below the pairing mode's \
             sentinel (100 in free mode, 200 in cross-group mode)."
        )
    )]
    InvalidDistance { entity: String, distance: f64 },

    #[error("oracle returned {actual} scores for {expected} candidate triples")]
    #[diagnostic(
        code(dcr::oracle::score_count),
        help("Scores must be returned one per candidate triple, in input order.")
    )]
    ScoreCount { expected: usize, actual: usize },

    #[error("embedding backend error: {message}")]
    #[diagnostic(code(dcr::oracle::backend))]
    Backend { message: String },
}

// ---------------------------------------------------------------------------
// Similarity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SimilarityError {
    #[error("predicate '{predicate}' has no functionality degree")]
    #[diagnostic(
        code(dcr::similarity::unknown_property),
        help(
            "Every predicate visited while scoring must appear in the functionality \
             map. Add it under [similarity.functionality] with a degree >= 1."
        )
    )]
    UnknownProperty { predicate: String },

    #[error("predicate '{predicate}' has functionality degree 0")]
    #[diagnostic(
        code(dcr::similarity::zero_degree),
        help("The functionality degree is the number of top objects compared and must be >= 1.")
    )]
    ZeroDegree { predicate: String },

    #[error("functionality map is empty")]
    #[diagnostic(
        code(dcr::similarity::empty_map),
        help("List at least one predicate to compare entities on.")
    )]
    EmptyFunctionality,
}

// ---------------------------------------------------------------------------
// Pair mining errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PairsError {
    #[error("proportion {proportion} is outside [0, 1]")]
    #[diagnostic(
        code(dcr::pairs::proportion),
        help("The proportion is the share of all possible unordered pairs to extract.")
    )]
    InvalidProportion { proportion: f64 },

    #[error("distance threshold {threshold} is not a finite number")]
    #[diagnostic(code(dcr::pairs::threshold))]
    InvalidThreshold { threshold: f64 },

    #[error("entity '{entity}' appears in both treatment groups")]
    #[diagnostic(
        code(dcr::pairs::overlapping_groups),
        help("Cross-group pairing requires the t0 and t1 instance sets to be disjoint.")
    )]
    OverlappingGroups { entity: String },

    #[error("distance values do not form a {rows}x{cols} matrix")]
    #[diagnostic(
        code(dcr::pairs::shape),
        help("Pass one row of values per row label, each as long as the column labels.")
    )]
    ShapeMismatch { rows: usize, cols: usize },

    #[error("free-mode matrix has different row and column labels")]
    #[diagnostic(
        code(dcr::pairs::labels),
        help("In free mode every instance is both a row and a column, in the same order.")
    )]
    LabelMismatch,

    #[error("distance {distance} between '{row}' and '{col}' is not below the sentinel {sentinel}")]
    #[diagnostic(
        code(dcr::pairs::cell),
        help(
            "Cells hold finite, non-negative distances below the sentinel, or exactly \
             the sentinel for pairs that must never be matched."
        )
    )]
    InvalidCell {
        row: String,
        col: String,
        distance: f64,
        sentinel: f64,
    },
}

// ---------------------------------------------------------------------------
// Calibration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CalibrationError {
    #[error("need at least {needed} points to fit a degree-{degree} curve, got {actual}")]
    #[diagnostic(
        code(dcr::calibration::too_few_points),
        help("Increase the sample size or lower the polynomial degree.")
    )]
    TooFewPoints {
        degree: usize,
        needed: usize,
        actual: usize,
    },

    #[error("need at least two instances to draw pairs, got {actual}")]
    #[diagnostic(code(dcr::calibration::too_few_instances))]
    TooFewInstances { actual: usize },

    #[error("least-squares system is singular for degree {degree}")]
    #[diagnostic(
        code(dcr::calibration::singular),
        help(
            "The sampled distances do not vary enough to determine the curve. \
             Lower the degree or sample more pairs."
        )
    )]
    SingularFit { degree: usize },

    #[error("fitted curve increases with distance near {at:.4}")]
    #[diagnostic(
        code(dcr::calibration::non_monotonic),
        help(
            "Inverting the curve assumes similarity never increases with distance. \
             Refit with a lower degree or a larger, better-spread sample."
        )
    )]
    NonMonotonicCurve { at: f64 },

    #[error("fitted curve never reaches similarity {target}")]
    #[diagnostic(
        code(dcr::calibration::no_threshold),
        help("Pick a target similarity inside the range the curve actually covers.")
    )]
    NoThreshold { target: f64 },
}

// ---------------------------------------------------------------------------
// Metric errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MetricError {
    #[error("confidence multiplier {z} must be finite and positive")]
    #[diagnostic(code(dcr::metric::z), help("Use 1.96 for a 95% interval."))]
    InvalidZ { z: f64 },

    #[error("treatment values t0 and t1 are both '{value}'")]
    #[diagnostic(
        code(dcr::metric::same_categories),
        help("A categorical rule compares two distinct treatment values.")
    )]
    SameCategories { value: String },

    #[error("{role} path is empty")]
    #[diagnostic(
        code(dcr::metric::empty_path),
        help("Give at least one predicate to walk from the instance to its value.")
    )]
    EmptyPath { role: &'static str },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    #[diagnostic(code(dcr::config::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {message}")]
    #[diagnostic(
        code(dcr::config::parse),
        help("The run configuration is TOML with [similarity], [calibration], [pairing] and [metric] tables.")
    )]
    Parse { message: String },

    #[error("invalid config value for `{field}`: {message}")]
    #[diagnostic(code(dcr::config::invalid))]
    Invalid { field: &'static str, message: String },
}

/// Convenience result type for the discovery pipeline.
pub type DcrResult<T> = std::result::Result<T, DcrError>;
