//! Error types for the CMA-ES driver.
//!
//! Validation problems (dimension, bounds, infeasible start, options) are
//! detected before the first generation and returned as-is; objective
//! failures abort the run mid-loop. Checkpoint I/O has its own error type
//! because it never aborts a run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while setting up or running an optimization.
#[derive(Debug, Error)]
pub enum CmaesError {
    /// The problem has fewer than two parameters.
    #[error("invalid dimension: {dimension} parameters (CMA-ES needs at least 2)")]
    InvalidDimension {
        /// Number of parameters reported by the system
        dimension: usize,
    },

    /// A vector does not have the problem dimension.
    #[error("dimension mismatch: expected {expected} values, got {got}")]
    DimensionMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        got: usize,
    },

    /// A lower bound exceeds its upper bound, or a bound is NaN.
    #[error("invalid bounds at index {index}: lower ({lower}) > upper ({upper})")]
    InvalidBounds {
        /// Index of the invalid bound pair
        index: usize,
        /// The lower bound value
        lower: f64,
        /// The upper bound value
        upper: f64,
    },

    /// The initial guess lies outside the parameter limits.
    #[error("initial guess x[{index}] = {value} is not within limits [{lower}, {upper}]")]
    InfeasibleStart {
        /// First violating index
        index: usize,
        /// Offending value
        value: f64,
        /// Lower limit at `index`
        lower: f64,
        /// Upper limit at `index`
        upper: f64,
    },

    /// An advanced option is outside its valid domain or has the wrong type.
    #[error("invalid option '{name}': {reason}")]
    InvalidOption {
        /// Option name as supplied by the caller
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// The objective reported a failure for a candidate.
    #[error(
        "objective failed for candidate {index} in generation {generation} (status {status})"
    )]
    ObjectiveEvaluation {
        /// Candidate index within the population
        index: usize,
        /// Generation in which the failure happened (0-based)
        generation: usize,
        /// Non-zero status code returned by the objective
        status: i32,
    },

    /// The fitness vector does not line up with the sampled population.
    #[error("population mismatch: expected {expected} fitness values, got {got}")]
    PopulationMismatch {
        /// Population size
        expected: usize,
        /// Number of fitness values supplied
        got: usize,
    },
}

/// A specialized `Result` type for driver operations.
pub type Result<T> = std::result::Result<T, CmaesError>;

impl CmaesError {
    /// Returns `true` for errors raised before the generation loop starts.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            CmaesError::InvalidDimension { .. }
                | CmaesError::DimensionMismatch { .. }
                | CmaesError::InvalidBounds { .. }
                | CmaesError::InfeasibleStart { .. }
                | CmaesError::InvalidOption { .. }
        )
    }

    /// Returns `true` if an advanced option was rejected.
    pub fn is_option_error(&self) -> bool {
        matches!(self, CmaesError::InvalidOption { .. })
    }

    /// Returns `true` if the objective failed during the run.
    pub fn is_evaluation_error(&self) -> bool {
        matches!(self, CmaesError::ObjectiveEvaluation { .. })
    }

    pub(crate) fn invalid_option(name: &str, reason: impl Into<String>) -> Self {
        CmaesError::InvalidOption { name: name.to_string(), reason: reason.into() }
    }
}

/// Errors raised while reading or writing an engine checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The engine does not support checkpoints.
    #[error("checkpointing is not supported by this engine")]
    Unsupported,

    /// File could not be read or written.
    #[error("checkpoint I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File content is not a valid checkpoint.
    #[error("malformed checkpoint: {0}")]
    Json(#[from] serde_json::Error),

    /// The checkpoint was written for a different problem size.
    #[error("checkpoint dimension {found} does not match problem dimension {expected}")]
    DimensionMismatch {
        /// Problem dimension
        expected: usize,
        /// Dimension stored in the checkpoint
        found: usize,
    },
}

/// Non-fatal signal: a candidate could not be resampled into the box and
/// was clamped instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeasibilityStallWarning {
    /// Generation in which the stall happened (0-based)
    pub generation: usize,
    /// Candidate index within the population
    pub index: usize,
    /// Number of resamples tried before clamping
    pub attempts: usize,
}
