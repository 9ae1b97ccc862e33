//! Error types for Bayesian HMM estimation.
//!
//! Every failure is fatal for the run that produced it: the sampler never
//! retries a step or skips a trajectory, since either would bias the
//! posterior. Errors carry a stable numeric code for machine parsing and map
//! onto a CLI exit code.

use crate::config::ConfigError;
use crate::exit_codes::ExitCode;
use thiserror::Error;

/// Result type alias for bhmm-core operations.
pub type Result<T> = std::result::Result<T, BhmmError>;

/// Errors raised by the sampler, its collaborators and the CLI surface.
#[derive(Error, Debug)]
pub enum BhmmError {
    /// Empty or malformed observations, or invalid configuration values.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// All forward probabilities collapsed to zero at a time step.
    #[error("forward probabilities underflowed to zero at t={time}")]
    ForwardUnderflow { time: usize },

    /// Transition counts with negative entries or wrong dimensions.
    #[error("invalid count matrix: {0}")]
    InvalidCountMatrix(String),

    /// Maximum-likelihood fit produced a non-finite likelihood.
    #[error("estimation failed: {0}")]
    Estimation(String),

    /// Configuration file could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BhmmError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            BhmmError::InvalidInput(_) => 30,
            BhmmError::ForwardUnderflow { .. } => 40,
            BhmmError::InvalidCountMatrix(_) => 41,
            BhmmError::Estimation(_) => 42,
            BhmmError::Config(e) => e.code(),
            BhmmError::Io(_) => 70,
            BhmmError::Json(_) => 71,
        }
    }

    /// Exit code the CLI reports for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            BhmmError::InvalidInput(_) => ExitCode::BadInput,
            BhmmError::Config(_) => ExitCode::Usage,
            BhmmError::ForwardUnderflow { .. }
            | BhmmError::InvalidCountMatrix(_)
            | BhmmError::Estimation(_) => ExitCode::Numerical,
            BhmmError::Io(_) => ExitCode::Io,
            BhmmError::Json(_) => ExitCode::BadInput,
        }
    }

    /// Whether the error points at a numerical failure inside the sampler.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            BhmmError::ForwardUnderflow { .. } | BhmmError::Estimation(_)
        )
    }
}
