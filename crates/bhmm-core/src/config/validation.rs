//! Semantic validation for sampler configuration.
//!
//! Serde only checks shape; these checks reject values that would make the
//! sampler ill-defined (no states, no inner sweeps, negative pseudo-counts).

use thiserror::Error;

use super::sampler::{OutputModelType, SamplerConfig};

/// Errors that can occur during semantic validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("nstates must be at least 1")]
    NoStates,

    #[error("transition_matrix_sampling_steps must be at least 1")]
    NoSamplingSteps,

    #[error("transition_prior must be finite and non-negative (got {value})")]
    TransitionPriorRange { value: f64 },

    #[error("nsymbols must be at least 1 for discrete output models")]
    NoSymbols,

    #[error("nsymbols is only meaningful for discrete output models")]
    SymbolsWithoutDiscrete,

    #[error("maxit must be at least 1")]
    NoIterations,

    #[error("accuracy must be finite and positive (got {value})")]
    AccuracyRange { value: f64 },
}

impl ValidationError {
    /// Name of the offending configuration field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::NoStates => "nstates",
            ValidationError::NoSamplingSteps => "transition_matrix_sampling_steps",
            ValidationError::TransitionPriorRange { .. } => "transition_prior",
            ValidationError::NoSymbols | ValidationError::SymbolsWithoutDiscrete => "nsymbols",
            ValidationError::NoIterations => "maxit",
            ValidationError::AccuracyRange { .. } => "accuracy",
        }
    }
}

/// Validate a sampler configuration, returning the first problem found.
pub fn validate_sampler_config(config: &SamplerConfig) -> Result<(), ValidationError> {
    if config.nstates == 0 {
        return Err(ValidationError::NoStates);
    }
    if config.transition_matrix_sampling_steps == 0 {
        return Err(ValidationError::NoSamplingSteps);
    }
    if !config.transition_prior.is_finite() || config.transition_prior < 0.0 {
        return Err(ValidationError::TransitionPriorRange {
            value: config.transition_prior,
        });
    }
    match (config.output_model_type, config.nsymbols) {
        (OutputModelType::Discrete, Some(0)) => return Err(ValidationError::NoSymbols),
        (OutputModelType::Gaussian, Some(_)) => {
            return Err(ValidationError::SymbolsWithoutDiscrete)
        }
        _ => {}
    }
    if config.maxit == 0 {
        return Err(ValidationError::NoIterations);
    }
    if !config.accuracy.is_finite() || config.accuracy <= 0.0 {
        return Err(ValidationError::AccuracyRange {
            value: config.accuracy,
        });
    }
    Ok(())
}
