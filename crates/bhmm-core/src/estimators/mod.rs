//! Estimators over observation trajectories.
//!
//! - [`bayesian::BayesianHmmSampler`]: Gibbs sampler producing posterior
//!   model snapshots.
//! - [`maximum_likelihood::MaximumLikelihoodEstimator`]: Baum-Welch EM fit,
//!   used to bootstrap the sampler when no initial model is given.

pub mod bayesian;
pub mod maximum_likelihood;

pub use bayesian::BayesianHmmSampler;
pub use maximum_likelihood::{FitResult, MaximumLikelihoodEstimator, ModelInitializer};

use crate::error::{BhmmError, Result};

/// Check that the dataset is usable and return the longest trajectory length.
pub(crate) fn check_observations(observations: &[Vec<f64>]) -> Result<usize> {
    if observations.is_empty() {
        return Err(BhmmError::InvalidInput(
            "no observation trajectories given".to_string(),
        ));
    }
    let mut max_len = 0;
    for (k, obs) in observations.iter().enumerate() {
        if obs.is_empty() {
            return Err(BhmmError::InvalidInput(format!("trajectory {} is empty", k)));
        }
        if let Some(t) = obs.iter().position(|x| !x.is_finite()) {
            return Err(BhmmError::InvalidInput(format!(
                "trajectory {} has a non-finite observation at t={}",
                k, t
            )));
        }
        max_len = max_len.max(obs.len());
    }
    Ok(max_len)
}
