//! Emission (output) models.
//!
//! An output model turns an observation trajectory into a `len × nstates`
//! matrix of per-state emission probabilities and resamples its own
//! parameters from observations grouped by hidden state.

pub mod discrete;
pub mod gaussian;

pub use discrete::DiscreteOutputModel;
pub use gaussian::GaussianOutputModel;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::OutputModelType;
use crate::error::{BhmmError, Result};

/// Per-state emission distribution over scalar observations.
pub trait OutputModel {
    /// Number of hidden states the model covers.
    fn nstates(&self) -> usize;

    /// Check parameter shapes and values. Deserialized models bypass the
    /// constructors, so [`crate::model::Hmm::validate`] calls this.
    fn validate(&self) -> Result<()>;

    /// Reject observations the model cannot score.
    fn validate_observations(&self, observations: &[f64]) -> Result<()>;

    /// Write emission probabilities into `out` (row-major,
    /// `observations.len() × nstates`).
    fn p_obs(&self, observations: &[f64], out: &mut [f64]);

    /// Same layout as [`Self::p_obs`], holding natural-log densities.
    /// Impossible emissions are `-inf`.
    fn log_p_obs(&self, observations: &[f64], out: &mut [f64]);

    /// Resample parameters given, per state, every observation assigned to
    /// that state in the current hidden paths.
    fn sample_parameters(
        &mut self,
        observations_by_state: &[Vec<f64>],
        rng: &mut dyn RngCore,
    ) -> Result<()>;

    /// Weighted maximum-likelihood update. `weights[k]` holds the
    /// `len × nstates` state probabilities for trajectory `k`.
    fn fit_weighted(&mut self, observations: &[Vec<f64>], weights: &[Vec<f64>]) -> Result<()>;

    /// Draw one observation from the emission distribution of `state`.
    fn generate(&self, state: usize, rng: &mut dyn RngCore) -> f64;
}

/// Concrete emission model carried by an [`crate::model::Hmm`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmissionModel {
    Gaussian(GaussianOutputModel),
    Discrete(DiscreteOutputModel),
}

impl EmissionModel {
    /// Family of this model.
    pub fn model_type(&self) -> OutputModelType {
        match self {
            EmissionModel::Gaussian(_) => OutputModelType::Gaussian,
            EmissionModel::Discrete(_) => OutputModelType::Discrete,
        }
    }

    /// Data-driven starting parameters for maximum-likelihood fitting.
    pub fn initial_guess(
        model_type: OutputModelType,
        observations: &[Vec<f64>],
        nstates: usize,
        nsymbols: Option<usize>,
    ) -> Result<Self> {
        match model_type {
            OutputModelType::Gaussian => Ok(EmissionModel::Gaussian(
                GaussianOutputModel::initial_guess(observations, nstates)?,
            )),
            OutputModelType::Discrete => Ok(EmissionModel::Discrete(
                DiscreteOutputModel::initial_guess(observations, nstates, nsymbols)?,
            )),
        }
    }

    fn inner(&self) -> &dyn OutputModel {
        match self {
            EmissionModel::Gaussian(m) => m,
            EmissionModel::Discrete(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn OutputModel {
        match self {
            EmissionModel::Gaussian(m) => m,
            EmissionModel::Discrete(m) => m,
        }
    }
}

impl OutputModel for EmissionModel {
    fn nstates(&self) -> usize {
        self.inner().nstates()
    }

    fn validate(&self) -> Result<()> {
        self.inner().validate()
    }

    fn validate_observations(&self, observations: &[f64]) -> Result<()> {
        self.inner().validate_observations(observations)
    }

    fn p_obs(&self, observations: &[f64], out: &mut [f64]) {
        self.inner().p_obs(observations, out)
    }

    fn log_p_obs(&self, observations: &[f64], out: &mut [f64]) {
        self.inner().log_p_obs(observations, out)
    }

    fn sample_parameters(
        &mut self,
        observations_by_state: &[Vec<f64>],
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        self.inner_mut()
            .sample_parameters(observations_by_state, rng)
    }

    fn fit_weighted(&mut self, observations: &[Vec<f64>], weights: &[Vec<f64>]) -> Result<()> {
        self.inner_mut().fit_weighted(observations, weights)
    }

    fn generate(&self, state: usize, rng: &mut dyn RngCore) -> f64 {
        self.inner().generate(state, rng)
    }
}

/// Shared argument checks for `sample_parameters` / `fit_weighted`.
pub(crate) fn check_state_groups(groups: usize, nstates: usize) -> Result<()> {
    if groups != nstates {
        return Err(BhmmError::InvalidInput(format!(
            "expected observations for {} states, got {}",
            nstates, groups
        )));
    }
    Ok(())
}

pub(crate) fn check_weights(
    observations: &[Vec<f64>],
    weights: &[Vec<f64>],
    nstates: usize,
) -> Result<()> {
    if observations.len() != weights.len() {
        return Err(BhmmError::InvalidInput(format!(
            "{} trajectories but {} weight matrices",
            observations.len(),
            weights.len()
        )));
    }
    for (k, (obs, w)) in observations.iter().zip(weights).enumerate() {
        if w.len() != obs.len() * nstates {
            return Err(BhmmError::InvalidInput(format!(
                "weights for trajectory {} have {} entries, expected {}",
                k,
                w.len(),
                obs.len() * nstates
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_is_tagged_by_type() {
        let model = EmissionModel::Gaussian(
            GaussianOutputModel::new(vec![0.0, 1.0], vec![1.0, 0.5]).unwrap(),
        );
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["type"], "gaussian");
        assert_eq!(json["means"][1], 1.0);

        let back: EmissionModel = serde_json::from_value(json).unwrap();
        assert_eq!(back, model);
        assert_eq!(back.model_type(), OutputModelType::Gaussian);
    }

    #[test]
    fn dispatch_reaches_inner_model() {
        let model = EmissionModel::Discrete(
            DiscreteOutputModel::new(vec![vec![0.9, 0.1], vec![0.2, 0.8]]).unwrap(),
        );
        assert_eq!(model.nstates(), 2);
        let mut out = vec![0.0; 2];
        model.p_obs(&[1.0], &mut out);
        assert_eq!(out, vec![0.1, 0.8]);
        assert!(model.validate_observations(&[2.0]).is_err());
    }

    #[test]
    fn weight_shape_checks() {
        let obs = vec![vec![1.0, 2.0]];
        assert!(check_weights(&obs, &[vec![0.5; 4]], 2).is_ok());
        assert!(check_weights(&obs, &[vec![0.5; 3]], 2).is_err());
        assert!(check_weights(&obs, &[], 2).is_err());
        assert!(check_state_groups(3, 2).is_err());
    }
}
