//! Hidden Markov model state and immutable posterior snapshots.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{BhmmError, Result};
use crate::hidden::{HiddenKernel, Workspace};
use crate::msm;
use crate::output::{EmissionModel, OutputModel};

/// Tolerance for probability vectors supplied by callers.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// A hidden Markov model: initial distribution, transition matrix, emission
/// model, and the hidden paths most recently assigned to the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hmm {
    initial_distribution: Vec<f64>,
    transition_matrix: Vec<Vec<f64>>,
    output_model: EmissionModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hidden_state_trajectories: Option<Vec<Vec<usize>>>,
}

impl Hmm {
    /// Build and validate a model.
    pub fn new(
        initial_distribution: Vec<f64>,
        transition_matrix: Vec<Vec<f64>>,
        output_model: EmissionModel,
    ) -> Result<Self> {
        let model = Self {
            initial_distribution,
            transition_matrix,
            output_model,
            hidden_state_trajectories: None,
        };
        model.validate()?;
        Ok(model)
    }

    /// Check dimensions and stochasticity; used after deserialization too.
    pub fn validate(&self) -> Result<()> {
        let n = self.transition_matrix.len();
        if n == 0 {
            return Err(BhmmError::InvalidInput(
                "model must have at least one state".to_string(),
            ));
        }
        if self.initial_distribution.len() != n {
            return Err(BhmmError::InvalidInput(format!(
                "initial distribution has {} entries for {} states",
                self.initial_distribution.len(),
                n
            )));
        }
        self.output_model.validate()?;
        if self.output_model.nstates() != n {
            return Err(BhmmError::InvalidInput(format!(
                "output model has {} states, transition matrix has {}",
                self.output_model.nstates(),
                n
            )));
        }
        let pi_sum: f64 = self.initial_distribution.iter().sum();
        if self
            .initial_distribution
            .iter()
            .any(|p| !p.is_finite() || *p < 0.0)
            || (pi_sum - 1.0).abs() > PROBABILITY_TOLERANCE
        {
            return Err(BhmmError::InvalidInput(
                "initial distribution is not a probability vector".to_string(),
            ));
        }
        if !msm::is_row_stochastic(&self.transition_matrix, PROBABILITY_TOLERANCE) {
            return Err(BhmmError::InvalidInput(
                "transition matrix is not row-stochastic".to_string(),
            ));
        }
        if let Some(paths) = &self.hidden_state_trajectories {
            if paths.iter().flatten().any(|&s| s >= n) {
                return Err(BhmmError::InvalidInput(
                    "hidden state label out of range".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn nstates(&self) -> usize {
        self.transition_matrix.len()
    }

    pub fn initial_distribution(&self) -> &[f64] {
        &self.initial_distribution
    }

    pub fn transition_matrix(&self) -> &[Vec<f64>] {
        &self.transition_matrix
    }

    pub fn output_model(&self) -> &EmissionModel {
        &self.output_model
    }

    pub(crate) fn output_model_mut(&mut self) -> &mut EmissionModel {
        &mut self.output_model
    }

    pub fn hidden_state_trajectories(&self) -> Option<&[Vec<usize>]> {
        self.hidden_state_trajectories.as_deref()
    }

    pub(crate) fn set_hidden_state_trajectories(&mut self, paths: Option<Vec<Vec<usize>>>) {
        self.hidden_state_trajectories = paths;
    }

    pub(crate) fn set_initial_distribution(&mut self, pi: Vec<f64>) {
        self.initial_distribution = pi;
    }

    /// Replace the transition matrix after checking it is row-stochastic.
    pub fn update_transition_matrix(&mut self, transition_matrix: Vec<Vec<f64>>) -> Result<()> {
        if transition_matrix.len() != self.nstates()
            || !msm::is_row_stochastic(&transition_matrix, msm::ROW_SUM_TOLERANCE)
        {
            return Err(BhmmError::InvalidInput(
                "replacement transition matrix is not a row-stochastic nstates × nstates matrix"
                    .to_string(),
            ));
        }
        self.transition_matrix = transition_matrix;
        Ok(())
    }

    pub fn stationary_distribution(&self) -> Vec<f64> {
        msm::stationary_distribution(&self.transition_matrix)
    }

    pub fn is_reversible(&self, tol: f64) -> bool {
        msm::is_reversible(&self.transition_matrix, tol)
    }

    /// Mean state lifetimes in units of `dt`.
    pub fn lifetimes(&self, dt: f64) -> Vec<f64> {
        msm::lifetimes(&self.transition_matrix, dt)
    }

    /// Transition counts from the current hidden paths (zeros if none).
    pub fn count_matrix(&self) -> Result<Vec<Vec<f64>>> {
        match &self.hidden_state_trajectories {
            Some(paths) => msm::count_matrix(paths, self.nstates()),
            None => Ok(vec![vec![0.0; self.nstates()]; self.nstates()]),
        }
    }

    /// Every observation currently assigned to `state`, in trajectory order.
    pub fn collect_observations_in_state(&self, observations: &[Vec<f64>], state: usize) -> Vec<f64> {
        let Some(paths) = &self.hidden_state_trajectories else {
            return Vec::new();
        };
        observations
            .iter()
            .zip(paths)
            .flat_map(|(obs, path)| {
                obs.iter()
                    .zip(path)
                    .filter(move |(_, &s)| s == state)
                    .map(|(&x, _)| x)
            })
            .collect()
    }

    /// Total log-likelihood of `observations` under this model.
    pub fn log_likelihood(
        &self,
        observations: &[Vec<f64>],
        kernel: &dyn HiddenKernel,
        workspace: &mut Workspace,
    ) -> Result<f64> {
        let mut total = 0.0;
        for obs in observations {
            let buffers = workspace.buffers(obs.len())?;
            kernel.emissions(&self.output_model, obs, buffers.pobs);
            total += kernel.forward(
                &self.transition_matrix,
                buffers.pobs,
                &self.initial_distribution,
                obs.len(),
                buffers.alpha,
            )?;
        }
        Ok(total)
    }

    /// Simulate a hidden path of length `len`.
    pub fn generate_synthetic_state_trajectory(
        &self,
        len: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<usize>> {
        let mut path = Vec::with_capacity(len);
        if len == 0 {
            return Ok(path);
        }
        let mut state = draw(&self.initial_distribution, rng)?;
        path.push(state);
        for _ in 1..len {
            state = draw(&self.transition_matrix[state], rng)?;
            path.push(state);
        }
        Ok(path)
    }

    /// Simulate observations together with the hidden path that produced them.
    pub fn generate_synthetic_observation_trajectory(
        &self,
        len: usize,
        rng: &mut dyn RngCore,
    ) -> Result<(Vec<f64>, Vec<usize>)> {
        let states = self.generate_synthetic_state_trajectory(len, rng)?;
        let obs = states
            .iter()
            .map(|&s| self.output_model.generate(s, rng))
            .collect();
        Ok((obs, states))
    }

    /// Simulate `ntrajectories` independent trajectories of equal length.
    pub fn generate_synthetic_observation_trajectories(
        &self,
        ntrajectories: usize,
        len: usize,
        rng: &mut dyn RngCore,
    ) -> Result<(Vec<Vec<f64>>, Vec<Vec<usize>>)> {
        let mut observations = Vec::with_capacity(ntrajectories);
        let mut states = Vec::with_capacity(ntrajectories);
        for _ in 0..ntrajectories {
            let (o, s) = self.generate_synthetic_observation_trajectory(len, rng)?;
            observations.push(o);
            states.push(s);
        }
        Ok((observations, states))
    }

    /// Deep copy of the posterior-relevant fields.
    pub fn snapshot(&self, iteration: usize, log_likelihood: f64, keep_hidden_paths: bool) -> ModelSnapshot {
        ModelSnapshot {
            iteration,
            log_likelihood,
            initial_distribution: self.initial_distribution.clone(),
            transition_matrix: self.transition_matrix.clone(),
            output_model: self.output_model.clone(),
            hidden_state_trajectories: if keep_hidden_paths {
                self.hidden_state_trajectories.clone()
            } else {
                None
            },
        }
    }
}

fn draw(weights: &[f64], rng: &mut dyn RngCore) -> Result<usize> {
    bhmm_math::sample_categorical(weights, rng)
        .ok_or_else(|| BhmmError::InvalidInput("cannot sample from an empty distribution".to_string()))
}

/// One retained posterior sample.
///
/// Owns copies of every field, so later updates to the live model never
/// reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    iteration: usize,
    log_likelihood: f64,
    initial_distribution: Vec<f64>,
    transition_matrix: Vec<Vec<f64>>,
    output_model: EmissionModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hidden_state_trajectories: Option<Vec<Vec<usize>>>,
}

impl ModelSnapshot {
    /// Number of update cycles the chain had completed when this was taken.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Log-likelihood of the data under the parameters that generated the
    /// hidden paths of this cycle.
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn nstates(&self) -> usize {
        self.transition_matrix.len()
    }

    pub fn initial_distribution(&self) -> &[f64] {
        &self.initial_distribution
    }

    pub fn transition_matrix(&self) -> &[Vec<f64>] {
        &self.transition_matrix
    }

    pub fn output_model(&self) -> &EmissionModel {
        &self.output_model
    }

    pub fn hidden_state_trajectories(&self) -> Option<&[Vec<usize>]> {
        self.hidden_state_trajectories.as_deref()
    }

    pub fn stationary_distribution(&self) -> Vec<f64> {
        msm::stationary_distribution(&self.transition_matrix)
    }

    /// Convert back into a live model, e.g. to seed another chain.
    pub fn into_model(self) -> Hmm {
        Hmm {
            initial_distribution: self.initial_distribution,
            transition_matrix: self.transition_matrix,
            output_model: self.output_model,
            hidden_state_trajectories: self.hidden_state_trajectories,
        }
    }
}
