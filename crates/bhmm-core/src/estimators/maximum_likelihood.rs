//! Maximum-likelihood HMM estimation by Baum-Welch EM.
//!
//! Each iteration computes state probabilities and expected transition
//! counts for every trajectory with the configured [`HiddenKernel`], then
//! refits emissions, the transition matrix and the initial distribution.
//! Iteration stops when the log-likelihood changes by less than
//! `config.accuracy` or after `config.maxit` iterations. The returned model
//! carries the Viterbi paths of the final parameters.

use serde::Serialize;
use tracing::{debug, info};

use super::check_observations;
use crate::config::SamplerConfig;
use crate::error::{BhmmError, Result};
use crate::hidden::{kernel_for, HiddenKernel, Workspace};
use crate::logging::event_names;
use crate::model::Hmm;
use crate::msm;
use crate::output::{EmissionModel, OutputModel};

/// Produces a starting model for the Gibbs sampler.
pub trait ModelInitializer {
    fn fit(&self, observations: &[Vec<f64>], config: &SamplerConfig) -> Result<Hmm>;
}

/// Outcome of an EM run.
#[derive(Debug, Clone, Serialize)]
pub struct FitResult {
    pub model: Hmm,
    /// Log-likelihood at the start of every iteration.
    pub log_likelihoods: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

impl FitResult {
    /// Log-likelihood of the returned model.
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihoods.last().copied().unwrap_or(f64::NEG_INFINITY)
    }
}

/// Baum-Welch estimator. All settings come from the [`SamplerConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MaximumLikelihoodEstimator;

impl MaximumLikelihoodEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Run EM from a data-driven initial guess.
    pub fn estimate(&self, observations: &[Vec<f64>], config: &SamplerConfig) -> Result<FitResult> {
        config.validate().map_err(|e| BhmmError::InvalidInput(e.to_string()))?;
        check_observations(observations)?;
        let n = config.nstates;
        let output = EmissionModel::initial_guess(
            config.output_model_type,
            observations,
            n,
            config.nsymbols,
        )?;
        let model = Hmm::new(vec![1.0 / n as f64; n], initial_transition_matrix(n), output)?;
        self.estimate_from(observations, config, model)
    }

    /// Run EM starting from `model`.
    pub fn estimate_from(
        &self,
        observations: &[Vec<f64>],
        config: &SamplerConfig,
        mut model: Hmm,
    ) -> Result<FitResult> {
        let max_len = check_observations(observations)?;
        model.validate()?;
        let n = model.nstates();
        for obs in observations {
            model.output_model().validate_observations(obs)?;
        }
        let kernel = kernel_for(config.kernel);
        let mut workspace = Workspace::new(max_len, n);

        info!(
            target: event_names::FIT_STARTED,
            nstates = n,
            ntrajectories = observations.len(),
            kernel = kernel.name(),
            reversible = config.reversible,
            "starting maximum-likelihood fit"
        );

        let mut log_likelihoods = Vec::new();
        let mut converged = false;
        let mut iterations = 0;
        while iterations < config.maxit {
            let expectation = expectation_step(&model, observations, kernel.as_ref(), &mut workspace)?;
            if !expectation.log_likelihood.is_finite() {
                return Err(BhmmError::Estimation(format!(
                    "log-likelihood became {} at iteration {}",
                    expectation.log_likelihood, iterations
                )));
            }
            debug!(
                target: event_names::FIT_ITERATION,
                iteration = iterations,
                log_likelihood = expectation.log_likelihood,
                "EM iteration"
            );
            let previous = log_likelihoods.last().copied();
            log_likelihoods.push(expectation.log_likelihood);
            if let Some(prev) = previous {
                if (expectation.log_likelihood - prev).abs() < config.accuracy {
                    converged = true;
                    info!(
                        target: event_names::FIT_CONVERGED,
                        iteration = iterations,
                        log_likelihood = expectation.log_likelihood,
                        "EM converged"
                    );
                    break;
                }
            }
            maximization_step(&mut model, observations, expectation, config.reversible)?;
            iterations += 1;
        }

        let paths = viterbi_paths(&model, observations, kernel.as_ref(), &mut workspace)?;
        model.set_hidden_state_trajectories(Some(paths));

        info!(
            target: event_names::FIT_FINISHED,
            iterations,
            converged,
            log_likelihood = log_likelihoods.last().copied().unwrap_or(f64::NEG_INFINITY),
            "maximum-likelihood fit finished"
        );
        Ok(FitResult {
            model,
            log_likelihoods,
            iterations,
            converged,
        })
    }
}

impl ModelInitializer for MaximumLikelihoodEstimator {
    fn fit(&self, observations: &[Vec<f64>], config: &SamplerConfig) -> Result<Hmm> {
        Ok(self.estimate(observations, config)?.model)
    }
}

/// Sticky starting matrix: 0.9 on the diagonal, the rest spread evenly.
fn initial_transition_matrix(n: usize) -> Vec<Vec<f64>> {
    if n == 1 {
        return vec![vec![1.0]];
    }
    let off = 0.1 / (n - 1) as f64;
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 0.9 } else { off }).collect())
        .collect()
}

struct Expectation {
    log_likelihood: f64,
    gammas: Vec<Vec<f64>>,
    transition_counts: Vec<Vec<f64>>,
    initial_counts: Vec<f64>,
}

fn expectation_step(
    model: &Hmm,
    observations: &[Vec<f64>],
    kernel: &dyn HiddenKernel,
    workspace: &mut Workspace,
) -> Result<Expectation> {
    let n = model.nstates();
    let a = model.transition_matrix();
    let mut log_likelihood = 0.0;
    let mut gammas = Vec::with_capacity(observations.len());
    let mut transition_counts = vec![vec![0.0; n]; n];
    let mut initial_counts = vec![0.0; n];

    for obs in observations {
        let len = obs.len();
        let b = workspace.buffers(len)?;
        kernel.emissions(model.output_model(), obs, b.pobs);
        log_likelihood += kernel.forward(a, b.pobs, model.initial_distribution(), len, b.alpha)?;
        kernel.backward(a, b.pobs, len, b.beta)?;
        kernel.state_probabilities(b.alpha, b.beta, n, len, b.gamma);

        let xi = kernel.transition_counts(b.alpha, b.beta, a, b.pobs, len);
        for (acc, row) in transition_counts.iter_mut().zip(&xi) {
            for (c, x) in acc.iter_mut().zip(row) {
                *c += x;
            }
        }
        for (c, g) in initial_counts.iter_mut().zip(&b.gamma[..n]) {
            *c += g;
        }
        gammas.push(b.gamma.to_vec());
    }

    Ok(Expectation {
        log_likelihood,
        gammas,
        transition_counts,
        initial_counts,
    })
}

fn maximization_step(
    model: &mut Hmm,
    observations: &[Vec<f64>],
    expectation: Expectation,
    reversible: bool,
) -> Result<()> {
    model
        .output_model_mut()
        .fit_weighted(observations, &expectation.gammas)?;

    let a = msm::estimate_transition_matrix(&expectation.transition_counts, reversible)?;
    model.update_transition_matrix(a)?;

    let pi = if reversible {
        model.stationary_distribution()
    } else {
        let mut pi = expectation.initial_counts;
        let total = bhmm_math::normalize(&mut pi);
        if total > 0.0 && total.is_finite() {
            pi
        } else {
            model.initial_distribution().to_vec()
        }
    };
    model.set_initial_distribution(pi);
    Ok(())
}

fn viterbi_paths(
    model: &Hmm,
    observations: &[Vec<f64>],
    kernel: &dyn HiddenKernel,
    workspace: &mut Workspace,
) -> Result<Vec<Vec<usize>>> {
    observations
        .iter()
        .map(|obs| {
            let b = workspace.buffers(obs.len())?;
            kernel.emissions(model.output_model(), obs, b.pobs);
            kernel.viterbi(
                model.transition_matrix(),
                b.pobs,
                model.initial_distribution(),
                obs.len(),
            )
        })
        .collect()
}
