//! Gibbs sampler over HMM parameters.
//!
//! One update cycle resamples, in order:
//!
//! 1. every hidden path from `P(S | A, π, emissions)` (forward filtering,
//!    backward sampling),
//! 2. the emission parameters given the observations assigned to each state,
//! 3. the transition matrix given the transition counts of the new paths.
//!
//! The initial distribution is held at the initializer's value. Paths are
//! drawn sequentially from a single RNG so seeded runs reproduce exactly.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, info_span};

use super::check_observations;
use super::maximum_likelihood::{MaximumLikelihoodEstimator, ModelInitializer};
use crate::config::SamplerConfig;
use crate::error::{BhmmError, Result};
use crate::hidden::{kernel_for, HiddenKernel, Workspace};
use crate::logging::{event_names, Stage};
use crate::model::{Hmm, ModelSnapshot};
use crate::msm::TransitionMatrixSampler;
use crate::output::OutputModel;

/// Bayesian HMM estimator drawing posterior model samples by Gibbs sampling.
#[derive(Debug)]
pub struct BayesianHmmSampler {
    observations: Vec<Vec<f64>>,
    config: SamplerConfig,
    model: Hmm,
    kernel: Box<dyn HiddenKernel>,
    tmatrix_sampler: TransitionMatrixSampler,
    workspace: Workspace,
    rng: StdRng,
    iteration: usize,
    log_likelihood: f64,
}

impl BayesianHmmSampler {
    /// Create a sampler. Without `initial_model` the chain starts from a
    /// maximum-likelihood fit.
    pub fn new(
        observations: Vec<Vec<f64>>,
        config: SamplerConfig,
        initial_model: Option<Hmm>,
    ) -> Result<Self> {
        match initial_model {
            Some(model) => Self::build(observations, config, model),
            None => Self::with_initializer(observations, config, &MaximumLikelihoodEstimator),
        }
    }

    /// Create a sampler whose starting model comes from `initializer`.
    pub fn with_initializer(
        observations: Vec<Vec<f64>>,
        config: SamplerConfig,
        initializer: &dyn ModelInitializer,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| BhmmError::InvalidInput(e.to_string()))?;
        check_observations(&observations)?;
        let model = initializer.fit(&observations, &config)?;
        Self::build(observations, config, model)
    }

    fn build(observations: Vec<Vec<f64>>, config: SamplerConfig, mut model: Hmm) -> Result<Self> {
        config
            .validate()
            .map_err(|e| BhmmError::InvalidInput(e.to_string()))?;
        let max_len = check_observations(&observations)?;
        model.validate()?;
        if model.nstates() != config.nstates {
            return Err(BhmmError::InvalidInput(format!(
                "initial model has {} states but nstates is {}",
                model.nstates(),
                config.nstates
            )));
        }
        if model.output_model().model_type() != config.output_model_type {
            return Err(BhmmError::InvalidInput(format!(
                "initial model has {} emissions but type is {}",
                model.output_model().model_type(),
                config.output_model_type
            )));
        }
        for obs in &observations {
            model.output_model().validate_observations(obs)?;
        }
        // Paths are regenerated on the first cycle.
        model.set_hidden_state_trajectories(None);

        let tmatrix_sampler = TransitionMatrixSampler::from_config(&config)?;
        let kernel = kernel_for(config.kernel);
        let workspace = Workspace::new(max_len, config.nstates);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        info!(
            target: event_names::SAMPLER_CREATED,
            nstates = config.nstates,
            ntrajectories = observations.len(),
            max_length = max_len,
            reversible = config.reversible,
            output_model = %config.output_model_type,
            kernel = kernel.name(),
            seeded = config.seed.is_some(),
            "created Bayesian HMM sampler"
        );

        Ok(Self {
            observations,
            config,
            model,
            kernel,
            tmatrix_sampler,
            workspace,
            rng,
            iteration: 0,
            log_likelihood: f64::NAN,
        })
    }

    /// Draw `nsamples` posterior snapshots.
    ///
    /// Runs `nburn` discarded cycles, then `nthin` cycles before each
    /// retained snapshot. Repeated calls continue the same chain.
    pub fn sample(
        &mut self,
        nsamples: usize,
        nburn: usize,
        nthin: usize,
        keep_hidden_paths: bool,
    ) -> Result<Vec<ModelSnapshot>> {
        if nthin == 0 {
            return Err(BhmmError::InvalidInput("nthin must be at least 1".to_string()));
        }

        {
            let _span = info_span!("sampler", stage = %Stage::BurnIn).entered();
            for i in 0..nburn {
                info!(
                    target: event_names::SAMPLER_BURN_IN,
                    step = i + 1,
                    total = nburn,
                    "Burn-in {} / {}",
                    i + 1,
                    nburn
                );
                self.update()?;
            }
        }

        let _span = info_span!("sampler", stage = %Stage::Sample).entered();
        let mut samples = Vec::with_capacity(nsamples);
        for i in 0..nsamples {
            info!(
                target: event_names::SAMPLER_ITERATION,
                step = i + 1,
                total = nsamples,
                "Iteration {} / {}",
                i + 1,
                nsamples
            );
            for _ in 0..nthin {
                self.update()?;
            }
            samples.push(
                self.model
                    .snapshot(self.iteration, self.log_likelihood, keep_hidden_paths),
            );
        }

        info!(
            target: event_names::SAMPLER_FINISHED,
            nsamples,
            iterations = self.iteration,
            log_likelihood = self.log_likelihood,
            "sampling finished"
        );
        Ok(samples)
    }

    /// Run one full Gibbs cycle.
    pub fn update(&mut self) -> Result<()> {
        let start = Instant::now();
        self.update_hidden_state_trajectories()?;
        let paths_done = Instant::now();
        self.update_emission_model()?;
        let emissions_done = Instant::now();
        self.update_transition_matrix()?;
        self.iteration += 1;

        debug!(
            target: event_names::SAMPLER_UPDATE,
            iteration = self.iteration,
            log_likelihood = self.log_likelihood,
            paths_ms = (paths_done - start).as_secs_f64() * 1e3,
            emissions_ms = (emissions_done - paths_done).as_secs_f64() * 1e3,
            tmatrix_ms = emissions_done.elapsed().as_secs_f64() * 1e3,
            "update cycle"
        );
        Ok(())
    }

    fn update_hidden_state_trajectories(&mut self) -> Result<()> {
        let a = self.model.transition_matrix();
        let pi = self.model.initial_distribution();
        let mut paths = Vec::with_capacity(self.observations.len());
        let mut log_likelihood = 0.0;
        for obs in &self.observations {
            let len = obs.len();
            let b = self.workspace.buffers(len)?;
            self.kernel.emissions(self.model.output_model(), obs, b.pobs);
            log_likelihood += self.kernel.forward(a, b.pobs, pi, len, b.alpha)?;
            paths.push(self.kernel.sample_path(b.alpha, a, len, &mut self.rng)?);
        }
        self.log_likelihood = log_likelihood;
        self.model.set_hidden_state_trajectories(Some(paths));
        Ok(())
    }

    fn update_emission_model(&mut self) -> Result<()> {
        let groups: Vec<Vec<f64>> = (0..self.model.nstates())
            .map(|state| {
                self.model
                    .collect_observations_in_state(&self.observations, state)
            })
            .collect();
        self.model
            .output_model_mut()
            .sample_parameters(&groups, &mut self.rng)
    }

    fn update_transition_matrix(&mut self) -> Result<()> {
        let counts = self.model.count_matrix()?;
        let a = self.tmatrix_sampler.sample(&counts, &mut self.rng)?;
        self.model.update_transition_matrix(a)
    }

    /// Current state of the chain.
    pub fn model(&self) -> &Hmm {
        &self.model
    }

    pub fn observations(&self) -> &[Vec<f64>] {
        &self.observations
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Completed update cycles, burn-in included.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Log-likelihood from the most recent path-sampling pass (`NaN` before
    /// the first cycle).
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn kernel_name(&self) -> &'static str {
        self.kernel.name()
    }
}
