//! Univariate Gaussian emissions, one normal per hidden state.
//!
//! Parameter resampling draws the mean from its conditional
//! `μ ~ N(ȳ, σ / √n)` and then the variance from the scaled inverse
//! chi-square `σ² = Σ(y - μ)² / χ²(n - 1)`, where `y` are the `n`
//! observations currently assigned to the state. States with no assigned
//! observations keep their parameters.

use rand::RngCore;
use rand_distr::{Distribution, Gamma, StandardNormal};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{check_state_groups, check_weights, OutputModel};
use crate::error::{BhmmError, Result};
use crate::logging::event_names;

/// Smallest standard deviation the model will hold.
pub const MIN_SIGMA: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianOutputModel {
    means: Vec<f64>,
    sigmas: Vec<f64>,
}

impl GaussianOutputModel {
    /// Build a model from per-state means and standard deviations.
    pub fn new(means: Vec<f64>, sigmas: Vec<f64>) -> Result<Self> {
        let model = Self { means, sigmas };
        model.validate()?;
        Ok(model)
    }

    /// Means spread over the data quantiles, widths from the overall spread.
    pub fn initial_guess(observations: &[Vec<f64>], nstates: usize) -> Result<Self> {
        let mut all: Vec<f64> = observations.iter().flatten().copied().collect();
        if all.is_empty() || nstates == 0 {
            return Err(BhmmError::InvalidInput(
                "cannot initialize gaussian model without observations".to_string(),
            ));
        }
        all.sort_by(f64::total_cmp);

        let n = all.len();
        let mean = all.iter().sum::<f64>() / n as f64;
        let var = all.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        let spread = var.sqrt();
        let sigma = if spread > 0.0 {
            (spread / nstates as f64).max(MIN_SIGMA)
        } else {
            1.0
        };

        let means = (0..nstates)
            .map(|i| {
                let q = (i as f64 + 0.5) / nstates as f64;
                let idx = ((q * n as f64) as usize).min(n - 1);
                all[idx]
            })
            .collect();
        Self::new(means, vec![sigma; nstates])
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn sigmas(&self) -> &[f64] {
        &self.sigmas
    }
}

impl OutputModel for GaussianOutputModel {
    fn nstates(&self) -> usize {
        self.means.len()
    }

    fn validate(&self) -> Result<()> {
        if self.means.is_empty() {
            return Err(BhmmError::InvalidInput(
                "gaussian output model needs at least one state".to_string(),
            ));
        }
        if self.means.len() != self.sigmas.len() {
            return Err(BhmmError::InvalidInput(format!(
                "{} means but {} sigmas",
                self.means.len(),
                self.sigmas.len()
            )));
        }
        if self.means.iter().any(|m| !m.is_finite()) {
            return Err(BhmmError::InvalidInput("means must be finite".to_string()));
        }
        if self.sigmas.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(BhmmError::InvalidInput(
                "sigmas must be finite and positive".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_observations(&self, observations: &[f64]) -> Result<()> {
        match observations.iter().position(|x| !x.is_finite()) {
            Some(t) => Err(BhmmError::InvalidInput(format!(
                "observation at t={} is not finite",
                t
            ))),
            None => Ok(()),
        }
    }

    fn p_obs(&self, observations: &[f64], out: &mut [f64]) {
        let n = self.nstates();
        for (row, &x) in out.chunks_mut(n).zip(observations) {
            for ((p, &mu), &sigma) in row.iter_mut().zip(&self.means).zip(&self.sigmas) {
                *p = bhmm_math::normal_pdf(x, mu, sigma);
            }
        }
    }

    fn log_p_obs(&self, observations: &[f64], out: &mut [f64]) {
        let n = self.nstates();
        for (row, &x) in out.chunks_mut(n).zip(observations) {
            for ((p, &mu), &sigma) in row.iter_mut().zip(&self.means).zip(&self.sigmas) {
                *p = bhmm_math::normal_log_pdf(x, mu, sigma);
            }
        }
    }

    fn sample_parameters(
        &mut self,
        observations_by_state: &[Vec<f64>],
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        check_state_groups(observations_by_state.len(), self.nstates())?;

        for (state, y) in observations_by_state.iter().enumerate() {
            let count = y.len();
            if count == 0 {
                warn!(
                    target: event_names::SAMPLER_UPDATE,
                    state,
                    "no observations assigned to state; keeping its emission parameters"
                );
                continue;
            }
            let n = count as f64;
            let ybar = y.iter().sum::<f64>() / n;

            let z: f64 = StandardNormal.sample(rng);
            let mu = ybar + z * self.sigmas[state] / n.sqrt();
            self.means[state] = mu;

            if count < 2 {
                continue;
            }
            let ss: f64 = y.iter().map(|x| (x - mu).powi(2)).sum();
            let chi2 = Gamma::new((n - 1.0) / 2.0, 2.0)
                .map_err(|e| BhmmError::InvalidInput(format!("chi-square draw: {}", e)))?
                .sample(rng);
            if chi2 > 0.0 {
                let sigma = (ss / chi2).sqrt();
                if sigma.is_finite() {
                    self.sigmas[state] = sigma.max(MIN_SIGMA);
                }
            }
        }
        Ok(())
    }

    fn fit_weighted(&mut self, observations: &[Vec<f64>], weights: &[Vec<f64>]) -> Result<()> {
        let n = self.nstates();
        check_weights(observations, weights, n)?;

        let mut w_sum = vec![0.0; n];
        let mut wx_sum = vec![0.0; n];
        for (obs, w) in observations.iter().zip(weights) {
            for (&x, row) in obs.iter().zip(w.chunks(n)) {
                for i in 0..n {
                    w_sum[i] += row[i];
                    wx_sum[i] += row[i] * x;
                }
            }
        }

        let mut wvar_sum = vec![0.0; n];
        let means: Vec<f64> = (0..n)
            .map(|i| {
                if w_sum[i] > 0.0 {
                    wx_sum[i] / w_sum[i]
                } else {
                    self.means[i]
                }
            })
            .collect();
        for (obs, w) in observations.iter().zip(weights) {
            for (&x, row) in obs.iter().zip(w.chunks(n)) {
                for i in 0..n {
                    wvar_sum[i] += row[i] * (x - means[i]).powi(2);
                }
            }
        }

        for i in 0..n {
            if w_sum[i] <= 0.0 {
                continue;
            }
            self.means[i] = means[i];
            self.sigmas[i] = (wvar_sum[i] / w_sum[i]).sqrt().max(MIN_SIGMA);
        }
        Ok(())
    }

    fn generate(&self, state: usize, rng: &mut dyn RngCore) -> f64 {
        let z: f64 = StandardNormal.sample(rng);
        self.means[state] + self.sigmas[state] * z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn new_validates() {
        assert!(GaussianOutputModel::new(vec![], vec![]).is_err());
        assert!(GaussianOutputModel::new(vec![0.0], vec![1.0, 2.0]).is_err());
        assert!(GaussianOutputModel::new(vec![0.0], vec![0.0]).is_err());
        assert!(GaussianOutputModel::new(vec![f64::NAN], vec![1.0]).is_err());
        assert!(GaussianOutputModel::new(vec![0.0, 1.0], vec![1.0, 2.0]).is_ok());
    }

    #[test]
    fn p_obs_matches_density() {
        let model = GaussianOutputModel::new(vec![0.0, 3.0], vec![1.0, 0.5]).unwrap();
        let mut out = vec![0.0; 4];
        model.p_obs(&[0.0, 3.0], &mut out);
        let peak = 1.0 / (2.0 * std::f64::consts::PI).sqrt();
        assert!((out[0] - peak).abs() < 1e-12);
        assert!((out[3] - 2.0 * peak).abs() < 1e-12);
        assert!(out[1] < 1e-6);
    }

    #[test]
    fn log_p_obs_stays_finite_between_narrow_modes() {
        let model = GaussianOutputModel::new(vec![0.0, 10.0], vec![0.1, 0.1]).unwrap();
        let mut dens = vec![0.0; 2];
        let mut logs = vec![0.0; 2];
        model.p_obs(&[5.0], &mut dens);
        model.log_p_obs(&[5.0], &mut logs);
        assert_eq!(dens, vec![0.0, 0.0]);
        assert!(logs.iter().all(|l| l.is_finite()));
        assert!((logs[0] - logs[1]).abs() < 1e-9);

        model.log_p_obs(&[0.0], &mut logs);
        model.p_obs(&[0.0], &mut dens);
        assert!((logs[0] - dens[0].ln()).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_finite_observations() {
        let model = GaussianOutputModel::new(vec![0.0], vec![1.0]).unwrap();
        assert!(model.validate_observations(&[1.0, f64::INFINITY]).is_err());
        assert!(model.validate_observations(&[1.0, -2.0]).is_ok());
    }

    #[test]
    fn sampling_concentrates_on_data() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut model = GaussianOutputModel::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        let data_a: Vec<f64> = (0..2000).map(|_| model.generate(0, &mut rng) * 0.5 - 4.0).collect();
        let data_b: Vec<f64> = (0..2000).map(|_| model.generate(1, &mut rng) * 2.0 + 5.0).collect();

        for _ in 0..20 {
            model
                .sample_parameters(&[data_a.clone(), data_b.clone()], &mut rng)
                .unwrap();
        }
        assert!((model.means()[0] + 4.0).abs() < 0.1, "{:?}", model.means());
        assert!((model.means()[1] - 5.0).abs() < 0.3, "{:?}", model.means());
        assert!((model.sigmas()[0] - 0.5).abs() < 0.05, "{:?}", model.sigmas());
        assert!((model.sigmas()[1] - 2.0).abs() < 0.2, "{:?}", model.sigmas());
    }

    #[test]
    fn empty_state_keeps_parameters() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut model = GaussianOutputModel::new(vec![1.0, 2.0], vec![0.3, 0.4]).unwrap();
        model
            .sample_parameters(&[vec![], vec![2.0, 2.1, 1.9]], &mut rng)
            .unwrap();
        assert_eq!(model.means()[0], 1.0);
        assert_eq!(model.sigmas()[0], 0.3);
    }

    #[test]
    fn single_observation_updates_mean_only() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut model = GaussianOutputModel::new(vec![0.0], vec![0.25]).unwrap();
        model.sample_parameters(&[vec![10.0]], &mut rng).unwrap();
        assert_eq!(model.sigmas()[0], 0.25);
        assert!((model.means()[0] - 10.0).abs() < 2.0);
    }

    #[test]
    fn wrong_group_count_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut model = GaussianOutputModel::new(vec![0.0, 1.0], vec![1.0, 1.0]).unwrap();
        assert!(model.sample_parameters(&[vec![1.0]], &mut rng).is_err());
    }

    #[test]
    fn weighted_fit_hard_assignments() {
        let mut model = GaussianOutputModel::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        let obs = vec![vec![1.0, 3.0, 10.0, 12.0]];
        let weights = vec![vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0]];
        model.fit_weighted(&obs, &weights).unwrap();
        assert_eq!(model.means(), &[2.0, 11.0]);
        assert_eq!(model.sigmas(), &[1.0, 1.0]);
    }

    #[test]
    fn initial_guess_orders_means() {
        let obs = vec![vec![0.0, 0.1, 0.2, 5.0, 5.1, 5.2, 9.8, 10.0, 10.1]];
        let model = GaussianOutputModel::initial_guess(&obs, 3).unwrap();
        let m = model.means();
        assert!(m[0] < m[1] && m[1] < m[2]);
        assert!(GaussianOutputModel::initial_guess(&[vec![]], 2).is_err());
    }

    #[test]
    fn constant_data_gets_unit_width() {
        let model = GaussianOutputModel::initial_guess(&[vec![2.0; 5]], 2).unwrap();
        assert_eq!(model.sigmas(), &[1.0, 1.0]);
    }
}
