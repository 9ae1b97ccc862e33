//! Categorical emissions over a finite alphabet `0..nsymbols`.
//!
//! Observations are carried as `f64` and must hold integral symbol indices.
//! Each state's emission row is resampled from its Dirichlet posterior under
//! a uniform `Dir(1, …, 1)` prior.

use bhmm_math::dirichlet::sample_posterior;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{check_state_groups, check_weights, OutputModel};
use crate::error::{BhmmError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteOutputModel {
    /// `nstates × nsymbols` emission probabilities.
    probabilities: Vec<Vec<f64>>,
}

impl DiscreteOutputModel {
    /// Build a model from a row-stochastic emission matrix.
    pub fn new(probabilities: Vec<Vec<f64>>) -> Result<Self> {
        let model = Self { probabilities };
        model.validate()?;
        Ok(model)
    }

    /// Starting parameters: empirical symbol frequencies, with state `i`
    /// favouring the `i`-th block of the alphabet so states start distinct.
    pub fn initial_guess(
        observations: &[Vec<f64>],
        nstates: usize,
        nsymbols: Option<usize>,
    ) -> Result<Self> {
        if nstates == 0 {
            return Err(BhmmError::InvalidInput("nstates must be at least 1".to_string()));
        }
        let nsymbols = match nsymbols {
            Some(m) => m,
            None => infer_nsymbols(observations)?,
        };
        if nsymbols == 0 {
            return Err(BhmmError::InvalidInput("nsymbols must be at least 1".to_string()));
        }

        let mut freq = vec![1.0; nsymbols];
        for &x in observations.iter().flatten() {
            let k = symbol_index(x, nsymbols).ok_or_else(|| invalid_symbol(x, nsymbols))?;
            freq[k] += 1.0;
        }

        let probabilities = (0..nstates)
            .map(|i| {
                let mut row: Vec<f64> = freq
                    .iter()
                    .enumerate()
                    .map(|(k, f)| if k * nstates / nsymbols == i { 2.0 * f } else { *f })
                    .collect();
                bhmm_math::normalize(&mut row);
                row
            })
            .collect();
        Self::new(probabilities)
    }

    pub fn nsymbols(&self) -> usize {
        self.probabilities.first().map_or(0, Vec::len)
    }

    /// Emission matrix, `nstates × nsymbols`.
    pub fn probabilities(&self) -> &[Vec<f64>] {
        &self.probabilities
    }
}

/// Largest symbol in the data plus one.
pub fn infer_nsymbols(observations: &[Vec<f64>]) -> Result<usize> {
    let mut max = None;
    for &x in observations.iter().flatten() {
        let k = symbol_index(x, usize::MAX).ok_or_else(|| invalid_symbol(x, usize::MAX))?;
        max = Some(max.map_or(k, |m: usize| m.max(k)));
    }
    max.map(|m| m + 1)
        .ok_or_else(|| BhmmError::InvalidInput("no observations to infer nsymbols from".to_string()))
}

fn symbol_index(x: f64, nsymbols: usize) -> Option<usize> {
    if !x.is_finite() || x < 0.0 || x.fract() != 0.0 || x >= nsymbols as f64 {
        return None;
    }
    Some(x as usize)
}

fn invalid_symbol(x: f64, nsymbols: usize) -> BhmmError {
    if nsymbols == usize::MAX {
        BhmmError::InvalidInput(format!("observation {} is not a symbol index", x))
    } else {
        BhmmError::InvalidInput(format!(
            "observation {} is not a symbol index in [0, {})",
            x, nsymbols
        ))
    }
}

impl OutputModel for DiscreteOutputModel {
    fn nstates(&self) -> usize {
        self.probabilities.len()
    }

    fn validate(&self) -> Result<()> {
        let nsymbols = self.nsymbols();
        if nsymbols == 0 {
            return Err(BhmmError::InvalidInput(
                "discrete output model needs at least one state and one symbol".to_string(),
            ));
        }
        for (i, row) in self.probabilities.iter().enumerate() {
            if row.len() != nsymbols {
                return Err(BhmmError::InvalidInput(format!(
                    "emission row {} has {} symbols, expected {}",
                    i,
                    row.len(),
                    nsymbols
                )));
            }
            let sum: f64 = row.iter().sum();
            if row.iter().any(|p| !p.is_finite() || *p < 0.0) || (sum - 1.0).abs() > 1e-6 {
                return Err(BhmmError::InvalidInput(format!(
                    "emission row {} is not a probability vector",
                    i
                )));
            }
        }
        Ok(())
    }

    fn validate_observations(&self, observations: &[f64]) -> Result<()> {
        let m = self.nsymbols();
        for &x in observations {
            if symbol_index(x, m).is_none() {
                return Err(invalid_symbol(x, m));
            }
        }
        Ok(())
    }

    fn p_obs(&self, observations: &[f64], out: &mut [f64]) {
        let n = self.nstates();
        let m = self.nsymbols();
        for (row, &x) in out.chunks_mut(n).zip(observations) {
            match symbol_index(x, m) {
                Some(k) => {
                    for (p, b) in row.iter_mut().zip(&self.probabilities) {
                        *p = b[k];
                    }
                }
                None => row.fill(0.0),
            }
        }
    }

    fn log_p_obs(&self, observations: &[f64], out: &mut [f64]) {
        self.p_obs(observations, out);
        out.iter_mut().for_each(|p| *p = p.ln());
    }

    fn sample_parameters(
        &mut self,
        observations_by_state: &[Vec<f64>],
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        check_state_groups(observations_by_state.len(), self.nstates())?;
        let m = self.nsymbols();
        for (state, y) in observations_by_state.iter().enumerate() {
            let mut counts = vec![0.0; m];
            for &x in y {
                let k = symbol_index(x, m).ok_or_else(|| invalid_symbol(x, m))?;
                counts[k] += 1.0;
            }
            self.probabilities[state] = sample_posterior(1.0, &counts, rng).ok_or_else(|| {
                BhmmError::InvalidInput(format!("invalid symbol counts for state {}", state))
            })?;
        }
        Ok(())
    }

    fn fit_weighted(&mut self, observations: &[Vec<f64>], weights: &[Vec<f64>]) -> Result<()> {
        let n = self.nstates();
        let m = self.nsymbols();
        check_weights(observations, weights, n)?;

        let mut counts = vec![vec![0.0; m]; n];
        for (obs, w) in observations.iter().zip(weights) {
            for (&x, row) in obs.iter().zip(w.chunks(n)) {
                let k = symbol_index(x, m).ok_or_else(|| invalid_symbol(x, m))?;
                for i in 0..n {
                    counts[i][k] += row[i];
                }
            }
        }
        for (state, mut row) in counts.into_iter().enumerate() {
            let total = bhmm_math::normalize(&mut row);
            if total > 0.0 && total.is_finite() {
                self.probabilities[state] = row;
            }
        }
        Ok(())
    }

    fn generate(&self, state: usize, rng: &mut dyn RngCore) -> f64 {
        // Rows are validated probability vectors, so a draw always exists.
        bhmm_math::sample_categorical(&self.probabilities[state], rng).unwrap_or(0) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn new_validates_rows() {
        assert!(DiscreteOutputModel::new(vec![]).is_err());
        assert!(DiscreteOutputModel::new(vec![vec![]]).is_err());
        assert!(DiscreteOutputModel::new(vec![vec![0.5, 0.5], vec![1.0]]).is_err());
        assert!(DiscreteOutputModel::new(vec![vec![0.5, 0.6]]).is_err());
        assert!(DiscreteOutputModel::new(vec![vec![1.5, -0.5]]).is_err());
        assert!(DiscreteOutputModel::new(vec![vec![0.5, 0.5], vec![1.0, 0.0]]).is_ok());
    }

    #[test]
    fn validates_symbol_indices() {
        let model = DiscreteOutputModel::new(vec![vec![0.2, 0.3, 0.5]]).unwrap();
        assert!(model.validate_observations(&[0.0, 2.0, 1.0]).is_ok());
        assert!(model.validate_observations(&[3.0]).is_err());
        assert!(model.validate_observations(&[1.5]).is_err());
        assert!(model.validate_observations(&[-1.0]).is_err());
        assert!(model.validate_observations(&[f64::NAN]).is_err());
    }

    #[test]
    fn p_obs_reads_columns() {
        let model = DiscreteOutputModel::new(vec![vec![0.9, 0.1], vec![0.3, 0.7]]).unwrap();
        let mut out = vec![0.0; 4];
        model.p_obs(&[0.0, 1.0], &mut out);
        assert_eq!(out, vec![0.9, 0.3, 0.1, 0.7]);
    }

    #[test]
    fn log_p_obs_marks_impossible_symbols() {
        let model = DiscreteOutputModel::new(vec![vec![1.0, 0.0], vec![0.25, 0.75]]).unwrap();
        let mut out = vec![0.0; 4];
        model.log_p_obs(&[1.0, 7.0], &mut out);
        assert_eq!(out[0], f64::NEG_INFINITY);
        assert!((out[1] - 0.75f64.ln()).abs() < 1e-12);
        assert!(out[2..].iter().all(|l| *l == f64::NEG_INFINITY));
    }

    #[test]
    fn sampling_follows_counts() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut model = DiscreteOutputModel::new(vec![vec![0.5, 0.5], vec![0.5, 0.5]]).unwrap();
        let mostly_zero: Vec<f64> = (0..1000).map(|i| if i % 10 == 0 { 1.0 } else { 0.0 }).collect();
        model
            .sample_parameters(&[mostly_zero, vec![]], &mut rng)
            .unwrap();
        let b = model.probabilities();
        assert!((b[0][0] - 0.9).abs() < 0.05, "{:?}", b[0]);
        assert!((b[1].iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn weighted_fit_counts_symbols() {
        let mut model = DiscreteOutputModel::new(vec![vec![0.5, 0.5], vec![0.5, 0.5]]).unwrap();
        let obs = vec![vec![0.0, 0.0, 1.0, 1.0]];
        let weights = vec![vec![1.0, 0.0, 1.0, 0.0, 0.5, 0.5, 0.0, 1.0]];
        model.fit_weighted(&obs, &weights).unwrap();
        let b = model.probabilities();
        assert!((b[0][0] - 0.8).abs() < 1e-12);
        assert!((b[1][1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn infer_nsymbols_from_data() {
        assert_eq!(infer_nsymbols(&[vec![0.0, 4.0], vec![2.0]]).unwrap(), 5);
        assert!(infer_nsymbols(&[vec![0.5]]).is_err());
        assert!(infer_nsymbols(&[vec![]]).is_err());
    }

    #[test]
    fn initial_guess_distinguishes_states() {
        let obs = vec![vec![0.0, 1.0, 2.0, 3.0, 3.0]];
        let model = DiscreteOutputModel::initial_guess(&obs, 2, None).unwrap();
        assert_eq!(model.nsymbols(), 4);
        let b = model.probabilities();
        assert_ne!(b[0], b[1]);
        assert!(b[0][0] > b[1][0]);
        assert!(b[1][3] > b[0][3]);
    }

    #[test]
    fn generate_returns_valid_symbols() {
        let mut rng = StdRng::seed_from_u64(4);
        let model = DiscreteOutputModel::new(vec![vec![0.0, 0.0, 1.0]]).unwrap();
        for _ in 0..10 {
            assert_eq!(model.generate(0, &mut rng), 2.0);
        }
    }
}
