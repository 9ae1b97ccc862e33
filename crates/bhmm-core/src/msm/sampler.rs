//! Posterior sampling of transition matrices given transition counts.
//!
//! # Non-reversible
//!
//! Each row is an independent Dirichlet posterior: `T_i ~ Dir(C_i + prior)`.
//! Zero concentrations pin the entry to exactly 0 and rows without any mass
//! come back uniform.
//!
//! # Reversible
//!
//! Reversible matrices are parameterized by a symmetric non-negative matrix
//! `X` (`x_ij = π_i T_ij`), with `T_ij = x_ij / x_i` where `x_i = Σ_j x_ij`.
//! The posterior over `X` is explored by Metropolis-within-Gibbs:
//!
//! - diagonal `x_ii` is drawn exactly: with `s = x_i - x_ii`, the ratio
//!   `x_ii / s` follows a Beta-prime distribution, i.e. the ratio of
//!   `Gamma(c_ii)` and `Gamma(c_i - c_ii)` variates;
//! - each off-diagonal pair `v = x_ij = x_ji` with `c0 = c_ij + c_ji > 0` gets
//!   a random-walk Metropolis step on `ln v` targeting
//!   `c0 ln v - c_i ln(v + v1) - c_j ln(v + v2)`, where `v1`, `v2` are the
//!   remaining masses of rows `i` and `j`.
//!
//! `X` is renormalized to unit total after every sweep. The count graph is
//! first split into connected components that are sampled independently; a
//! state with no transitions to any other state keeps a self-transition of 1.

use rand::RngCore;
use rand_distr::{Distribution, Exp1, Gamma, StandardNormal};
use tracing::debug;

use crate::config::SamplerConfig;
use crate::error::{BhmmError, Result};
use crate::logging::event_names;
use crate::msm::analysis::{connected_sets, validate_count_matrix};

/// Draws transition matrices from their posterior given count matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrixSampler {
    reversible: bool,
    steps: usize,
    prior: f64,
}

impl TransitionMatrixSampler {
    /// Create a sampler. `steps` is the number of reversible sweeps per draw
    /// and `prior` the pseudo-count added to every entry of `C`.
    pub fn new(reversible: bool, steps: usize, prior: f64) -> Result<Self> {
        if steps == 0 {
            return Err(BhmmError::InvalidInput(
                "transition matrix sampling steps must be at least 1".to_string(),
            ));
        }
        if !prior.is_finite() || prior < 0.0 {
            return Err(BhmmError::InvalidInput(format!(
                "transition prior must be finite and non-negative, got {}",
                prior
            )));
        }
        Ok(Self {
            reversible,
            steps,
            prior,
        })
    }

    pub fn from_config(config: &SamplerConfig) -> Result<Self> {
        Self::new(
            config.reversible,
            config.transition_matrix_sampling_steps,
            config.transition_prior,
        )
    }

    pub fn reversible(&self) -> bool {
        self.reversible
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn prior(&self) -> f64 {
        self.prior
    }

    /// Draw one row-stochastic matrix from the posterior given `counts`.
    pub fn sample(&self, counts: &[Vec<f64>], rng: &mut dyn RngCore) -> Result<Vec<Vec<f64>>> {
        let n = counts.len();
        if n == 0 {
            return Err(BhmmError::InvalidCountMatrix("empty count matrix".to_string()));
        }
        validate_count_matrix(counts, n)?;

        let c: Vec<Vec<f64>> = counts
            .iter()
            .map(|row| row.iter().map(|v| v + self.prior).collect())
            .collect();

        if self.reversible {
            self.sample_reversible(&c, rng)
        } else {
            Ok(sample_nonreversible(&c, rng))
        }
    }

    fn sample_reversible(&self, c: &[Vec<f64>], rng: &mut dyn RngCore) -> Result<Vec<Vec<f64>>> {
        let n = c.len();
        let mut t = vec![vec![0.0; n]; n];
        let sets = connected_sets(c);
        debug!(
            target: event_names::TMATRIX_COMPONENTS,
            components = sets.len(),
            nstates = n,
            "split count graph"
        );

        for set in sets {
            if set.len() == 1 {
                let i = set[0];
                t[i][i] = 1.0;
                continue;
            }
            let sub: Vec<Vec<f64>> = set
                .iter()
                .map(|&i| set.iter().map(|&j| c[i][j]).collect())
                .collect();
            let sub_t = sample_reversible_connected(&sub, self.steps, rng)?;
            for (a, &i) in set.iter().enumerate() {
                for (b, &j) in set.iter().enumerate() {
                    t[i][j] = sub_t[a][b];
                }
            }
        }
        Ok(t)
    }
}

fn sample_nonreversible(c: &[Vec<f64>], rng: &mut dyn RngCore) -> Vec<Vec<f64>> {
    let n = c.len();
    c.iter()
        .map(|row| {
            let total: f64 = row.iter().sum();
            if total <= 0.0 {
                return vec![1.0 / n as f64; n];
            }
            bhmm_math::dirichlet::sample_dirichlet(row, rng).unwrap_or_else(|| {
                // Every Gamma draw underflowed; fall back to the posterior mean.
                row.iter().map(|v| v / total).collect()
            })
        })
        .collect()
}

/// Reversible sampler on a single connected component (at least two states,
/// every state touching an off-diagonal count).
fn sample_reversible_connected(
    c: &[Vec<f64>],
    steps: usize,
    rng: &mut dyn RngCore,
) -> Result<Vec<Vec<f64>>> {
    let n = c.len();
    let row_counts: Vec<f64> = c.iter().map(|r| r.iter().sum()).collect();

    let mut x: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| 0.5 * (c[i][j] + c[j][i])).collect())
        .collect();
    normalize_total(&mut x);
    let mut sums = vec![0.0; n];
    row_sums(&x, &mut sums);

    for _ in 0..steps {
        for i in 0..n {
            update_diagonal(&mut x, &mut sums, c[i][i], row_counts[i], i, rng)?;
        }
        for i in 0..n {
            for j in i + 1..n {
                let c0 = c[i][j] + c[j][i];
                if c0 <= 0.0 {
                    continue;
                }
                update_off_diagonal(&mut x, &mut sums, c0, row_counts[i], row_counts[j], i, j, rng);
            }
        }
        normalize_total(&mut x);
        row_sums(&x, &mut sums);
    }

    Ok(x.iter()
        .zip(&sums)
        .map(|(row, &s)| row.iter().map(|v| v / s).collect())
        .collect())
}

fn update_diagonal(
    x: &mut [Vec<f64>],
    sums: &mut [f64],
    c_ii: f64,
    c_i: f64,
    i: usize,
    rng: &mut dyn RngCore,
) -> Result<()> {
    let rest = c_i - c_ii;
    if c_ii <= 0.0 || rest <= 0.0 {
        return Ok(());
    }
    let g1: f64 = gamma(c_ii)?.sample(rng);
    let g2: f64 = gamma(rest)?.sample(rng);
    if g2 <= 0.0 {
        return Ok(());
    }
    let off = sums[i] - x[i][i];
    let value = g1 / g2 * off;
    if !value.is_finite() {
        return Ok(());
    }
    sums[i] += value - x[i][i];
    x[i][i] = value;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn update_off_diagonal(
    x: &mut [Vec<f64>],
    sums: &mut [f64],
    c0: f64,
    c1: f64,
    c2: f64,
    i: usize,
    j: usize,
    rng: &mut dyn RngCore,
) {
    let v = x[i][j];
    if v <= 0.0 {
        return;
    }
    let v1 = sums[i] - v;
    let v2 = sums[j] - v;
    let log_target = |v: f64| c0 * v.ln() - c1 * (v + v1).ln() - c2 * (v + v2).ln();

    let z: f64 = StandardNormal.sample(rng);
    let proposal = v * z.exp();
    if !(proposal.is_finite() && proposal > 0.0) {
        return;
    }
    let e: f64 = Exp1.sample(rng);
    if e > log_target(v) - log_target(proposal) {
        x[i][j] = proposal;
        x[j][i] = proposal;
        sums[i] = v1 + proposal;
        sums[j] = v2 + proposal;
    }
}

fn gamma(shape: f64) -> Result<Gamma<f64>> {
    Gamma::new(shape, 1.0).map_err(|e| {
        BhmmError::InvalidCountMatrix(format!("invalid Gamma shape {}: {}", shape, e))
    })
}

fn normalize_total(x: &mut [Vec<f64>]) {
    let total: f64 = x.iter().flatten().sum();
    if total > 0.0 && total.is_finite() {
        for v in x.iter_mut().flatten() {
            *v /= total;
        }
    }
}

fn row_sums(x: &[Vec<f64>], sums: &mut [f64]) {
    for (s, row) in sums.iter_mut().zip(x) {
        *s = row.iter().sum();
    }
}
