//! Synthetic models and datasets with known ground truth.
//!
//! Used by tests, benchmarks and `bhmm generate`.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::OutputModelType;
use crate::error::{BhmmError, Result};
use crate::model::Hmm;
use crate::msm;
use crate::output::{DiscreteOutputModel, EmissionModel, GaussianOutputModel};

/// Shape of a Dalton-style test model: states with evenly spaced emission
/// means and widths, and lifetimes spaced geometrically between two bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestModelParams {
    pub nstates: usize,
    pub omin: f64,
    pub omax: f64,
    pub sigma_min: f64,
    pub sigma_max: f64,
    pub lifetime_min: f64,
    pub lifetime_max: f64,
    pub reversible: bool,
}

impl Default for TestModelParams {
    fn default() -> Self {
        Self {
            nstates: 3,
            omin: -5.0,
            omax: 5.0,
            sigma_min: 0.5,
            sigma_max: 2.0,
            lifetime_min: 10.0,
            lifetime_max: 100.0,
            reversible: true,
        }
    }
}

impl TestModelParams {
    pub fn with_nstates(nstates: usize) -> Self {
        Self {
            nstates,
            ..Default::default()
        }
    }

    fn check(&self) -> Result<()> {
        if self.nstates == 0 {
            return Err(BhmmError::InvalidInput("nstates must be at least 1".to_string()));
        }
        if !(self.lifetime_min >= 1.0 && self.lifetime_max >= self.lifetime_min) {
            return Err(BhmmError::InvalidInput(
                "lifetimes must satisfy 1 <= lifetime_min <= lifetime_max".to_string(),
            ));
        }
        if !(self.sigma_min > 0.0 && self.sigma_max >= self.sigma_min) {
            return Err(BhmmError::InvalidInput(
                "sigmas must satisfy 0 < sigma_min <= sigma_max".to_string(),
            ));
        }
        if !(self.omin.is_finite() && self.omax.is_finite() && self.omax >= self.omin) {
            return Err(BhmmError::InvalidInput(
                "emission range must satisfy omin <= omax".to_string(),
            ));
        }
        Ok(())
    }
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![lo];
    }
    (0..n)
        .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
        .collect()
}

fn geomspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    linspace(lo.ln(), hi.ln(), n).into_iter().map(f64::exp).collect()
}

/// Transition matrix whose state `i` has mean lifetime `lifetimes[i]` steps.
///
/// Leaving probability is spread evenly over the other states; when
/// `reversible` is set the flux matrix is symmetrized, which keeps the
/// diagonal and the stationary distribution.
pub fn transition_matrix_from_lifetimes(lifetimes: &[f64], reversible: bool) -> Vec<Vec<f64>> {
    let n = lifetimes.len();
    if n == 1 {
        return vec![vec![1.0]];
    }
    let a: Vec<Vec<f64>> = lifetimes
        .iter()
        .enumerate()
        .map(|(i, tau)| {
            let stay = (-1.0 / tau).exp();
            let leave = (1.0 - stay) / (n - 1) as f64;
            (0..n).map(|j| if i == j { stay } else { leave }).collect()
        })
        .collect();
    if !reversible {
        return a;
    }

    let pi = msm::stationary_distribution(&a);
    (0..n)
        .map(|i| {
            let mut row: Vec<f64> = (0..n)
                .map(|j| 0.5 * (pi[i] * a[i][j] + pi[j] * a[j][i]))
                .collect();
            bhmm_math::normalize(&mut row);
            row
        })
        .collect()
}

/// Gaussian or discrete test model with the given shape.
///
/// Discrete models use `nsymbols` symbols (default `2 * nstates`), each
/// state emitting a discretized bump centred on its own block of symbols.
pub fn dalton_model(
    params: &TestModelParams,
    output: OutputModelType,
    nsymbols: Option<usize>,
) -> Result<Hmm> {
    params.check()?;
    let n = params.nstates;
    let lifetimes = geomspace(params.lifetime_max, params.lifetime_min, n);
    let a = transition_matrix_from_lifetimes(&lifetimes, params.reversible);
    let pi = msm::stationary_distribution(&a);

    let emissions = match output {
        OutputModelType::Gaussian => EmissionModel::Gaussian(GaussianOutputModel::new(
            linspace(params.omin, params.omax, n),
            linspace(params.sigma_min, params.sigma_max, n),
        )?),
        OutputModelType::Discrete => {
            EmissionModel::Discrete(discrete_emissions(n, nsymbols.unwrap_or(2 * n))?)
        }
    };
    Hmm::new(pi, a, emissions)
}

fn discrete_emissions(nstates: usize, nsymbols: usize) -> Result<DiscreteOutputModel> {
    if nsymbols == 0 {
        return Err(BhmmError::InvalidInput("nsymbols must be at least 1".to_string()));
    }
    let width = (nsymbols as f64 / nstates as f64).max(1.0);
    let rows = (0..nstates)
        .map(|i| {
            let centre = (i as f64 + 0.5) * nsymbols as f64 / nstates as f64 - 0.5;
            let mut row: Vec<f64> = (0..nsymbols)
                .map(|k| (-0.5 * ((k as f64 - centre) / width).powi(2)).exp())
                .collect();
            bhmm_math::normalize(&mut row);
            row
        })
        .collect();
    DiscreteOutputModel::new(rows)
}

/// Observations and hidden paths simulated from a known model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticDataset {
    pub observations: Vec<Vec<f64>>,
    pub hidden_states: Vec<Vec<usize>>,
    pub model: Hmm,
}

/// Simulate `ntrajectories` trajectories of `length` steps from `model`.
pub fn generate_synthetic_dataset(
    model: &Hmm,
    ntrajectories: usize,
    length: usize,
    rng: &mut dyn RngCore,
) -> Result<SyntheticDataset> {
    let (observations, hidden_states) =
        model.generate_synthetic_observation_trajectories(ntrajectories, length, rng)?;
    let mut model = model.clone();
    model.set_hidden_state_trajectories(None);
    Ok(SyntheticDataset {
        observations,
        hidden_states,
        model,
    })
}
