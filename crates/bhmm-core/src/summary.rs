//! Posterior summaries over a collection of model snapshots.

use serde::Serialize;

use crate::error::{BhmmError, Result};
use crate::model::ModelSnapshot;
use crate::output::EmissionModel;

/// Default credible mass for interval estimates.
pub const DEFAULT_CREDIBLE_MASS: f64 = 0.95;

/// Sample mean, standard deviation and equal-tailed credible interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    pub mean: f64,
    pub std: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Estimate {
    /// Summarize `values`; `mass` is the probability inside `[lower, upper]`.
    pub fn from_samples(values: &[f64], mass: f64) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if values.len() > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let tail = (1.0 - mass) / 2.0;
        Some(Self {
            mean,
            std,
            lower: quantile(&sorted, tail),
            upper: quantile(&sorted, 1.0 - tail),
        })
    }
}

/// Linear-interpolated quantile of sorted data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Emission parameter estimates, by model family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputSummary {
    Gaussian {
        means: Vec<Estimate>,
        sigmas: Vec<Estimate>,
    },
    Discrete {
        probabilities: Vec<Vec<Estimate>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PosteriorSummary {
    pub nsamples: usize,
    pub credible_mass: f64,
    pub log_likelihood: Estimate,
    pub transition_matrix: Vec<Vec<Estimate>>,
    pub stationary_distribution: Vec<Estimate>,
    pub lifetimes: Vec<Estimate>,
    pub output_model: OutputSummary,
}

fn collect<F>(samples: &[ModelSnapshot], mass: f64, f: F) -> Result<Estimate>
where
    F: Fn(&ModelSnapshot) -> f64,
{
    let values: Vec<f64> = samples.iter().map(f).collect();
    Estimate::from_samples(&values, mass)
        .ok_or_else(|| BhmmError::InvalidInput("no samples to summarize".to_string()))
}

/// Summarize snapshots that share a state count and emission family.
///
/// No relabeling is done, so states must not switch identity across the
/// chain for the per-state estimates to be meaningful.
pub fn summarize(samples: &[ModelSnapshot], mass: f64) -> Result<PosteriorSummary> {
    let first = samples
        .first()
        .ok_or_else(|| BhmmError::InvalidInput("no samples to summarize".to_string()))?;
    if !(mass > 0.0 && mass < 1.0) {
        return Err(BhmmError::InvalidInput(format!(
            "credible mass must lie in (0, 1), got {}",
            mass
        )));
    }
    let n = first.nstates();
    let model_type = first.output_model().model_type();
    if samples
        .iter()
        .any(|s| s.nstates() != n || s.output_model().model_type() != model_type)
    {
        return Err(BhmmError::InvalidInput(
            "samples disagree on state count or emission type".to_string(),
        ));
    }

    let stationary: Vec<Vec<f64>> = samples.iter().map(|s| s.stationary_distribution()).collect();
    let lifetimes: Vec<Vec<f64>> = samples
        .iter()
        .map(|s| crate::msm::lifetimes(s.transition_matrix(), 1.0))
        .collect();

    let mut transition_matrix = Vec::with_capacity(n);
    for i in 0..n {
        let row = (0..n)
            .map(|j| collect(samples, mass, |s| s.transition_matrix()[i][j]))
            .collect::<Result<Vec<_>>>()?;
        transition_matrix.push(row);
    }
    let stationary_distribution = (0..n)
        .map(|i| {
            let values: Vec<f64> = stationary.iter().map(|p| p[i]).collect();
            collect_values(&values, mass)
        })
        .collect::<Result<Vec<_>>>()?;
    let lifetimes = (0..n)
        .map(|i| {
            let values: Vec<f64> = lifetimes.iter().map(|t| t[i]).collect();
            collect_values(&values, mass)
        })
        .collect::<Result<Vec<_>>>()?;

    let output_model = match first.output_model() {
        EmissionModel::Gaussian(_) => {
            let param = |i: usize, mean: bool| {
                collect(samples, mass, |s| match s.output_model() {
                    EmissionModel::Gaussian(g) if mean => g.means()[i],
                    EmissionModel::Gaussian(g) => g.sigmas()[i],
                    EmissionModel::Discrete(_) => f64::NAN,
                })
            };
            OutputSummary::Gaussian {
                means: (0..n).map(|i| param(i, true)).collect::<Result<_>>()?,
                sigmas: (0..n).map(|i| param(i, false)).collect::<Result<_>>()?,
            }
        }
        EmissionModel::Discrete(d) => {
            let m = d.nsymbols();
            let mut probabilities = Vec::with_capacity(n);
            for i in 0..n {
                let row = (0..m)
                    .map(|k| {
                        collect(samples, mass, |s| match s.output_model() {
                            EmissionModel::Discrete(d) => {
                                d.probabilities()[i].get(k).copied().unwrap_or(f64::NAN)
                            }
                            EmissionModel::Gaussian(_) => f64::NAN,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                probabilities.push(row);
            }
            OutputSummary::Discrete { probabilities }
        }
    };

    Ok(PosteriorSummary {
        nsamples: samples.len(),
        credible_mass: mass,
        log_likelihood: collect(samples, mass, |s| s.log_likelihood())?,
        transition_matrix,
        stationary_distribution,
        lifetimes,
        output_model,
    })
}

fn collect_values(values: &[f64], mass: f64) -> Result<Estimate> {
    Estimate::from_samples(values, mass)
        .ok_or_else(|| BhmmError::InvalidInput("no samples to summarize".to_string()))
}
