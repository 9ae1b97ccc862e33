//! Log-domain kernel.
//!
//! Same recursions as the scaled kernel, carried out on logarithms with
//! `log_sum_exp`. Emissions arrive as log densities, so an observation
//! hundreds of standard deviations from every mean still has a finite
//! weight. Results are exponentiated back into normalized probability space
//! before being written out.

use bhmm_math::{log_normalize, log_sum_exp};

use super::HiddenKernel;
use crate::error::{BhmmError, Result};

/// Log-space forward/backward kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogKernel;

impl HiddenKernel for LogKernel {
    fn name(&self) -> &'static str {
        "log"
    }

    fn log_emissions(&self) -> bool {
        true
    }

    fn forward(
        &self,
        a: &[Vec<f64>],
        pobs: &[f64],
        pi: &[f64],
        len: usize,
        alpha: &mut [f64],
    ) -> Result<f64> {
        let n = a.len();
        let log_a = log_matrix(a);
        let mut prev = vec![0.0; n];
        let mut row = vec![0.0; n];
        let mut terms = vec![0.0; n];
        let mut log_likelihood = 0.0;

        for t in 0..len {
            for j in 0..n {
                let log_prior = if t == 0 {
                    pi[j].ln()
                } else {
                    for i in 0..n {
                        terms[i] = prev[i] + log_a[i][j];
                    }
                    log_sum_exp(&terms)
                };
                row[j] = log_prior + pobs[t * n + j];
            }
            let log_scale = log_normalize(&mut row);
            if !log_scale.is_finite() {
                return Err(BhmmError::ForwardUnderflow { time: t });
            }
            log_likelihood += log_scale;
            for (out, v) in alpha[t * n..(t + 1) * n].iter_mut().zip(&row) {
                *out = v.exp();
            }
            std::mem::swap(&mut prev, &mut row);
        }
        Ok(log_likelihood)
    }

    fn backward(&self, a: &[Vec<f64>], pobs: &[f64], len: usize, beta: &mut [f64]) -> Result<()> {
        let n = a.len();
        if len == 0 {
            return Ok(());
        }
        let log_a = log_matrix(a);
        let mut next = vec![-(n as f64).ln(); n];
        let mut row = vec![0.0; n];
        let mut terms = vec![0.0; n];
        beta[(len - 1) * n..len * n].fill(1.0 / n as f64);

        for t in (0..len - 1).rev() {
            for i in 0..n {
                for j in 0..n {
                    terms[j] = log_a[i][j] + pobs[(t + 1) * n + j] + next[j];
                }
                row[i] = log_sum_exp(&terms);
            }
            if !log_normalize(&mut row).is_finite() {
                return Err(BhmmError::ForwardUnderflow { time: t });
            }
            for (out, v) in beta[t * n..(t + 1) * n].iter_mut().zip(&row) {
                *out = v.exp();
            }
            std::mem::swap(&mut next, &mut row);
        }
        Ok(())
    }
}

fn log_matrix(a: &[Vec<f64>]) -> Vec<Vec<f64>> {
    a.iter()
        .map(|row| row.iter().map(|p| p.ln()).collect())
        .collect()
}
