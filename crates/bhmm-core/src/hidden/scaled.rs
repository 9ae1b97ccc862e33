//! Probability-space kernel with per-step rescaling.

use super::HiddenKernel;
use crate::error::{BhmmError, Result};

/// Reference kernel: forward/backward recursions in probability space,
/// rescaled to unit mass at every step.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaledKernel;

impl HiddenKernel for ScaledKernel {
    fn name(&self) -> &'static str {
        "scaled"
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
        let mut log_likelihood = 0.0;
        for t in 0..len {
            let (done, rest) = alpha.split_at_mut(t * n);
            let row = &mut rest[..n];
            if t == 0 {
                for j in 0..n {
                    row[j] = pi[j] * pobs[j];
                }
            } else {
                let prev = &done[(t - 1) * n..];
                for j in 0..n {
                    let mut acc = 0.0;
                    for i in 0..n {
                        acc += prev[i] * a[i][j];
                    }
                    row[j] = acc * pobs[t * n + j];
                }
            }
            let scale = bhmm_math::normalize(row);
            if scale <= 0.0 || !scale.is_finite() {
                return Err(BhmmError::ForwardUnderflow { time: t });
            }
            log_likelihood += scale.ln();
        }
        Ok(log_likelihood)
    }

    fn backward(&self, a: &[Vec<f64>], pobs: &[f64], len: usize, beta: &mut [f64]) -> Result<()> {
        let n = a.len();
        if len == 0 {
            return Ok(());
        }
        let last = &mut beta[(len - 1) * n..len * n];
        last.fill(1.0 / n as f64);

        for t in (0..len - 1).rev() {
            let (head, tail) = beta.split_at_mut((t + 1) * n);
            let next = &tail[..n];
            let row = &mut head[t * n..];
            for i in 0..n {
                let mut acc = 0.0;
                for j in 0..n {
                    acc += a[i][j] * pobs[(t + 1) * n + j] * next[j];
                }
                row[i] = acc;
            }
            let scale = bhmm_math::normalize(row);
            if scale <= 0.0 || !scale.is_finite() {
                return Err(BhmmError::ForwardUnderflow { time: t });
            }
        }
        Ok(())
    }
}
