//! Hidden-state path inference.
//!
//! A [`HiddenKernel`] runs the forward/backward recursions of an HMM over a
//! single trajectory and draws hidden paths from the resulting posterior.
//! Two interchangeable kernels are provided:
//!
//! - [`ScaledKernel`]: probability-space recursion, rescaled at every step.
//! - [`LogKernel`]: the same recursion carried out in log space.
//!
//! The scaled kernel consumes emission densities, the log kernel consumes
//! log densities straight from [`OutputModel::log_p_obs`], so observations
//! far out in every state's tail keep a finite likelihood. Use
//! [`HiddenKernel::emissions`] to fill `pobs` in the right domain.
//!
//! Both write *normalized* forward variables (each row of `alpha` sums to 1)
//! and report the log-likelihood as the sum of the log normalizers, so the
//! downstream path sampler is shared and behaves identically for both.
//!
//! All matrices are flat row-major `len × nstates` slices held in a
//! [`Workspace`] owned by the caller.

mod log;
mod scaled;

pub use self::log::LogKernel;
pub use self::scaled::ScaledKernel;

use rand::RngCore;

use crate::config::KernelKind;
use crate::error::{BhmmError, Result};
use crate::output::OutputModel;

fn log_emission(log_domain: bool, value: f64) -> f64 {
    if log_domain {
        value
    } else {
        value.ln()
    }
}

/// Forward/backward kernel over one trajectory.
///
/// `a` is the row-stochastic transition matrix, `pobs` the `len × nstates`
/// emission matrix (densities, or log densities when [`Self::log_emissions`]
/// is true), `pi` the initial distribution.
pub trait HiddenKernel: Send + Sync + std::fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether `pobs` holds log emission densities.
    fn log_emissions(&self) -> bool {
        false
    }

    /// Evaluate `model` on `observations` into `pobs`, in the domain this
    /// kernel reads.
    fn emissions(&self, model: &dyn OutputModel, observations: &[f64], pobs: &mut [f64]) {
        if self.log_emissions() {
            model.log_p_obs(observations, pobs);
        } else {
            model.p_obs(observations, pobs);
        }
    }

    /// Fill `alpha[..len * n]` with normalized forward variables and return
    /// the log-likelihood of the trajectory.
    ///
    /// Fails with [`BhmmError::ForwardUnderflow`] at the first step whose
    /// normalizer is zero or non-finite.
    fn forward(
        &self,
        a: &[Vec<f64>],
        pobs: &[f64],
        pi: &[f64],
        len: usize,
        alpha: &mut [f64],
    ) -> Result<f64>;

    /// Fill `beta[..len * n]` with backward variables, normalized per step.
    fn backward(&self, a: &[Vec<f64>], pobs: &[f64], len: usize, beta: &mut [f64]) -> Result<()>;

    /// Posterior state probabilities `gamma[t, i] ∝ alpha[t, i] * beta[t, i]`.
    fn state_probabilities(
        &self,
        alpha: &[f64],
        beta: &[f64],
        nstates: usize,
        len: usize,
        gamma: &mut [f64],
    ) {
        for t in 0..len {
            let row = t * nstates..(t + 1) * nstates;
            let g = &mut gamma[row.clone()];
            for ((g, &a), &b) in g.iter_mut().zip(&alpha[row.clone()]).zip(&beta[row]) {
                *g = a * b;
            }
            bhmm_math::normalize(g);
        }
    }

    /// Expected transition counts `Σ_t ξ_t(i, j)` over the trajectory.
    fn transition_counts(
        &self,
        alpha: &[f64],
        beta: &[f64],
        a: &[Vec<f64>],
        pobs: &[f64],
        len: usize,
    ) -> Vec<Vec<f64>> {
        let n = a.len();
        let log_domain = self.log_emissions();
        let mut counts = vec![vec![0.0; n]; n];
        let mut xi = vec![0.0; n * n];
        let mut emit = vec![0.0; n];
        for t in 0..len.saturating_sub(1) {
            let next = (t + 1) * n;
            // ξ is normalized per step, so emissions only matter up to a
            // common factor.
            for (j, e) in emit.iter_mut().enumerate() {
                *e = log_emission(log_domain, pobs[next + j]);
            }
            let shift = emit.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if !shift.is_finite() {
                continue;
            }
            emit.iter_mut().for_each(|e| *e = (*e - shift).exp());
            for i in 0..n {
                let ai = alpha[t * n + i];
                for j in 0..n {
                    xi[i * n + j] = ai * a[i][j] * emit[j] * beta[next + j];
                }
            }
            let total = bhmm_math::normalize(&mut xi);
            if total <= 0.0 || !total.is_finite() {
                continue;
            }
            for i in 0..n {
                for j in 0..n {
                    counts[i][j] += xi[i * n + j];
                }
            }
        }
        counts
    }

    /// Most likely hidden path (first state wins ties).
    fn viterbi(
        &self,
        a: &[Vec<f64>],
        pobs: &[f64],
        pi: &[f64],
        len: usize,
    ) -> Result<Vec<usize>> {
        let n = a.len();
        if len == 0 {
            return Ok(Vec::new());
        }
        let log_domain = self.log_emissions();
        let log_a: Vec<Vec<f64>> = a
            .iter()
            .map(|row| row.iter().map(|p| p.ln()).collect())
            .collect();

        let mut delta: Vec<f64> = (0..n)
            .map(|i| pi[i].ln() + log_emission(log_domain, pobs[i]))
            .collect();
        let mut next = vec![0.0; n];
        let mut backpointers = vec![0usize; len * n];

        for t in 1..len {
            for j in 0..n {
                let mut best = f64::NEG_INFINITY;
                let mut arg = 0;
                for i in 0..n {
                    let v = delta[i] + log_a[i][j];
                    if v > best {
                        best = v;
                        arg = i;
                    }
                }
                next[j] = best + log_emission(log_domain, pobs[t * n + j]);
                backpointers[t * n + j] = arg;
            }
            std::mem::swap(&mut delta, &mut next);
        }

        let last = match bhmm_math::argmax(&delta) {
            Some(s) if delta[s] > f64::NEG_INFINITY => s,
            _ => return Err(BhmmError::ForwardUnderflow { time: len - 1 }),
        };
        let mut path = vec![0usize; len];
        path[len - 1] = last;
        for t in (1..len).rev() {
            path[t - 1] = backpointers[t * n + path[t]];
        }
        Ok(path)
    }

    /// Draw a hidden path from `P(S | A, π, observations)` by backward
    /// sampling over normalized forward variables.
    fn sample_path(
        &self,
        alpha: &[f64],
        a: &[Vec<f64>],
        len: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<usize>> {
        let n = a.len();
        if len == 0 {
            return Ok(Vec::new());
        }
        let mut path = vec![0usize; len];
        path[len - 1] = bhmm_math::sample_categorical(&alpha[(len - 1) * n..len * n], rng)
            .ok_or(BhmmError::ForwardUnderflow { time: len - 1 })?;

        let mut weights = vec![0.0; n];
        for t in (0..len - 1).rev() {
            let following = path[t + 1];
            for (s, w) in weights.iter_mut().enumerate() {
                *w = alpha[t * n + s] * a[s][following];
            }
            path[t] = bhmm_math::sample_categorical(&weights, rng)
                .ok_or(BhmmError::ForwardUnderflow { time: t })?;
        }
        Ok(path)
    }
}

/// Construct the kernel selected by configuration.
pub fn kernel_for(kind: KernelKind) -> Box<dyn HiddenKernel> {
    match kind {
        KernelKind::Scaled => Box::new(ScaledKernel),
        KernelKind::Log => Box::new(LogKernel),
    }
}

/// Scratch buffers for the hidden-path kernels, sized to the longest
/// trajectory.
#[derive(Debug, Clone)]
pub struct Workspace {
    nstates: usize,
    capacity: usize,
    alpha: Vec<f64>,
    beta: Vec<f64>,
    pobs: Vec<f64>,
    gamma: Vec<f64>,
}

/// Disjoint mutable views into a [`Workspace`], each `len × nstates`.
#[derive(Debug)]
pub struct Buffers<'a> {
    pub alpha: &'a mut [f64],
    pub beta: &'a mut [f64],
    pub pobs: &'a mut [f64],
    pub gamma: &'a mut [f64],
}

impl Workspace {
    /// Allocate buffers for trajectories of up to `max_len` steps.
    pub fn new(max_len: usize, nstates: usize) -> Self {
        let size = max_len * nstates;
        Self {
            nstates,
            capacity: max_len,
            alpha: vec![0.0; size],
            beta: vec![0.0; size],
            pobs: vec![0.0; size],
            gamma: vec![0.0; size],
        }
    }

    /// Borrow the first `len` rows of every buffer.
    pub fn buffers(&mut self, len: usize) -> Result<Buffers<'_>> {
        if len > self.capacity {
            return Err(BhmmError::InvalidInput(format!(
                "trajectory of length {} exceeds workspace capacity {}",
                len, self.capacity
            )));
        }
        let size = len * self.nstates;
        Ok(Buffers {
            alpha: &mut self.alpha[..size],
            beta: &mut self.beta[..size],
            pobs: &mut self.pobs[..size],
            gamma: &mut self.gamma[..size],
        })
    }
}
