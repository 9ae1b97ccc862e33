//! Dirichlet draws for rows of stochastic matrices.
//!
//! A categorical row with counts `n` under a `Dir(a, …, a)` prior has
//! posterior `Dir(a + n)`. Draws normalize independent `Gamma(α_i, 1)`
//! variates. A zero concentration pins its component to exactly zero, which
//! keeps unobserved transitions out of a sampled row.

use rand::Rng;
use rand_distr::{Distribution, Gamma};

fn valid_concentration(a: f64) -> bool {
    a.is_finite() && a >= 0.0
}

/// Draw from `Dir(alpha)`; entries of `alpha` may be zero.
///
/// `None` when `alpha` is empty, holds a negative or non-finite entry, has
/// no positive entry, or every Gamma draw underflows to zero.
pub fn sample_dirichlet<R: Rng + ?Sized>(alpha: &[f64], rng: &mut R) -> Option<Vec<f64>> {
    if alpha.is_empty() || !alpha.iter().all(|&a| valid_concentration(a)) {
        return None;
    }

    let mut draws = alpha
        .iter()
        .map(|&a| {
            if a == 0.0 {
                Some(0.0)
            } else {
                Gamma::new(a, 1.0).ok().map(|g| g.sample(rng))
            }
        })
        .collect::<Option<Vec<f64>>>()?;

    let total: f64 = draws.iter().sum();
    if !(total > 0.0 && total.is_finite()) {
        return None;
    }
    draws.iter_mut().for_each(|g| *g /= total);
    Some(draws)
}

/// `E[p] = α / Σα`, or `None` when no component has positive concentration.
pub fn dirichlet_mean(alpha: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = alpha.iter().sum();
    if !(total > 0.0 && total.is_finite()) || !alpha.iter().all(|&a| valid_concentration(a)) {
        return None;
    }
    Some(alpha.iter().map(|a| a / total).collect())
}

/// Draw a categorical row from its posterior `Dir(prior + counts)`.
///
/// `prior` must be positive. If every Gamma draw underflows, which only very
/// small concentrations can cause, the posterior mean is returned instead.
pub fn sample_posterior<R: Rng + ?Sized>(
    prior: f64,
    counts: &[f64],
    rng: &mut R,
) -> Option<Vec<f64>> {
    if !(prior > 0.0 && prior.is_finite()) || !counts.iter().all(|&c| valid_concentration(c)) {
        return None;
    }
    let alpha: Vec<f64> = counts.iter().map(|c| c + prior).collect();
    sample_dirichlet(&alpha, rng).or_else(|| dirichlet_mean(&alpha))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn draws_lie_on_the_simplex() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let x = sample_dirichlet(&[0.5, 2.0, 7.0], &mut rng).unwrap();
            assert!(x.iter().all(|v| *v >= 0.0));
            assert!((x.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn posterior_mean_tracks_counts() {
        let mut rng = StdRng::seed_from_u64(5);
        let n = 20_000;
        let acc: f64 = (0..n)
            .map(|_| sample_posterior(1.0, &[1.0, 5.0], &mut rng).unwrap()[0])
            .sum();
        // Dir(2, 6) has mean 0.25 in the first component.
        assert!((acc / n as f64 - 0.25).abs() < 0.01);
    }

    #[test]
    fn zero_concentration_pins_component() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..100 {
            let x = sample_dirichlet(&[3.0, 0.0, 1.0], &mut rng).unwrap();
            assert_eq!(x[1], 0.0);
            assert!((x[0] + x[2] - 1.0).abs() < 1e-12);
        }
        let x = sample_dirichlet(&[0.0, 4.0, 0.0], &mut rng).unwrap();
        assert_eq!(x, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn invalid_parameters_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_dirichlet(&[], &mut rng).is_none());
        assert!(sample_dirichlet(&[0.0, 0.0], &mut rng).is_none());
        assert!(sample_dirichlet(&[1.0, -1.0], &mut rng).is_none());
        assert!(sample_dirichlet(&[1.0, f64::NAN], &mut rng).is_none());
        assert!(sample_posterior(0.0, &[1.0, 2.0], &mut rng).is_none());
        assert!(sample_posterior(1.0, &[1.0, -2.0], &mut rng).is_none());
        assert!(dirichlet_mean(&[0.0, 0.0]).is_none());
        assert_eq!(dirichlet_mean(&[1.0, 3.0]), Some(vec![0.25, 0.75]));
    }
}
