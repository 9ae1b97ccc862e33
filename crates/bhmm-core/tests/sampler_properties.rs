//! Property-based tests for the transition-matrix sampler and the Gibbs
//! sampler.
//!
//! Uses proptest to check structural guarantees across random count
//! matrices and chain settings.

use bhmm_core::config::SamplerConfig;
use bhmm_core::estimators::BayesianHmmSampler;
use bhmm_core::model::Hmm;
use bhmm_core::msm::{self, TransitionMatrixSampler};
use bhmm_core::output::{EmissionModel, GaussianOutputModel};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Square count matrices with some zero entries.
fn count_matrix(max_states: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1..=max_states).prop_flat_map(|n| {
        prop::collection::vec(
            prop::collection::vec(prop_oneof![Just(0.0), 0.0..40.0f64], n),
            n,
        )
    })
}

/// Square count matrices with every entry positive (connected chains).
fn dense_count_matrix(max_states: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
    (2..=max_states).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(1.0..40.0f64, n), n)
    })
}

fn two_state_model() -> Hmm {
    Hmm::new(
        vec![0.5, 0.5],
        vec![vec![0.8, 0.2], vec![0.3, 0.7]],
        EmissionModel::Gaussian(GaussianOutputModel::new(vec![-1.0, 1.0], vec![0.7, 0.7]).unwrap()),
    )
    .unwrap()
}

// ============================================================================
// Transition matrix sampler
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Non-reversible samples are row-stochastic and non-negative.
    #[test]
    fn nonreversible_samples_are_stochastic(counts in count_matrix(5), seed in any::<u64>()) {
        let sampler = TransitionMatrixSampler::new(false, 1, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let a = sampler.sample(&counts, &mut rng).unwrap();
        prop_assert!(msm::is_row_stochastic(&a, 1e-9), "{:?}", a);
    }

    /// Zero counts stay exactly zero in rows that have any counts.
    #[test]
    fn nonreversible_respects_sparsity(counts in count_matrix(4), seed in any::<u64>()) {
        let sampler = TransitionMatrixSampler::new(false, 1, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let a = sampler.sample(&counts, &mut rng).unwrap();
        for (row_c, row_a) in counts.iter().zip(&a) {
            if row_c.iter().sum::<f64>() > 0.0 {
                for (c, p) in row_c.iter().zip(row_a) {
                    if *c == 0.0 {
                        prop_assert_eq!(*p, 0.0);
                    }
                }
            }
        }
    }

    /// Reversible samples are row-stochastic even with disconnected states.
    #[test]
    fn reversible_samples_are_stochastic(counts in count_matrix(4), seed in any::<u64>()) {
        let sampler = TransitionMatrixSampler::new(true, 10, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let a = sampler.sample(&counts, &mut rng).unwrap();
        prop_assert!(msm::is_row_stochastic(&a, 1e-9), "{:?}", a);
    }

    /// Connected reversible samples satisfy detailed balance.
    #[test]
    fn reversible_detailed_balance(counts in dense_count_matrix(4), seed in any::<u64>()) {
        let sampler = TransitionMatrixSampler::new(true, 20, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let a = sampler.sample(&counts, &mut rng).unwrap();
        let pi = msm::stationary_distribution(&a);
        for i in 0..a.len() {
            for j in 0..a.len() {
                prop_assert!((pi[i] * a[i][j] - pi[j] * a[j][i]).abs() < 1e-9);
            }
        }
    }

    /// Same seed, same draw.
    #[test]
    fn sampler_is_deterministic(counts in count_matrix(4), seed in any::<u64>(), reversible in any::<bool>()) {
        let sampler = TransitionMatrixSampler::new(reversible, 5, 0.0).unwrap();
        let a = sampler.sample(&counts, &mut StdRng::seed_from_u64(seed)).unwrap();
        let b = sampler.sample(&counts, &mut StdRng::seed_from_u64(seed)).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Negative or non-finite counts are rejected.
    #[test]
    fn invalid_counts_rejected(bad in prop_oneof![Just(-1.0), Just(f64::NAN), Just(f64::INFINITY)]) {
        let sampler = TransitionMatrixSampler::new(false, 1, 0.0).unwrap();
        let counts = vec![vec![1.0, bad], vec![2.0, 3.0]];
        prop_assert!(sampler.sample(&counts, &mut StdRng::seed_from_u64(0)).is_err());
    }
}

// ============================================================================
// Gibbs sampler
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// `sample(N)` returns exactly N snapshots with valid paths.
    #[test]
    fn sample_count_and_labels(
        nsamples in 0usize..4,
        nburn in 0usize..3,
        nthin in 1usize..3,
        seed in any::<u64>(),
        lengths in prop::collection::vec(10usize..40, 1..3),
    ) {
        let model = two_state_model();
        let mut rng = StdRng::seed_from_u64(seed);
        let observations: Vec<Vec<f64>> = lengths
            .iter()
            .map(|&len| model.generate_synthetic_observation_trajectory(len, &mut rng).unwrap().0)
            .collect();
        let config = SamplerConfig::with_nstates(2).sampling_steps(5).seed(seed);
        let mut sampler = BayesianHmmSampler::new(observations, config, Some(model)).unwrap();
        let samples = sampler.sample(nsamples, nburn, nthin, true).unwrap();

        prop_assert_eq!(samples.len(), nsamples);
        prop_assert_eq!(sampler.iteration(), nburn + nsamples * nthin);
        for s in &samples {
            prop_assert!(msm::is_row_stochastic(s.transition_matrix(), 1e-9));
            let paths = s.hidden_state_trajectories().unwrap();
            for (path, &len) in paths.iter().zip(&lengths) {
                prop_assert_eq!(path.len(), len);
                prop_assert!(path.iter().all(|&l| l < 2));
            }
        }
    }
}
