//! The scaled and log-domain kernels must be interchangeable.

use bhmm_core::hidden::{HiddenKernel, LogKernel, ScaledKernel};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

const TOL: f64 = 1e-9;

fn normalized(mut v: Vec<f64>) -> Vec<f64> {
    let s: f64 = v.iter().sum();
    for x in &mut v {
        *x /= s;
    }
    v
}

/// The log kernel reads emissions as log densities.
fn logs(pobs: &[f64]) -> Vec<f64> {
    pobs.iter().map(|p| p.ln()).collect()
}

/// Random HMM pieces: transition matrix, initial distribution, emissions.
fn hmm_inputs() -> impl Strategy<Value = (Vec<Vec<f64>>, Vec<f64>, Vec<f64>, usize)> {
    (1usize..=4, 1usize..=25).prop_flat_map(|(n, len)| {
        (
            prop::collection::vec(prop::collection::vec(0.01..1.0f64, n), n),
            prop::collection::vec(0.01..1.0f64, n),
            prop::collection::vec(1e-6..1.0f64, n * len),
            Just(len),
        )
            .prop_map(|(a, pi, pobs, len)| {
                (a.into_iter().map(normalized).collect(), normalized(pi), pobs, len)
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn forward_agrees((a, pi, pobs, len) in hmm_inputs()) {
        let n = a.len();
        let mut alpha_s = vec![0.0; n * len];
        let mut alpha_l = vec![0.0; n * len];
        let ll_s = ScaledKernel.forward(&a, &pobs, &pi, len, &mut alpha_s).unwrap();
        let ll_l = LogKernel.forward(&a, &logs(&pobs), &pi, len, &mut alpha_l).unwrap();
        prop_assert!((ll_s - ll_l).abs() < TOL * ll_s.abs().max(1.0), "{} vs {}", ll_s, ll_l);
        for (x, y) in alpha_s.iter().zip(&alpha_l) {
            prop_assert!((x - y).abs() < TOL);
        }
    }

    #[test]
    fn backward_and_gamma_agree((a, pi, pobs, len) in hmm_inputs()) {
        let n = a.len();
        let mut alpha = vec![0.0; n * len];
        ScaledKernel.forward(&a, &pobs, &pi, len, &mut alpha).unwrap();

        let mut beta_s = vec![0.0; n * len];
        let mut beta_l = vec![0.0; n * len];
        ScaledKernel.backward(&a, &pobs, len, &mut beta_s).unwrap();
        LogKernel.backward(&a, &logs(&pobs), len, &mut beta_l).unwrap();
        for (x, y) in beta_s.iter().zip(&beta_l) {
            prop_assert!((x - y).abs() < TOL);
        }

        let mut gamma = vec![0.0; n * len];
        ScaledKernel.state_probabilities(&alpha, &beta_s, n, len, &mut gamma);
        for row in gamma.chunks(n) {
            prop_assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn paths_agree_under_same_seed((a, pi, pobs, len) in hmm_inputs(), seed in any::<u64>()) {
        let n = a.len();
        let mut alpha_s = vec![0.0; n * len];
        let mut alpha_l = vec![0.0; n * len];
        ScaledKernel.forward(&a, &pobs, &pi, len, &mut alpha_s).unwrap();
        LogKernel.forward(&a, &logs(&pobs), &pi, len, &mut alpha_l).unwrap();

        // Equal alpha in, equal path out.
        let p1 = ScaledKernel.sample_path(&alpha_s, &a, len, &mut StdRng::seed_from_u64(seed)).unwrap();
        let p2 = LogKernel.sample_path(&alpha_s, &a, len, &mut StdRng::seed_from_u64(seed)).unwrap();
        prop_assert_eq!(&p1, &p2);
        prop_assert!(p1.iter().all(|&s| s < n));

        let v1 = ScaledKernel.viterbi(&a, &pobs, &pi, len).unwrap();
        let v2 = LogKernel.viterbi(&a, &logs(&pobs), &pi, len).unwrap();
        prop_assert_eq!(v1, v2);
    }

    #[test]
    fn transition_counts_sum_to_steps((a, pi, pobs, len) in hmm_inputs()) {
        let n = a.len();
        let mut alpha = vec![0.0; n * len];
        let mut beta = vec![0.0; n * len];
        ScaledKernel.forward(&a, &pobs, &pi, len, &mut alpha).unwrap();
        ScaledKernel.backward(&a, &pobs, len, &mut beta).unwrap();
        let xi = ScaledKernel.transition_counts(&alpha, &beta, &a, &pobs, len);
        let total: f64 = xi.iter().flatten().sum();
        prop_assert!((total - (len - 1) as f64).abs() < 1e-9);

        let xi_l = LogKernel.transition_counts(&alpha, &beta, &a, &logs(&pobs), len);
        for (x, y) in xi.iter().flatten().zip(xi_l.iter().flatten()) {
            prop_assert!((x - y).abs() < 1e-9);
        }
    }
}

#[test]
fn zero_emissions_underflow_in_both_kernels() {
    let a = vec![vec![0.5, 0.5], vec![0.5, 0.5]];
    let pi = vec![0.5, 0.5];
    let pobs = vec![0.3, 0.4, 0.0, 0.0];
    let mut alpha = vec![0.0; 4];
    for kernel in [&ScaledKernel as &dyn HiddenKernel, &LogKernel] {
        let input = if kernel.log_emissions() { logs(&pobs) } else { pobs.clone() };
        let err = kernel.forward(&a, &input, &pi, 2, &mut alpha).unwrap_err();
        assert!(matches!(err, bhmm_core::BhmmError::ForwardUnderflow { time: 1 }));
    }
}
