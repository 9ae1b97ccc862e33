//! Fuzz target for transition matrix sampling.
//!
//! Any count matrix is either rejected or yields a row-stochastic,
//! non-negative matrix, in both reversible and non-reversible modes.

#![no_main]

use arbitrary::Arbitrary;
use bhmm_core::msm::{is_row_stochastic, TransitionMatrixSampler};
use libfuzzer_sys::fuzz_target;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Arbitrary)]
struct Input {
    reversible: bool,
    steps: u8,
    seed: u64,
    nstates: u8,
    counts: Vec<f64>,
}

fuzz_target!(|input: Input| {
    let n = (input.nstates % 6) as usize + 1;
    if input.counts.len() < n * n {
        return;
    }
    // Transition counts come from path lengths; astronomically large values
    // are out of scope.
    if input.counts[..n * n].iter().any(|c| c.abs() > 1e12) {
        return;
    }
    let counts: Vec<Vec<f64>> = input.counts[..n * n].chunks(n).map(|r| r.to_vec()).collect();
    let steps = (input.steps % 16) as usize + 1;
    let Ok(sampler) = TransitionMatrixSampler::new(input.reversible, steps, 0.0) else {
        return;
    };
    let mut rng = StdRng::seed_from_u64(input.seed);
    if let Ok(a) = sampler.sample(&counts, &mut rng) {
        assert!(is_row_stochastic(&a, 1e-9), "{:?} -> {:?}", counts, a);
    }
});
