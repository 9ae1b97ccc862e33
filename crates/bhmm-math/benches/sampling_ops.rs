//! Criterion benchmarks for `bhmm-math`.
//!
//! Focus on the sampling kernels that run once per state per Gibbs sweep.

use bhmm_math::dirichlet::sample_dirichlet;
use bhmm_math::{log_sum_exp, sample_categorical};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn bench_sampling_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampling");
    let mut rng = StdRng::seed_from_u64(42);

    for nstates in [2usize, 4, 8, 16] {
        let alpha: Vec<f64> = (0..nstates).map(|i| 1.0 + i as f64 * 10.0).collect();
        group.bench_with_input(
            BenchmarkId::new("sample_dirichlet", nstates),
            &alpha,
            |b, alpha| {
                b.iter(|| black_box(sample_dirichlet(black_box(alpha), &mut rng)));
            },
        );

        let weights: Vec<f64> = (0..nstates).map(|i| (i + 1) as f64).collect();
        group.bench_with_input(
            BenchmarkId::new("sample_categorical", nstates),
            &weights,
            |b, weights| {
                b.iter(|| black_box(sample_categorical(black_box(weights), &mut rng)));
            },
        );

        let logs: Vec<f64> = (0..nstates).map(|i| -(i as f64) * 3.5).collect();
        group.bench_with_input(BenchmarkId::new("log_sum_exp", nstates), &logs, |b, logs| {
            b.iter(|| black_box(log_sum_exp(black_box(logs))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sampling_kernels);
criterion_main!(benches);
