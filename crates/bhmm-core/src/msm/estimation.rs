//! Maximum-likelihood transition matrices from (possibly fractional) counts.

use crate::error::Result;
use crate::msm::analysis::validate_count_matrix;

const MAX_ITERATIONS: usize = 10_000;
const CONVERGENCE: f64 = 1e-12;

/// Maximum-likelihood transition matrix for `counts`.
///
/// Non-reversible: rows are normalized. Reversible: the symmetric flux
/// matrix `X` is found by the fixed-point iteration
/// `x_ij = (c_ij + c_ji) / (c_i / x_i + c_j / x_j)` and rows are normalized
/// afterwards. States without any counts get an identity row in both cases.
pub fn estimate_transition_matrix(counts: &[Vec<f64>], reversible: bool) -> Result<Vec<Vec<f64>>> {
    let n = counts.len();
    validate_count_matrix(counts, n)?;
    if reversible {
        Ok(estimate_reversible(counts))
    } else {
        Ok(estimate_nonreversible(counts))
    }
}

fn estimate_nonreversible(counts: &[Vec<f64>]) -> Vec<Vec<f64>> {
    counts
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut out = row.clone();
            let total = bhmm_math::normalize(&mut out);
            if total > 0.0 && total.is_finite() {
                out
            } else {
                identity_row(row.len(), i)
            }
        })
        .collect()
}

fn estimate_reversible(counts: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = counts.len();
    let row_counts: Vec<f64> = counts.iter().map(|r| r.iter().sum()).collect();
    let mut x: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| counts[i][j] + counts[j][i]).collect())
        .collect();

    for _ in 0..MAX_ITERATIONS {
        let sums: Vec<f64> = x.iter().map(|r| r.iter().sum()).collect();
        let mut change: f64 = 0.0;
        for i in 0..n {
            for j in i..n {
                let numerator = counts[i][j] + counts[j][i];
                let mut denominator = 0.0;
                if sums[i] > 0.0 {
                    denominator += row_counts[i] / sums[i];
                }
                if sums[j] > 0.0 {
                    denominator += row_counts[j] / sums[j];
                }
                let value = if numerator > 0.0 && denominator > 0.0 {
                    numerator / denominator
                } else {
                    0.0
                };
                change = change.max((value - x[i][j]).abs());
                x[i][j] = value;
                x[j][i] = value;
            }
        }
        let total: f64 = x.iter().flatten().sum();
        if total > 0.0 {
            for v in x.iter_mut().flatten() {
                *v /= total;
            }
        }
        if change < CONVERGENCE {
            break;
        }
    }

    x.into_iter()
        .enumerate()
        .map(|(i, mut row)| {
            let total = bhmm_math::normalize(&mut row);
            if total > 0.0 && total.is_finite() {
                row
            } else {
                identity_row(n, i)
            }
        })
        .collect()
}

fn identity_row(n: usize, i: usize) -> Vec<f64> {
    let mut row = vec![0.0; n];
    row[i] = 1.0;
    row
}
