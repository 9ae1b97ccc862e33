//! Markov chain analysis on dense transition and count matrices.
//!
//! Matrices are `Vec<Vec<f64>>` in row-major orientation: `a[i][j]` is the
//! probability (or count) of a transition from state `i` to state `j`.

use crate::error::{BhmmError, Result};

/// Tolerance used when checking row sums.
pub const ROW_SUM_TOLERANCE: f64 = 1e-9;

const SINGULAR_PIVOT: f64 = 1e-12;
const POWER_ITERATIONS: usize = 100_000;

/// Count transitions `s[t] -> s[t+1]` over all paths.
pub fn count_matrix(paths: &[Vec<usize>], nstates: usize) -> Result<Vec<Vec<f64>>> {
    let mut counts = vec![vec![0.0; nstates]; nstates];
    for path in paths {
        for w in path.windows(2) {
            let (from, to) = (w[0], w[1]);
            if from >= nstates || to >= nstates {
                return Err(BhmmError::InvalidInput(format!(
                    "hidden state label {} out of range for {} states",
                    from.max(to),
                    nstates
                )));
            }
            counts[from][to] += 1.0;
        }
    }
    Ok(counts)
}

/// Check that `counts` is `nstates × nstates` with finite non-negative entries.
pub fn validate_count_matrix(counts: &[Vec<f64>], nstates: usize) -> Result<()> {
    if counts.len() != nstates {
        return Err(BhmmError::InvalidCountMatrix(format!(
            "expected {} rows, got {}",
            nstates,
            counts.len()
        )));
    }
    for (i, row) in counts.iter().enumerate() {
        if row.len() != nstates {
            return Err(BhmmError::InvalidCountMatrix(format!(
                "row {} has {} columns, expected {}",
                i,
                row.len(),
                nstates
            )));
        }
        for (j, &c) in row.iter().enumerate() {
            if !c.is_finite() || c < 0.0 {
                return Err(BhmmError::InvalidCountMatrix(format!(
                    "entry ({}, {}) = {} is not a finite non-negative count",
                    i, j, c
                )));
            }
        }
    }
    Ok(())
}

/// Whether every row is non-negative and sums to 1 within `tol`.
pub fn is_row_stochastic(a: &[Vec<f64>], tol: f64) -> bool {
    a.iter().all(|row| {
        row.len() == a.len()
            && row.iter().all(|p| p.is_finite() && *p >= 0.0)
            && (row.iter().sum::<f64>() - 1.0).abs() <= tol
    })
}

/// Stationary distribution `π` with `πA = π`, `Σπ = 1`.
///
/// Solves the linear system directly; if it is singular (reducible chain)
/// falls back to power iteration on the lazy chain `(I + A) / 2`, started
/// from the uniform distribution.
pub fn stationary_distribution(a: &[Vec<f64>]) -> Vec<f64> {
    let n = a.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![1.0];
    }
    let pi = solve_stationary(a).unwrap_or_else(|| power_iteration(a));
    let mut pi: Vec<f64> = pi.into_iter().map(|p| p.max(0.0)).collect();
    let total = bhmm_math::normalize(&mut pi);
    if total <= 0.0 || !total.is_finite() {
        return vec![1.0 / n as f64; n];
    }
    pi
}

/// Gaussian elimination with partial pivoting on `(A - I)^T π = 0` with the
/// last equation replaced by `Σπ = 1`.
fn solve_stationary(a: &[Vec<f64>]) -> Option<Vec<f64>> {
    let n = a.len();
    let mut m = vec![vec![0.0; n + 1]; n];
    for i in 0..n {
        for j in 0..n {
            m[i][j] = a[j][i] - if i == j { 1.0 } else { 0.0 };
        }
    }
    for entry in m[n - 1].iter_mut() {
        *entry = 1.0;
    }

    for col in 0..n {
        let pivot = (col..n).max_by(|&x, &y| m[x][col].abs().total_cmp(&m[y][col].abs()))?;
        if m[pivot][col].abs() < SINGULAR_PIVOT {
            return None;
        }
        m.swap(col, pivot);
        for row in col + 1..n {
            let factor = m[row][col] / m[col][col];
            if factor != 0.0 {
                for k in col..=n {
                    m[row][k] -= factor * m[col][k];
                }
            }
        }
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut acc = m[i][n];
        for j in i + 1..n {
            acc -= m[i][j] * x[j];
        }
        x[i] = acc / m[i][i];
    }
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

fn power_iteration(a: &[Vec<f64>]) -> Vec<f64> {
    let n = a.len();
    let mut pi = vec![1.0 / n as f64; n];
    let mut next = vec![0.0; n];
    for _ in 0..POWER_ITERATIONS {
        for j in 0..n {
            let mut acc = 0.5 * pi[j];
            for i in 0..n {
                acc += 0.5 * pi[i] * a[i][j];
            }
            next[j] = acc;
        }
        let change: f64 = pi.iter().zip(&next).map(|(x, y)| (x - y).abs()).sum();
        std::mem::swap(&mut pi, &mut next);
        if change < 1e-15 {
            break;
        }
    }
    pi
}

/// Whether `a` satisfies detailed balance w.r.t. its stationary distribution.
pub fn is_reversible(a: &[Vec<f64>], tol: f64) -> bool {
    let pi = stationary_distribution(a);
    let n = a.len();
    for i in 0..n {
        for j in i + 1..n {
            if (pi[i] * a[i][j] - pi[j] * a[j][i]).abs() > tol {
                return false;
            }
        }
    }
    true
}

/// Weakly connected components of the graph with an edge `i - j` whenever
/// `counts[i][j] + counts[j][i] > 0`.
///
/// Components are listed in order of their smallest state; states inside a
/// component are sorted.
pub fn connected_sets(counts: &[Vec<f64>]) -> Vec<Vec<usize>> {
    let n = counts.len();
    let mut label = vec![usize::MAX; n];
    let mut sets = Vec::new();
    for start in 0..n {
        if label[start] != usize::MAX {
            continue;
        }
        let id = sets.len();
        let mut members = vec![start];
        let mut stack = vec![start];
        label[start] = id;
        while let Some(i) = stack.pop() {
            for j in 0..n {
                if label[j] == usize::MAX && counts[i][j] + counts[j][i] > 0.0 {
                    label[j] = id;
                    members.push(j);
                    stack.push(j);
                }
            }
        }
        members.sort_unstable();
        sets.push(members);
    }
    sets
}

/// Mean dwell time of each state in units of `dt`: `-dt / ln(A_ii)`.
///
/// Absorbing states have infinite lifetime; states that never self-transition
/// have lifetime zero.
pub fn lifetimes(a: &[Vec<f64>], dt: f64) -> Vec<f64> {
    a.iter()
        .enumerate()
        .map(|(i, row)| {
            let p = row[i];
            if p >= 1.0 {
                f64::INFINITY
            } else if p <= 0.0 {
                0.0
            } else {
                -dt / p.ln()
            }
        })
        .collect()
}
