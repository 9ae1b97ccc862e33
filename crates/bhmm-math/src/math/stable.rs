//! Log-domain and scaling helpers shared by the forward-backward kernels.

/// ln(sqrt(2π))
pub const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// ln Σ exp(v), shifted by the maximum so large magnitudes do not overflow.
///
/// Empty input and all-`-inf` input give `-inf`. NaN propagates.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Shift log-weights so they exponentiate to a distribution and return the
/// shift. Rows with no finite mass are left as they are.
pub fn log_normalize(values: &mut [f64]) -> f64 {
    let lse = log_sum_exp(values);
    if lse.is_finite() {
        values.iter_mut().for_each(|v| *v -= lse);
    }
    lse
}

/// Divide non-negative weights by their sum and return the sum.
///
/// A sum that is zero, negative or non-finite leaves the slice untouched.
/// The forward kernels treat that case as underflow.
pub fn normalize(values: &mut [f64]) -> f64 {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        values.iter_mut().for_each(|v| *v /= sum);
    }
    sum
}
