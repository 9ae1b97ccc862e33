//! Univariate normal density.
//!
//! Parameterized by mean `mu` and standard deviation `sigma` (σ > 0).

use super::stable::LOG_SQRT_2PI;

/// Log of the normal PDF at x.
///
/// Returns NaN for non-positive or NaN `sigma`, or NaN inputs.
pub fn normal_log_pdf(x: f64, mu: f64, sigma: f64) -> f64 {
    if x.is_nan() || mu.is_nan() || sigma.is_nan() {
        return f64::NAN;
    }
    if sigma <= 0.0 {
        return f64::NAN;
    }
    if x.is_infinite() {
        return f64::NEG_INFINITY;
    }
    let z = (x - mu) / sigma;
    -0.5 * z * z - sigma.ln() - LOG_SQRT_2PI
}

/// Normal PDF at x.
///
/// Far tails underflow to an exact 0.0, which the forward recursion treats as
/// a hard zero.
pub fn normal_pdf(x: f64, mu: f64, sigma: f64) -> f64 {
    let log_pdf = normal_log_pdf(x, mu, sigma);
    if log_pdf.is_nan() {
        return f64::NAN;
    }
    log_pdf.exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_normal_peak() {
        let p = normal_pdf(0.0, 0.0, 1.0);
        let expected = 1.0 / (2.0 * std::f64::consts::PI).sqrt();
        assert!((p - expected).abs() < 1e-14);
    }

    #[test]
    fn log_pdf_scale_shift() {
        // N(x; mu, sigma) = N((x - mu) / sigma; 0, 1) / sigma
        let a = normal_log_pdf(3.0, 1.0, 2.0);
        let b = normal_log_pdf(1.0, 0.0, 1.0) - 2.0f64.ln();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn invalid_sigma_is_nan() {
        assert!(normal_log_pdf(0.0, 0.0, 0.0).is_nan());
        assert!(normal_log_pdf(0.0, 0.0, -1.0).is_nan());
        assert!(normal_pdf(0.0, 0.0, f64::NAN).is_nan());
    }

    #[test]
    fn far_tail_underflows_to_zero() {
        assert_eq!(normal_pdf(1e6, 0.0, 1.0), 0.0);
        assert_eq!(normal_pdf(f64::INFINITY, 0.0, 1.0), 0.0);
    }
}
