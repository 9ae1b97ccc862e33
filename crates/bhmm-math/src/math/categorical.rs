//! Draws from finite discrete distributions given unnormalized weights.

use rand::Rng;

/// Sample an index with probability proportional to `weights[i]`.
///
/// Zero weights are never selected. Returns `None` when the weights are
/// empty, contain a negative or NaN entry, or do not sum to a positive finite
/// value.
pub fn sample_categorical<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<usize> {
    let mut total = 0.0;
    for &w in weights {
        if w.is_nan() || w < 0.0 {
            return None;
        }
        total += w;
    }
    if total <= 0.0 || !total.is_finite() {
        return None;
    }

    let u: f64 = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (i, &w) in weights.iter().enumerate() {
        if w > 0.0 {
            cumulative += w;
            last_positive = Some(i);
            if u < cumulative {
                return Some(i);
            }
        }
    }
    // Rounding can leave u a hair above the accumulated total.
    last_positive
}

/// Index of the largest weight (first one on ties). `None` for empty input.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
