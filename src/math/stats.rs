//! Small descriptive statistics over `f64` slices.
//!
//! Conventions follow the analysis: standard deviations are *sample* standard
//! deviations (denominator `n − 1`).

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (`n − 1` denominator), `None` when `n < 2`.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() as f64 - 1.0)).sqrt())
}

/// True when every value is bit-for-bit equal to the first.
///
/// A rounding-free check for zero variance: the two-pass std of a constant slice
/// is not guaranteed to come out as exactly `0.0`.
pub fn is_constant(values: &[f64]) -> bool {
    match values.first() {
        Some(first) => values.iter().all(|v| v == first),
        None => true,
    }
}

/// Copy of the finite entries of `values`.
pub fn finite_values(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}
