//! One-phase exponential decay.
//!
//! ```text
//! value(t) = A · exp(−k · t) + C
//! ```
//!
//! The fitter relies on two primitive operations:
//! - evaluate the model at a timestamp (fitting residuals, curve reconstruction)
//! - fill a Jacobian row `[∂/∂A, ∂/∂k, ∂/∂C]` at a timestamp

use crate::domain::DecayParams;

/// Number of model parameters (amplitude, rate, offset).
pub const PARAM_COUNT: usize = 3;

/// Evaluate the model at `t`.
pub fn one_phase_decay(t: f64, params: &DecayParams) -> f64 {
    params.amplitude * (-params.rate * t).exp() + params.offset
}

/// Fill the Jacobian row for timestamp `t`.
///
/// # Panics
/// Panics if `out.len() < PARAM_COUNT`.
pub fn fill_jacobian_row(t: f64, params: &DecayParams, out: &mut [f64]) {
    let e = (-params.rate * t).exp();
    out[0] = e;
    out[1] = -params.amplitude * t * e;
    out[2] = 1.0;
}

/// Reconstruct a full curve over `time`.
///
/// Undefined parameters produce an all-`NaN` curve.
pub fn evaluate_curve(time: &[f64], params: &DecayParams) -> Vec<f64> {
    time.iter().map(|&t| one_phase_decay(t, params)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: DecayParams = DecayParams {
        amplitude: 2.0,
        rate: 0.5,
        offset: 1.0,
    };

    #[test]
    fn decay_starts_at_amplitude_plus_offset_and_tends_to_offset() {
        assert!((one_phase_decay(0.0, &P) - 3.0).abs() < 1e-12);
        assert!((one_phase_decay(100.0, &P) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let t = 1.7;
        let mut row = [0.0; PARAM_COUNT];
        fill_jacobian_row(t, &P, &mut row);

        let h = 1e-6;
        let base = P.to_array();
        for j in 0..PARAM_COUNT {
            let mut hi = base;
            let mut lo = base;
            hi[j] += h;
            lo[j] -= h;
            let fd = (one_phase_decay(t, &DecayParams::from_slice(&hi))
                - one_phase_decay(t, &DecayParams::from_slice(&lo)))
                / (2.0 * h);
            assert!((fd - row[j]).abs() < 1e-6, "param {j}: fd={fd} analytic={}", row[j]);
        }
    }

    #[test]
    fn undefined_parameters_give_nan_curve() {
        let curve = evaluate_curve(&[0.0, 1.0], &DecayParams::UNDEFINED);
        assert!(curve.iter().all(|v| v.is_nan()));
    }
}
