//! Per-series one-phase decay fitting.
//!
//! Given:
//! - timestamps `t_i` (seconds)
//! - a table of raw traces (one column per series)
//!
//! we fit `A·exp(−k·t) + C` to every column independently with
//! Levenberg–Marquardt, then reconstruct the fitted curve on the full time axis.
//! Columns share nothing, so the batch is a parallel map over series indices.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::domain::{AnalysisConfig, DecayParams, TraceTable};
use crate::error::{AppError, EXIT_COMPUTE};
use crate::fit::outcome::{ConvergedFit, DecayFit, FitFailure, SeriesFit};
use crate::math::{LeastSquaresProblem, LmOptions, levenberg_marquardt};
use crate::models::{PARAM_COUNT, evaluate_curve, fill_jacobian_row, one_phase_decay};

/// Fitting options shared by every series in a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Starting decay rate `k₀` (per second).
    pub initial_rate: f64,
    /// Residual evaluation budget per series.
    pub max_evaluations: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            initial_rate: 0.01,
            max_evaluations: 10_000,
        }
    }
}

impl From<&AnalysisConfig> for FitOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            initial_rate: config.initial_rate,
            max_evaluations: config.max_evaluations,
        }
    }
}

/// Residuals `model(t_i) − y_i` for one series.
struct DecayProblem<'a> {
    time: &'a [f64],
    y: &'a [f64],
}

impl LeastSquaresProblem for DecayProblem<'_> {
    fn n_params(&self) -> usize {
        PARAM_COUNT
    }

    fn n_residuals(&self) -> usize {
        self.y.len()
    }

    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>) {
        let p = DecayParams::from_slice(params.as_slice());
        for (i, (&t, &y)) in self.time.iter().zip(self.y.iter()).enumerate() {
            out[i] = one_phase_decay(t, &p) - y;
        }
    }

    fn jacobian(&self, params: &DVector<f64>, out: &mut DMatrix<f64>) {
        let p = DecayParams::from_slice(params.as_slice());
        let mut row = [0.0; PARAM_COUNT];
        for (i, &t) in self.time.iter().enumerate() {
            fill_jacobian_row(t, &p, &mut row);
            for (j, v) in row.iter().enumerate() {
                out[(i, j)] = *v;
            }
        }
    }
}

/// Starting point for the optimizer.
///
/// Assumes the trace decays monotonically towards a plateau: the amplitude is
/// the drop from first to last sample and the offset is the last sample. This is
/// a heuristic, not an optimal estimate; series that rise or oscillate start far
/// from their optimum and may exhaust the evaluation budget.
///
/// # Panics
/// Panics if `y` is empty.
pub fn initial_guess(y: &[f64], initial_rate: f64) -> DecayParams {
    let first = y[0];
    let last = y[y.len() - 1];
    DecayParams {
        amplitude: first - last,
        rate: initial_rate,
        offset: last,
    }
}

/// Fit a single series.
pub fn fit_series(time: &[f64], y: &[f64], opts: &FitOptions) -> SeriesFit {
    if y.len() < PARAM_COUNT || time.len() != y.len() {
        return SeriesFit::Failed(FitFailure::TooFewSamples { n: y.len().min(time.len()) });
    }
    let non_finite = y.iter().filter(|v| !v.is_finite()).count();
    if non_finite > 0 {
        return SeriesFit::Failed(FitFailure::NonFiniteInput { count: non_finite });
    }

    let guess = initial_guess(y, opts.initial_rate);
    let problem = DecayProblem { time, y };
    let lm_opts = LmOptions {
        max_evaluations: opts.max_evaluations,
        ..LmOptions::default()
    };

    match levenberg_marquardt(&problem, DVector::from_row_slice(&guess.to_array()), &lm_opts) {
        Ok(sol) => {
            if !sol.params.iter().all(|v| v.is_finite()) {
                return SeriesFit::Failed(FitFailure::NonFiniteParameters);
            }
            debug!(
                "converged after {} evaluations ({:?}), sse={:.6e}",
                sol.evaluations, sol.convergence, sol.sse
            );
            SeriesFit::Converged(ConvergedFit {
                params: DecayParams::from_slice(sol.params.as_slice()),
                sse: sol.sse,
                evaluations: sol.evaluations,
                iterations: sol.iterations,
            })
        }
        Err(e) => SeriesFit::Failed(FitFailure::from(e)),
    }
}

/// Fit every column of `raw` against `time`.
///
/// Always returns one outcome per series and an `n_samples × n_series` curve
/// table, whatever the individual fits do. The only error is a time axis whose
/// length does not match the table.
pub fn fit_one_phase_decay(time: &[f64], raw: &TraceTable, opts: &FitOptions) -> Result<DecayFit, AppError> {
    if time.len() != raw.n_samples() {
        return Err(AppError::new(
            EXIT_COMPUTE,
            format!(
                "Time axis has {} samples but the table has {}.",
                time.len(),
                raw.n_samples()
            ),
        ));
    }

    let series: Vec<SeriesFit> = (0..raw.n_series())
        .into_par_iter()
        .map(|j| {
            let fit = fit_series(time, raw.column(j), opts);
            if let SeriesFit::Failed(reason) = &fit {
                warn!("Fit did not converge for series {j}: {reason}");
            }
            fit
        })
        .collect();

    let columns: Vec<Vec<f64>> = series.iter().map(|s| evaluate_curve(time, &s.params())).collect();
    let curves = if columns.is_empty() {
        TraceTable::filled(raw.n_samples(), 0, f64::NAN)
    } else {
        TraceTable::from_columns(&columns)?
    };

    Ok(DecayFit { series, curves })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::time_axis;
    use crate::math::LmError;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    fn decay_column(time: &[f64], p: DecayParams) -> Vec<f64> {
        evaluate_curve(time, &p)
    }

    #[test]
    fn initial_guess_uses_first_and_last_samples() {
        let g = initial_guess(&[5.0, 4.0, 3.5, 3.0], 0.01);
        assert_eq!(g.amplitude, 2.0);
        assert_eq!(g.rate, 0.01);
        assert_eq!(g.offset, 3.0);
    }

    #[test]
    fn recovers_generating_parameters_without_noise() {
        let time = time_axis(300, 5.0);
        let truth = DecayParams {
            amplitude: 2.0,
            rate: 0.1,
            offset: 1.0,
        };
        let y = decay_column(&time, truth);

        let SeriesFit::Converged(fit) = fit_series(&time, &y, &FitOptions::default()) else {
            panic!("fit should converge");
        };
        assert!((fit.params.amplitude - 2.0).abs() < 1e-4, "{:?}", fit.params);
        assert!((fit.params.rate - 0.1).abs() < 1e-4, "{:?}", fit.params);
        assert!((fit.params.offset - 1.0).abs() < 1e-4, "{:?}", fit.params);
        assert!(fit.evaluations <= 10_000);
    }

    #[test]
    fn recovers_bleaching_at_recording_scale() {
        // 1100 samples at 5 Hz, offset ~1000: ∂/∂rate dominates JᵀJ.
        let time = time_axis(1100, 5.0);
        let truth = DecayParams {
            amplitude: 400.0,
            rate: 0.02,
            offset: 1000.0,
        };
        let y = decay_column(&time, truth);

        let SeriesFit::Converged(fit) = fit_series(&time, &y, &FitOptions::default()) else {
            panic!("fit should converge");
        };
        assert!(fit.evaluations > 1, "{fit:?}");
        assert!((fit.params.rate - 0.02).abs() < 1e-6, "{:?}", fit.params);
        assert!((fit.params.amplitude - 400.0).abs() < 1e-3, "{:?}", fit.params);
        assert!((fit.params.offset - 1000.0).abs() < 1e-3, "{:?}", fit.params);
        assert!(fit.sse < 1e-6, "{fit:?}");
    }

    #[test]
    fn batch_shapes_match_input_with_low_noise() {
        // 50 samples over 10 s, three noisy copies of exp(-0.3 t).
        let time: Vec<f64> = (0..50).map(|i| i as f64 * 10.0 / 49.0).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 0.01).unwrap();
        let columns: Vec<Vec<f64>> = (0..3)
            .map(|_| time.iter().map(|t| (-0.3 * t).exp() + noise.sample(&mut rng)).collect())
            .collect();
        let raw = TraceTable::from_columns(&columns).unwrap();

        let fit = fit_one_phase_decay(&time, &raw, &FitOptions::default()).unwrap();
        assert_eq!(fit.params_table().shape(), (3, 3));
        assert_eq!(fit.curves.n_samples(), raw.n_samples());
        assert_eq!(fit.curves.n_series(), raw.n_series());
        assert_eq!(fit.n_converged(), 3);
        for s in &fit.series {
            assert!((s.params().rate - 0.3).abs() < 0.05, "{:?}", s.params());
        }
    }

    #[test]
    fn failures_are_isolated_per_series() {
        let time = time_axis(100, 5.0);
        let good = decay_column(
            &time,
            DecayParams {
                amplitude: 1.0,
                rate: 0.2,
                offset: 0.5,
            },
        );
        let mut bad = good.clone();
        bad[10] = f64::NAN;
        let raw = TraceTable::from_columns(&[good.clone(), bad, good]).unwrap();

        let fit = fit_one_phase_decay(&time, &raw, &FitOptions::default()).unwrap();
        assert_eq!(fit.params_table().shape(), (3, 3));
        assert!(fit.series[0].is_converged());
        assert_eq!(fit.series[1].failure(), Some(&FitFailure::NonFiniteInput { count: 1 }));
        assert!(fit.series[2].is_converged());

        // Failed series: undefined parameters and an all-NaN curve.
        assert!(fit.params_table().row(1).iter().all(|v| v.is_nan()));
        assert!(fit.curves.column(1).iter().all(|v| v.is_nan()));
        assert!(fit.curves.column(0).iter().all(|v| v.is_finite()));
        assert_eq!(fit.failures().len(), 1);
    }

    #[test]
    fn exhausted_budget_is_reported_as_failure() {
        let time = time_axis(100, 5.0);
        let y = decay_column(
            &time,
            DecayParams {
                amplitude: 3.0,
                rate: 0.5,
                offset: 1.0,
            },
        );
        let opts = FitOptions {
            max_evaluations: 2,
            ..FitOptions::default()
        };
        match fit_series(&time, &y, &opts) {
            SeriesFit::Failed(FitFailure::Optimizer(LmError::MaxEvaluations { evaluations })) => {
                assert_eq!(evaluations, 2)
            }
            other => panic!("expected budget failure, got {other:?}"),
        }
    }

    #[test]
    fn too_few_samples_fails_without_panicking() {
        let fit = fit_series(&[0.0, 0.2], &[1.0, 0.5], &FitOptions::default());
        assert_eq!(fit.failure(), Some(&FitFailure::TooFewSamples { n: 2 }));
    }

    #[test]
    fn refitting_is_bit_identical() {
        let time = time_axis(200, 5.0);
        let columns: Vec<Vec<f64>> = (0..4)
            .map(|j| {
                time.iter()
                    .map(|t| (1.0 + j as f64) * (-0.05 * t).exp() + 0.3 + 0.01 * (t * 3.0).sin())
                    .collect()
            })
            .collect();
        let raw = TraceTable::from_columns(&columns).unwrap();

        let a = fit_one_phase_decay(&time, &raw, &FitOptions::default()).unwrap();
        let b = fit_one_phase_decay(&time, &raw, &FitOptions::default()).unwrap();
        assert_eq!(a.series, b.series);
        assert_eq!(a.curves, b.curves);
    }
}
