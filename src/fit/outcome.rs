//! Per-series fit outcomes.
//!
//! A failed fit is a value, not an error: the batch keeps going and the failure
//! travels with the series index into the report. Table views (`params_table`,
//! `DecayFit::curves`) keep their fixed shape and carry `NaN` for failed series.

use nalgebra::DMatrix;
use thiserror::Error;

use crate::domain::{DecayParams, TraceTable};
use crate::math::LmError;
use crate::models::PARAM_COUNT;

/// Why a single series could not be fitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitFailure {
    #[error("too few samples ({n}) for a three-parameter fit")]
    TooFewSamples { n: usize },
    #[error("series contains {count} non-finite samples")]
    NonFiniteInput { count: usize },
    #[error("fit did not converge: {0}")]
    Optimizer(#[from] LmError),
    #[error("optimizer returned non-finite parameters")]
    NonFiniteParameters,
}

/// A converged fit with its diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergedFit {
    pub params: DecayParams,
    /// Sum of squared residuals at `params`.
    pub sse: f64,
    pub evaluations: usize,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesFit {
    Converged(ConvergedFit),
    Failed(FitFailure),
}

impl SeriesFit {
    /// Fitted parameters, or [`DecayParams::UNDEFINED`] for a failed fit.
    pub fn params(&self) -> DecayParams {
        match self {
            SeriesFit::Converged(fit) => fit.params,
            SeriesFit::Failed(_) => DecayParams::UNDEFINED,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, SeriesFit::Converged(_))
    }

    pub fn failure(&self) -> Option<&FitFailure> {
        match self {
            SeriesFit::Converged(_) => None,
            SeriesFit::Failed(reason) => Some(reason),
        }
    }
}

/// Batch result of fitting every series of a table.
#[derive(Debug, Clone)]
pub struct DecayFit {
    /// One outcome per series, in column order.
    pub series: Vec<SeriesFit>,
    /// Reconstructed curves (`n_samples × n_series`), `NaN` columns for failures.
    pub curves: TraceTable,
}

impl DecayFit {
    /// Parameters as an `n_series × 3` matrix (`amplitude, rate, offset`).
    pub fn params_table(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.series.len(), PARAM_COUNT, |i, j| {
            self.series[i].params().to_array()[j]
        })
    }

    pub fn n_converged(&self) -> usize {
        self.series.iter().filter(|s| s.is_converged()).count()
    }

    /// `(series index, reason)` for every failed fit.
    pub fn failures(&self) -> Vec<(usize, &FitFailure)> {
        self.series
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.failure().map(|f| (i, f)))
            .collect()
    }
}
