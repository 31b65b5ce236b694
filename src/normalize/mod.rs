//! Baseline-relative z-scoring.
//!
//! Each series is standardized against its own pre-stimulus baseline:
//!
//! ```text
//! window = [max(0, s − ⌊baseline_seconds · fs⌋), min(rows, s))
//! z_i    = (x_i − mean(window)) / std(window)      (std with n − 1)
//! ```
//!
//! A series whose baseline is empty, a single sample, constant or non-finite
//! has no defined scale; its whole output column is `NaN` and the reason is kept
//! alongside the table.

use std::ops::Range;

use log::warn;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::domain::TraceTable;
use crate::error::AppError;
use crate::math::{is_constant, mean, sample_std};

/// Why a series' baseline cannot be used for standardization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateBaseline {
    #[error("baseline window is empty")]
    EmptyWindow,
    #[error("baseline window holds a single sample")]
    SingleSample,
    #[error("baseline has zero variance")]
    ZeroVariance,
    #[error("baseline contains non-finite values")]
    NonFinite,
}

/// Baseline statistics of one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaselineStats {
    Defined { mean: f64, std: f64, n: usize },
    Degenerate(DegenerateBaseline),
}

impl BaselineStats {
    pub fn is_defined(&self) -> bool {
        matches!(self, BaselineStats::Defined { .. })
    }
}

/// Z-scored table plus the baseline used for every series.
#[derive(Debug, Clone)]
pub struct ZScores {
    pub table: TraceTable,
    pub baselines: Vec<BaselineStats>,
    /// Rows that formed the baseline window.
    pub window: Range<usize>,
}

impl ZScores {
    /// `(series index, reason)` for every degenerate baseline.
    pub fn degenerate(&self) -> Vec<(usize, DegenerateBaseline)> {
        self.baselines
            .iter()
            .enumerate()
            .filter_map(|(i, b)| match b {
                BaselineStats::Degenerate(reason) => Some((i, *reason)),
                BaselineStats::Defined { .. } => None,
            })
            .collect()
    }
}

/// Rows of the baseline window, clamped to `[0, n_rows)`.
///
/// The window may be empty (stimulus at row 0, or past the end of a short table
/// with a long baseline); that is a valid, degenerate result.
pub fn baseline_window(
    stimulus_index: usize,
    n_rows: usize,
    sampling_rate: f64,
    baseline_seconds: f64,
) -> Range<usize> {
    // Truncation toward zero; both factors are validated non-negative.
    let width = (baseline_seconds * sampling_rate).floor().max(0.0) as usize;
    let start = stimulus_index.saturating_sub(width);
    let end = stimulus_index.min(n_rows);
    if start >= end { start.min(n_rows)..start.min(n_rows) } else { start..end }
}

/// Baseline mean and sample std over `window`.
pub fn baseline_stats(window: &[f64]) -> BaselineStats {
    match window.len() {
        0 => return BaselineStats::Degenerate(DegenerateBaseline::EmptyWindow),
        1 => return BaselineStats::Degenerate(DegenerateBaseline::SingleSample),
        _ => {}
    }
    if window.iter().any(|v| !v.is_finite()) {
        return BaselineStats::Degenerate(DegenerateBaseline::NonFinite);
    }
    if is_constant(window) {
        return BaselineStats::Degenerate(DegenerateBaseline::ZeroVariance);
    }

    match (mean(window), sample_std(window)) {
        (Some(m), Some(s)) if s.is_finite() && s > 0.0 => BaselineStats::Defined {
            mean: m,
            std: s,
            n: window.len(),
        },
        (_, Some(s)) if s == 0.0 => BaselineStats::Degenerate(DegenerateBaseline::ZeroVariance),
        _ => BaselineStats::Degenerate(DegenerateBaseline::NonFinite),
    }
}

/// Standardize every series of `corrected` against its own baseline window.
pub fn calculate_zscores(
    corrected: &TraceTable,
    stimulus_index: usize,
    sampling_rate: f64,
    baseline_seconds: f64,
) -> Result<ZScores, AppError> {
    let window = baseline_window(stimulus_index, corrected.n_samples(), sampling_rate, baseline_seconds);

    let per_series: Vec<(BaselineStats, Vec<f64>)> = (0..corrected.n_series())
        .into_par_iter()
        .map(|j| {
            let column = corrected.column(j);
            let stats = baseline_stats(&column[window.clone()]);
            let z = match stats {
                BaselineStats::Defined { mean, std, .. } => column.iter().map(|v| (v - mean) / std).collect(),
                BaselineStats::Degenerate(reason) => {
                    warn!("Baseline for series {j} is degenerate ({reason}); z-scores undefined");
                    vec![f64::NAN; column.len()]
                }
            };
            (stats, z)
        })
        .collect();

    let (baselines, columns): (Vec<BaselineStats>, Vec<Vec<f64>>) = per_series.into_iter().unzip();
    let table = if columns.is_empty() {
        TraceTable::filled(corrected.n_samples(), 0, f64::NAN)
    } else {
        TraceTable::from_columns(&columns)?
    };

    Ok(ZScores {
        table,
        baselines,
        window,
    })
}
