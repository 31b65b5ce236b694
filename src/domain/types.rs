//! Shared domain types.
//!
//! The central type is [`TraceTable`]: rows are time samples, columns are series
//! (cells). Every pipeline stage consumes one table and returns a new one.
//! Missing values are represented as `NaN` so tables always keep their shape.

use std::path::PathBuf;

use clap::ValueEnum;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A time × series table of fluorescence values.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceTable {
    data: DMatrix<f64>,
}

impl TraceTable {
    /// Wrap an existing matrix (rows = samples, columns = series).
    pub fn from_matrix(data: DMatrix<f64>) -> Self {
        Self { data }
    }

    /// A table of the given shape with every cell set to `value`.
    pub fn filled(n_samples: usize, n_series: usize, value: f64) -> Self {
        Self {
            data: DMatrix::from_element(n_samples, n_series, value),
        }
    }

    /// Build a table from per-series columns.
    ///
    /// All columns must have the same length.
    pub fn from_columns(columns: &[Vec<f64>]) -> Result<Self, AppError> {
        let n_samples = columns.first().map(Vec::len).unwrap_or(0);
        if let Some((idx, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != n_samples) {
            return Err(AppError::input(format!(
                "Column {idx} has {} samples, expected {n_samples}.",
                col.len()
            )));
        }

        let mut flat = Vec::with_capacity(n_samples * columns.len());
        for col in columns {
            flat.extend_from_slice(col);
        }
        Ok(Self {
            data: DMatrix::from_vec(n_samples, columns.len(), flat),
        })
    }

    /// Build a table from row-major records (as read from a delimited file).
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, AppError> {
        let n_series = rows.first().map(Vec::len).unwrap_or(0);
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_series) {
            return Err(AppError::input(format!(
                "Row {idx} has {} fields, expected {n_series}.",
                row.len()
            )));
        }
        Ok(Self {
            data: DMatrix::from_fn(rows.len(), n_series, |i, j| rows[i][j]),
        })
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_series(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0 || self.data.ncols() == 0
    }

    /// One series as a contiguous slice.
    ///
    /// # Panics
    /// Panics if `series >= self.n_series()`.
    pub fn column(&self, series: usize) -> &[f64] {
        let n = self.data.nrows();
        &self.data.as_slice()[series * n..(series + 1) * n]
    }

    /// One time sample across all series.
    pub fn row(&self, sample: usize) -> Vec<f64> {
        self.data.row(sample).iter().copied().collect()
    }

    pub fn get(&self, sample: usize, series: usize) -> f64 {
        self.data[(sample, series)]
    }

    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Element-wise `self - other`.
    pub fn subtract(&self, other: &TraceTable) -> Result<TraceTable, AppError> {
        if self.data.shape() != other.data.shape() {
            return Err(AppError::new(
                crate::error::EXIT_COMPUTE,
                format!(
                    "Table shape mismatch: {:?} vs {:?}.",
                    self.data.shape(),
                    other.data.shape()
                ),
            ));
        }
        Ok(TraceTable {
            data: &self.data - &other.data,
        })
    }

    /// Keep only rows for which `keep` returns true.
    pub fn filter_rows(&self, mut keep: impl FnMut(&[f64]) -> bool) -> TraceTable {
        let rows: Vec<Vec<f64>> = (0..self.n_samples())
            .map(|i| self.row(i))
            .filter(|r| keep(r.as_slice()))
            .collect();
        let n_series = self.n_series();
        TraceTable {
            data: DMatrix::from_fn(rows.len(), n_series, |i, j| rows[i][j]),
        }
    }
}

/// Sample timestamps (seconds) for `n` samples at `sampling_rate` Hz.
pub fn time_axis(n: usize, sampling_rate: f64) -> Vec<f64> {
    (0..n).map(|i| i as f64 / sampling_rate).collect()
}

/// One-phase decay parameters for `value(t) = amplitude · exp(−rate · t) + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayParams {
    pub amplitude: f64,
    pub rate: f64,
    pub offset: f64,
}

impl DecayParams {
    pub const UNDEFINED: DecayParams = DecayParams {
        amplitude: f64::NAN,
        rate: f64::NAN,
        offset: f64::NAN,
    };

    pub fn to_array(self) -> [f64; 3] {
        [self.amplitude, self.rate, self.offset]
    }

    pub fn from_slice(p: &[f64]) -> Self {
        Self {
            amplitude: p[0],
            rate: p[1],
            offset: p[2],
        }
    }
}

/// What to do when a window runs past the ends of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EdgePolicy {
    /// Fail the run, naming the series whose window does not fit.
    Reject,
    /// Keep the stimulus at the canonical row and fill missing samples with `NaN`.
    Clamp,
}

/// Windowing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Samples kept before the stimulus.
    pub pre: usize,
    /// Samples kept from the stimulus onwards.
    pub post: usize,
    /// Value written in row 0 of every output column: the 1-based row of the
    /// stimulus within the window, so always `pre + 1`.
    pub marker: usize,
    pub edge_policy: EdgePolicy,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            pre: 500,
            post: 600,
            marker: 501,
            edge_policy: EdgePolicy::Reject,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.pre + self.post == 0 {
            return Err(AppError::input("Window must contain at least one sample (pre + post > 0)."));
        }
        // The stimulus lands at window row `pre`, i.e. 1-based row `pre + 1`.
        if self.marker != self.pre + 1 {
            return Err(AppError::input(format!(
                "Stimulus marker {} does not match the window: with {} samples before the stimulus it must be {}.",
                self.marker,
                self.pre,
                self.pre + 1
            )));
        }
        Ok(())
    }

    /// Total window length excluding the marker row.
    pub fn len(&self) -> usize {
        self.pre + self.post
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parameters of the fit → normalize → aggregate analysis.
///
/// Derived from CLI flags (plus defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Sampling rate in Hz.
    pub sampling_rate: f64,
    /// 0-based row of the stimulus in the measurement table.
    pub puff_idx: usize,
    /// Length of the pre-stimulus baseline window, in seconds.
    pub baseline_seconds: f64,
    /// Initial decay rate guess for every series.
    pub initial_rate: f64,
    /// Model evaluation budget per series.
    pub max_evaluations: usize,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub output: Option<PathBuf>,
    pub export_summary: Option<PathBuf>,
    pub export_report: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 5.0,
            puff_idx: 505,
            baseline_seconds: 10.0,
            initial_rate: 0.01,
            max_evaluations: 10_000,
            plot: false,
            plot_width: 100,
            plot_height: 20,
            output: None,
            export_summary: None,
            export_report: None,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.sampling_rate.is_finite() && self.sampling_rate > 0.0) {
            return Err(AppError::input(format!(
                "Sampling rate must be positive and finite, got {}.",
                self.sampling_rate
            )));
        }
        if !(self.baseline_seconds.is_finite() && self.baseline_seconds >= 0.0) {
            return Err(AppError::input(format!(
                "Baseline duration must be non-negative and finite, got {}.",
                self.baseline_seconds
            )));
        }
        if !self.initial_rate.is_finite() {
            return Err(AppError::input("Initial decay rate must be finite."));
        }
        if self.max_evaluations == 0 {
            return Err(AppError::input("Evaluation budget must be >= 1."));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_columns_is_column_major() {
        let table = TraceTable::from_columns(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(table.n_samples(), 3);
        assert_eq!(table.n_series(), 2);
        assert_eq!(table.column(1), &[4.0, 5.0, 6.0]);
        assert_eq!(table.row(2), vec![3.0, 6.0]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = TraceTable::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
        assert!(err.message().contains("Row 1"));
    }

    #[test]
    fn filter_rows_keeps_shape_of_survivors() {
        let table = TraceTable::from_rows(&[vec![1.0, 2.0], vec![f64::NAN, 3.0], vec![4.0, 5.0]]).unwrap();
        let kept = table.filter_rows(|r| r.iter().all(|v| v.is_finite()));
        assert_eq!(kept.n_samples(), 2);
        assert_eq!(kept.column(0), &[1.0, 4.0]);
    }

    #[test]
    fn window_marker_must_point_at_the_stimulus_row() {
        assert!(WindowConfig::default().validate().is_ok());

        let shifted = WindowConfig {
            pre: 50,
            ..WindowConfig::default()
        };
        let err = shifted.validate().unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
        assert!(err.message().contains("must be 51"), "{}", err.message());

        let consistent = WindowConfig {
            pre: 50,
            marker: 51,
            ..WindowConfig::default()
        };
        assert!(consistent.validate().is_ok());
    }

    #[test]
    fn analysis_config_rejects_bad_sampling_rate() {
        let config = AnalysisConfig {
            sampling_rate: 0.0,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
