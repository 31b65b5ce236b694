//! Cross-series aggregation and reporting.
//!
//! At each time point we summarize the series with their mean and standard error
//! of the mean. Undefined entries (`NaN`, from failed fits or degenerate
//! baselines) are excluded from that time point's statistic rather than
//! propagated, so one bad cell does not blank the whole summary.

use serde::Serialize;

use crate::domain::TraceTable;
use crate::math::{finite_values, mean, sample_std};

pub mod format;

pub use format::*;

/// Per-time-point mean ± SEM across series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryBand {
    /// Mean of the finite entries (`NaN` when there are none).
    pub mean: Vec<f64>,
    /// `sample_std / √n_valid` (`NaN` when fewer than two entries are finite).
    ///
    /// The denominator is the number of series contributing at this time point,
    /// not the total series count; series with undefined values (failed fit,
    /// degenerate baseline) do not shrink the SEM.
    pub sem: Vec<f64>,
    /// Number of finite entries contributing at each time point.
    pub n_valid: Vec<usize>,
}

impl SummaryBand {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// A band plus the display metadata a plotting collaborator needs.
#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub title: String,
    pub y_label: String,
    pub band: SummaryBand,
}

/// Mean and SEM of every row of `table`.
pub fn summarize(table: &TraceTable) -> SummaryBand {
    let n = table.n_samples();
    let mut out = SummaryBand {
        mean: Vec::with_capacity(n),
        sem: Vec::with_capacity(n),
        n_valid: Vec::with_capacity(n),
    };

    for i in 0..n {
        let values = finite_values(&table.row(i));
        let k = values.len();
        out.mean.push(mean(&values).unwrap_or(f64::NAN));
        out.sem
            .push(sample_std(&values).map(|s| s / (k as f64).sqrt()).unwrap_or(f64::NAN));
        out.n_valid.push(k);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_sem_per_row() {
        let table = TraceTable::from_rows(&[vec![1.0, 2.0, 3.0], vec![2.0, 2.0, 2.0]]).unwrap();
        let band = summarize(&table);

        assert_eq!(band.len(), 2);
        assert!((band.mean[0] - 2.0).abs() < 1e-12);
        // std = 1, n = 3
        assert!((band.sem[0] - 1.0 / 3f64.sqrt()).abs() < 1e-12);
        assert_eq!(band.sem[1], 0.0);
        assert_eq!(band.n_valid, vec![3, 3]);
    }

    #[test]
    fn undefined_entries_are_excluded_not_propagated() {
        let table = TraceTable::from_rows(&[
            vec![1.0, f64::NAN, 3.0],
            vec![f64::NAN, f64::NAN, 5.0],
            vec![f64::NAN, f64::NAN, f64::NAN],
        ])
        .unwrap();
        let band = summarize(&table);

        // Row 0: mean of {1, 3}, std = √2, n = 2.
        assert!((band.mean[0] - 2.0).abs() < 1e-12);
        assert!((band.sem[0] - 1.0).abs() < 1e-12);
        // Row 1: a single valid value has a mean but no SEM.
        assert_eq!(band.mean[1], 5.0);
        assert!(band.sem[1].is_nan());
        // Row 2: nothing valid.
        assert!(band.mean[2].is_nan());
        assert_eq!(band.n_valid, vec![2, 1, 0]);
    }
}
