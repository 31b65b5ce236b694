//! Stimulus-aligned windowing.
//!
//! Input layout, per column:
//!
//! - row 0: 1-based stimulus ("puff") index into the values below
//! - rows 1..: fluorescence values (trailing empty cells allowed)
//!
//! For a stimulus `s` the event sits at value row `e = s − 1`; the window is
//! `[e − pre, e + post)`. The output puts a constant marker in row 0 so every
//! column shares the same re-based stimulus row.

use log::{info, warn};
use serde::Serialize;

use crate::domain::{EdgePolicy, TraceTable, WindowConfig};
use crate::error::AppError;

/// How one column was windowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowReport {
    pub column: usize,
    /// Stimulus index as read from row 0 (1-based).
    pub stimulus: usize,
    /// Number of values available in the column.
    pub n_values: usize,
    /// `NaN` samples inserted before the first available value.
    pub padded_before: usize,
    /// `NaN` samples inserted after the last available value.
    pub padded_after: usize,
}

impl WindowReport {
    pub fn is_padded(&self) -> bool {
        self.padded_before + self.padded_after > 0
    }
}

/// Windowed traces (without the marker row) plus per-column reports.
#[derive(Debug, Clone)]
pub struct WindowedTable {
    /// `(pre + post) × n_series` window values.
    pub values: TraceTable,
    pub marker: usize,
    pub reports: Vec<WindowReport>,
}

impl WindowedTable {
    /// 0-based row of the stimulus within `values` (`pre`; the marker is validated to be `pre + 1`).
    pub fn stimulus_row(&self) -> usize {
        self.marker - 1
    }

    /// Output layout: marker row followed by the window values.
    pub fn to_output_table(&self) -> TraceTable {
        let n = self.values.n_samples();
        let columns: Vec<Vec<f64>> = (0..self.values.n_series())
            .map(|j| {
                let mut col = Vec::with_capacity(n + 1);
                col.push(self.marker as f64);
                col.extend_from_slice(self.values.column(j));
                col
            })
            .collect();
        TraceTable::from_matrix(nalgebra::DMatrix::from_fn(n + 1, columns.len(), |i, j| columns[j][i]))
    }
}

/// Read and validate the stimulus cell of a column.
fn parse_stimulus(column: usize, cell: f64) -> Result<usize, AppError> {
    if cell.is_nan() {
        return Err(AppError::input(format!(
            "Column {column}: stimulus index (row 0) is missing."
        )));
    }
    if !cell.is_finite() || cell.fract() != 0.0 || cell < 1.0 || cell > u32::MAX as f64 {
        return Err(AppError::input(format!(
            "Column {column}: stimulus index must be a positive integer, got {cell}."
        )));
    }
    Ok(cell as usize)
}

/// Values of a column below the stimulus row, without trailing empty cells.
fn column_values(table: &TraceTable, column: usize) -> &[f64] {
    let values = &table.column(column)[1..];
    let len = values.iter().rposition(|v| !v.is_nan()).map(|i| i + 1).unwrap_or(0);
    &values[..len]
}

/// Window every column of `table` around its own stimulus.
pub fn window_traces(table: &TraceTable, config: &WindowConfig) -> Result<WindowedTable, AppError> {
    config.validate()?;
    if table.n_series() == 0 || table.n_samples() == 0 {
        return Err(AppError::no_data("Input table is empty."));
    }

    let mut columns = Vec::with_capacity(table.n_series());
    let mut reports = Vec::with_capacity(table.n_series());

    for j in 0..table.n_series() {
        let stimulus = parse_stimulus(j, table.get(0, j))?;
        let values = column_values(table, j);
        let event = stimulus - 1;

        let start = event as isize - config.pre as isize;
        let end = event + config.post;
        let padded_before = (-start).max(0) as usize;
        let padded_after = end.saturating_sub(values.len()).min(config.len());

        let report = WindowReport {
            column: j,
            stimulus,
            n_values: values.len(),
            padded_before,
            padded_after,
        };

        if report.is_padded() {
            match config.edge_policy {
                EdgePolicy::Reject => {
                    return Err(AppError::input(format!(
                        "Column {j}: window around stimulus {stimulus} needs {} samples before and {} after, \
                         but only {} values are available ({padded_before} missing before, {padded_after} missing after).",
                        config.pre, config.post, values.len()
                    )));
                }
                EdgePolicy::Clamp => {
                    warn!(
                        "Column {j}: window clamped at table edges ({padded_before} samples padded before, {padded_after} after)"
                    );
                }
            }
        }

        let window: Vec<f64> = (0..config.len())
            .map(|k| {
                let src = start + k as isize;
                if src >= 0 && (src as usize) < values.len() {
                    values[src as usize]
                } else {
                    f64::NAN
                }
            })
            .collect();

        columns.push(window);
        reports.push(report);
    }

    let values = TraceTable::from_columns(&columns)?;
    info!(
        "Windowed {} series to {} samples ({} before, {} after stimulus)",
        values.n_series(),
        values.n_samples(),
        config.pre,
        config.post
    );

    Ok(WindowedTable {
        values,
        marker: config.marker,
        reports,
    })
}
