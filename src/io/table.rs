//! Headerless delimited numeric tables.
//!
//! Layout: one line per time sample, one field per series, no header row.
//! Empty fields are read as missing (`NaN`) and missing values are written back
//! as empty fields. Anything else that does not parse as a number is malformed
//! input and aborts the run with the offending line and column.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use log::{info, warn};

use crate::domain::TraceTable;
use crate::error::AppError;

/// A measurement table after cleaning.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: TraceTable,
    pub rows_read: usize,
    /// Rows discarded because a field was empty or non-finite.
    pub rows_dropped: usize,
}

/// Read a table from `path`.
pub fn read_table(path: &Path, delimiter: u8) -> Result<TraceTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open '{}': {e}", path.display())))?;
    let table = read_table_from(file, delimiter)?;
    info!(
        "Read {} rows x {} series from '{}'",
        table.n_samples(),
        table.n_series(),
        path.display()
    );
    Ok(table)
}

/// Read a table from any reader.
pub fn read_table_from<R: Read>(reader: R, delimiter: u8) -> Result<TraceTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;
        let record = result.map_err(|e| AppError::input(format!("CSV parse error on line {line}: {e}")))?;

        let row = record
            .iter()
            .enumerate()
            .map(|(col, field)| {
                parse_cell(field).ok_or_else(|| {
                    AppError::input(format!("Line {line}, column {col}: '{field}' is not a number."))
                })
            })
            .collect::<Result<Vec<f64>, AppError>>()?;

        if let Some(first) = rows.first() {
            if row.len() != first.len() {
                return Err(AppError::input(format!(
                    "Line {line} has {} fields, expected {} (ragged table).",
                    row.len(),
                    first.len()
                )));
            }
        }
        rows.push(row);
    }

    if rows.is_empty() || rows[0].is_empty() {
        return Err(AppError::no_data("Input table is empty."));
    }
    TraceTable::from_rows(&rows)
}

/// Read a measurement table and drop rows that contain missing or non-finite values.
pub fn load_measurements(path: &Path, delimiter: u8) -> Result<LoadedTable, AppError> {
    let table = read_table(path, delimiter)?;
    clean_measurements(table)
}

/// Drop incomplete rows from an already-parsed table.
pub fn clean_measurements(table: TraceTable) -> Result<LoadedTable, AppError> {
    let rows_read = table.n_samples();
    let cleaned = table.filter_rows(|row| row.iter().all(|v| v.is_finite()));
    let rows_dropped = rows_read - cleaned.n_samples();

    if rows_dropped > 0 {
        warn!("Dropped {rows_dropped} of {rows_read} rows with empty or non-finite fields");
    }
    if cleaned.n_samples() == 0 {
        return Err(AppError::no_data(
            "No complete rows remain after dropping empty/non-finite fields.",
        ));
    }

    Ok(LoadedTable {
        table: cleaned,
        rows_read,
        rows_dropped,
    })
}

/// Write a table to `path`.
pub fn write_table(path: &Path, table: &TraceTable, delimiter: u8) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create '{}': {e}", path.display())))?;
    write_table_to(file, table, delimiter)?;
    info!(
        "Wrote {} rows x {} series to '{}'",
        table.n_samples(),
        table.n_series(),
        path.display()
    );
    Ok(())
}

/// Write a table to any writer.
pub fn write_table_to<W: Write>(writer: W, table: &TraceTable, delimiter: u8) -> Result<(), AppError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .from_writer(writer);

    for i in 0..table.n_samples() {
        let fields: Vec<String> = table.row(i).into_iter().map(format_cell).collect();
        writer
            .write_record(&fields)
            .map_err(|e| AppError::input(format!("Failed to write row {i}: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush table: {e}")))?;
    Ok(())
}

fn parse_cell(field: &str) -> Option<f64> {
    if field.is_empty() {
        return Some(f64::NAN);
    }
    field.parse::<f64>().ok()
}

fn format_cell(v: f64) -> String {
    if v.is_nan() { String::new() } else { format!("{v}") }
}
