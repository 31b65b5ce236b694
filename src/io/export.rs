//! Export the per-time-point summary bands to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or plotting
//! scripts: one row per time point with mean and SEM for the raw, fitted and
//! z-scored signals. Undefined statistics are written as empty fields.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::app::pipeline::AnalysisRun;
use crate::error::AppError;

/// Write the summary bands of `run` to a CSV file.
pub fn write_summary_csv(path: &Path, run: &AnalysisRun) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create summary CSV '{}': {e}", path.display())))?;
    write_summary(file, run)
}

/// Write the summary bands of `run` to any writer.
pub fn write_summary<W: Write>(mut out: W, run: &AnalysisRun) -> Result<(), AppError> {
    writeln!(
        out,
        "time_s,raw_mean,raw_sem,fit_mean,fit_sem,zscore_mean,zscore_sem,zscore_n"
    )
    .map_err(|e| AppError::input(format!("Failed to write summary CSV header: {e}")))?;

    let raw = &run.raw_figure.band;
    let fit = &run.fit_figure.band;
    let z = &run.z_figure.band;

    for (i, t) in run.time.iter().enumerate() {
        writeln!(
            out,
            "{:.6},{},{},{},{},{},{},{}",
            t,
            fmt_stat(raw.mean[i]),
            fmt_stat(raw.sem[i]),
            fmt_stat(fit.mean[i]),
            fmt_stat(fit.sem[i]),
            fmt_stat(z.mean[i]),
            fmt_stat(z.sem[i]),
            z.n_valid[i],
        )
        .map_err(|e| AppError::input(format!("Failed to write summary CSV row: {e}")))?;
    }

    Ok(())
}

fn fmt_stat(v: f64) -> String {
    if v.is_finite() { format!("{v:.10}") } else { String::new() }
}
