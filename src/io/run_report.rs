//! JSON run report.
//!
//! The report is the portable record of one analysis run:
//! - the configuration it ran with
//! - per-series decay parameters or the reason the fit failed
//! - per-series baseline statistics or the reason they are undefined
//! - the three summary figures (raw, fitted decay, z-score)
//!
//! Non-finite numbers serialize as `null`.

use std::fs::File;
use std::path::Path;

use chrono::Local;
use serde::Serialize;

use crate::app::pipeline::AnalysisRun;
use crate::domain::{AnalysisConfig, DecayParams};
use crate::error::AppError;
use crate::fit::SeriesFit;
use crate::normalize::{BaselineStats, DegenerateBaseline};
use crate::report::Figure;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub generated: String,
    pub config: &'a AnalysisConfig,
    pub n_samples: usize,
    pub rows_dropped: usize,
    pub baseline_rows: [usize; 2],
    pub series: Vec<SeriesRecord>,
    pub time: &'a [f64],
    pub figures: [&'a Figure; 3],
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesRecord {
    pub index: usize,
    pub fit: FitRecord,
    pub baseline: BaselineRecord,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FitRecord {
    Converged {
        params: DecayParams,
        sse: f64,
        evaluations: usize,
        iterations: usize,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BaselineRecord {
    Defined { mean: f64, std: f64, n: usize },
    Degenerate { reason: DegenerateBaseline },
}

impl From<&SeriesFit> for FitRecord {
    fn from(fit: &SeriesFit) -> Self {
        match fit {
            SeriesFit::Converged(f) => FitRecord::Converged {
                params: f.params,
                sse: f.sse,
                evaluations: f.evaluations,
                iterations: f.iterations,
            },
            SeriesFit::Failed(reason) => FitRecord::Failed {
                reason: reason.to_string(),
            },
        }
    }
}

impl From<&BaselineStats> for BaselineRecord {
    fn from(stats: &BaselineStats) -> Self {
        match *stats {
            BaselineStats::Defined { mean, std, n } => BaselineRecord::Defined { mean, std, n },
            BaselineStats::Degenerate(reason) => BaselineRecord::Degenerate { reason },
        }
    }
}

/// Assemble the report for `run`.
pub fn build_report<'a>(run: &'a AnalysisRun, config: &'a AnalysisConfig, rows_dropped: usize) -> RunReport<'a> {
    let series = run
        .fit
        .series
        .iter()
        .zip(run.zscores.baselines.iter())
        .enumerate()
        .map(|(index, (fit, baseline))| SeriesRecord {
            index,
            fit: FitRecord::from(fit),
            baseline: BaselineRecord::from(baseline),
        })
        .collect();

    RunReport {
        tool: "cadecay",
        version: env!("CARGO_PKG_VERSION"),
        generated: Local::now().to_rfc3339(),
        config,
        n_samples: run.raw.n_samples(),
        rows_dropped,
        baseline_rows: [run.zscores.window.start, run.zscores.window.end],
        series,
        time: &run.time,
        figures: run.figures(),
    }
}

/// Write the JSON report for `run` to `path`.
pub fn write_report_json(
    path: &Path,
    run: &AnalysisRun,
    config: &AnalysisConfig,
    rows_dropped: usize,
) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create report JSON '{}': {e}", path.display())))?;
    let report = build_report(run, config, rows_dropped);
    serde_json::to_writer_pretty(file, &report)
        .map_err(|e| AppError::input(format!("Failed to write report JSON: {e}")))?;
    Ok(())
}
