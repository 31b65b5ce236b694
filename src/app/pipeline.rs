//! Shared analysis pipeline used by the `analyze` and `run` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! time axis -> decay fit -> correction -> baseline z-scores -> summaries
//!
//! The command handlers can then focus on I/O and presentation.

use log::info;

use crate::domain::{AnalysisConfig, TraceTable, time_axis};
use crate::error::AppError;
use crate::fit::{DecayFit, FitOptions, fit_one_phase_decay};
use crate::normalize::{ZScores, calculate_zscores};
use crate::report::{Figure, summarize};

/// All computed outputs of a single analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    /// Seconds since the first sample, one entry per row.
    pub time: Vec<f64>,
    pub raw: TraceTable,
    pub fit: DecayFit,
    /// `raw − fitted`; `NaN` columns for failed fits.
    pub corrected: TraceTable,
    pub zscores: ZScores,
    pub raw_figure: Figure,
    pub fit_figure: Figure,
    pub z_figure: Figure,
}

impl AnalysisRun {
    /// Raw, fitted and z-score figures, in display order.
    pub fn figures(&self) -> [&Figure; 3] {
        [&self.raw_figure, &self.fit_figure, &self.z_figure]
    }
}

/// Execute the full analysis on an already-cleaned measurement table.
pub fn run_analysis(raw: TraceTable, config: &AnalysisConfig) -> Result<AnalysisRun, AppError> {
    config.validate()?;
    if raw.is_empty() {
        return Err(AppError::no_data("Measurement table is empty."));
    }
    if config.puff_idx > raw.n_samples() {
        info!(
            "Stimulus row {} is past the last sample ({}); baselines use the trailing window",
            config.puff_idx,
            raw.n_samples()
        );
    }

    // 1) Time axis and raw summary.
    let time = time_axis(raw.n_samples(), config.sampling_rate);
    let raw_figure = Figure {
        title: "Raw fluorescence".to_string(),
        y_label: "F".to_string(),
        band: summarize(&raw),
    };

    // 2) Bleaching fit per series.
    let fit = fit_one_phase_decay(&time, &raw, &FitOptions::from(config))?;
    info!("Fitted {}/{} series", fit.n_converged(), raw.n_series());
    let fit_figure = Figure {
        title: "Fitted decay".to_string(),
        y_label: "F".to_string(),
        band: summarize(&fit.curves),
    };

    // 3) Correct and standardize against the pre-stimulus baseline.
    let corrected = raw.subtract(&fit.curves)?;
    let zscores = calculate_zscores(&corrected, config.puff_idx, config.sampling_rate, config.baseline_seconds)?;
    let z_figure = Figure {
        title: "Decay-corrected z-score".to_string(),
        y_label: "z".to_string(),
        band: summarize(&zscores.table),
    };

    Ok(AnalysisRun {
        time,
        raw,
        fit,
        corrected,
        zscores,
        raw_figure,
        fit_figure,
        z_figure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decaying_table(n: usize) -> TraceTable {
        let columns: Vec<Vec<f64>> = (0..3)
            .map(|j| {
                (0..n)
                    .map(|i| {
                        let t = i as f64 / 5.0;
                        // Small deterministic wiggle so baselines have variance.
                        let wiggle = 0.01 * ((i * (j + 3)) as f64).sin();
                        (2.0 + j as f64) * (-0.05 * t).exp() + 1.0 + wiggle
                    })
                    .collect()
            })
            .collect();
        TraceTable::from_columns(&columns).unwrap()
    }

    #[test]
    fn shapes_are_preserved_through_the_pipeline() {
        let config = AnalysisConfig {
            puff_idx: 100,
            ..AnalysisConfig::default()
        };
        let run = run_analysis(decaying_table(200), &config).unwrap();

        assert_eq!(run.time.len(), 200);
        assert_eq!(run.fit.curves.n_samples(), 200);
        assert_eq!(run.fit.params_table().shape(), (3, 3));
        assert_eq!(run.corrected.n_series(), 3);
        assert_eq!(run.zscores.table.n_samples(), 200);
        assert!(run.figures().iter().all(|f| f.band.len() == 200));
        assert_eq!(run.zscores.window, 50..100);
        assert_eq!(run.fit.n_converged(), 3);
    }

    #[test]
    fn invalid_config_is_rejected_before_fitting() {
        let config = AnalysisConfig {
            sampling_rate: 0.0,
            ..AnalysisConfig::default()
        };
        let err = run_analysis(decaying_table(20), &config).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }
}
