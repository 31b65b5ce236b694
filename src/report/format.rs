//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the numeric pipeline stays clean and testable
//! - output changes are localized

use crate::app::pipeline::AnalysisRun;
use crate::domain::AnalysisConfig;
use crate::fit::SeriesFit;

/// Dataset, fit and baseline overview plus the per-series failure lists.
pub fn format_run_summary(run: &AnalysisRun, config: &AnalysisConfig, rows_dropped: usize) -> String {
    let mut out = String::new();
    let n_series = run.raw.n_series();
    let n_samples = run.raw.n_samples();

    out.push_str("=== cadecay - decay-corrected z-scores ===\n");
    out.push_str(&format!(
        "Series: n={n_series} | samples={n_samples} | fs={:.3} Hz | duration={:.2} s\n",
        config.sampling_rate,
        run.time.last().copied().unwrap_or(0.0),
    ));
    if rows_dropped > 0 {
        out.push_str(&format!("Dropped rows: {rows_dropped} (empty or non-finite fields)\n"));
    }
    out.push_str(&format!(
        "Stimulus: row {} (t={:.2} s) | baseline rows [{}, {}) = {:.2} s\n",
        config.puff_idx,
        config.puff_idx as f64 / config.sampling_rate,
        run.zscores.window.start,
        run.zscores.window.end,
        run.zscores.window.len() as f64 / config.sampling_rate,
    ));
    out.push_str(&format!("Fits: {}/{n_series} converged\n", run.fit.n_converged()));
    out.push_str(&format!(
        "Baselines: {}/{n_series} defined\n",
        n_series - run.zscores.degenerate().len()
    ));

    out.push_str("\nDecay parameters:\n");
    out.push_str(&format_params_table(&run.fit.series));

    let failures = run.fit.failures();
    if !failures.is_empty() {
        out.push_str("\nFailed fits:\n");
        for (idx, reason) in failures {
            out.push_str(&format!("  series {idx}: {reason}\n"));
        }
    }

    let degenerate = run.zscores.degenerate();
    if !degenerate.is_empty() {
        out.push_str("\nDegenerate baselines:\n");
        for (idx, reason) in degenerate {
            out.push_str(&format!("  series {idx}: {reason}\n"));
        }
    }

    if let Some((row, peak)) = peak_after(&run.z_figure.band.mean, config.puff_idx) {
        out.push_str(&format!(
            "\nPeak mean z-score after stimulus: {peak:.3} at t={:.2} s (n={})\n",
            run.time[row], run.z_figure.band.n_valid[row]
        ));
    }

    out
}

fn format_params_table(series: &[SeriesFit]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>6} {:>12} {:>12} {:>12} {:>12} {:>6}\n",
        "series", "amplitude", "rate", "offset", "sse", "evals"
    ));
    out.push_str(&format!(
        "{:-<6} {:-<12} {:-<12} {:-<12} {:-<12} {:-<6}\n",
        "", "", "", "", "", ""
    ));

    for (idx, s) in series.iter().enumerate() {
        let line = match s {
            SeriesFit::Converged(fit) => format!(
                "{idx:>6} {:>12.5} {:>12.6} {:>12.5} {:>12.4e} {:>6}",
                fit.params.amplitude, fit.params.rate, fit.params.offset, fit.sse, fit.evaluations
            ),
            SeriesFit::Failed(_) => format!(
                "{idx:>6} {:>12} {:>12} {:>12} {:>12} {:>6}",
                "-", "-", "-", "-", "-"
            ),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

/// Largest finite value at or after `from`, with its row.
fn peak_after(values: &[f64], from: usize) -> Option<(usize, f64)> {
    values
        .iter()
        .enumerate()
        .skip(from)
        .filter(|(_, v)| v.is_finite())
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}
