//! Command-line parsing for the calcium decay analysis tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the numeric code.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::EdgePolicy;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "cadecay",
    version,
    about = "Stimulus windowing, bleach correction and baseline z-scores for fluorescence traces"
)]
pub struct Cli {
    /// Field delimiter for every table read or written.
    #[arg(long, global = true, default_value_t = ',')]
    pub delimiter: char,

    /// Raise log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Cut a fixed window around each column's stimulus index.
    Window(WindowArgs),
    /// Fit and remove bleaching, z-score against the pre-stimulus baseline, summarize.
    Analyze(AnalyzeArgs),
    /// Window in memory, then analyze with the stimulus at the window's marker row.
    Run(RunArgs),
    /// Write synthetic traces in the windowing input layout.
    Synth(SynthArgs),
}

/// Windowing parameters shared by `window` and `run`.
#[derive(Debug, Args, Clone)]
pub struct WindowOpts {
    /// Samples kept before the stimulus.
    #[arg(long, default_value_t = 500)]
    pub pre: usize,

    /// Samples kept from the stimulus onwards.
    #[arg(long, default_value_t = 600)]
    pub post: usize,

    /// Constant written in row 0 of every output column [default: pre + 1].
    #[arg(long)]
    pub marker: Option<usize>,

    /// What to do when a window runs past the ends of a column.
    #[arg(long, value_enum, default_value_t = EdgePolicy::Reject)]
    pub edge_policy: EdgePolicy,
}

/// Analysis parameters shared by `analyze` and `run`.
#[derive(Debug, Args, Clone)]
pub struct AnalysisOpts {
    /// Sampling rate (Hz).
    #[arg(long, default_value_t = 5.0)]
    pub sampling_rate: f64,

    /// Baseline window length before the stimulus (seconds).
    #[arg(long, default_value_t = 10.0)]
    pub baseline_seconds: f64,

    /// Initial decay rate guess (1/s).
    #[arg(long, default_value_t = 0.01)]
    pub initial_rate: f64,

    /// Model evaluation budget per series.
    #[arg(long, default_value_t = 10_000)]
    pub max_evaluations: usize,

    /// Write the z-score table (headerless, same layout as the input).
    #[arg(long, value_name = "CSV")]
    pub output: Option<PathBuf>,

    /// Export per-time-point mean/SEM of raw, fitted and z-scored signals to CSV.
    #[arg(long = "export-summary", value_name = "CSV")]
    pub export_summary: Option<PathBuf>,

    /// Export the run report (config, per-series fits and baselines, summaries) to JSON.
    #[arg(long = "export-report", value_name = "JSON")]
    pub export_report: Option<PathBuf>,

    /// Render ASCII plots in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct WindowArgs {
    /// Input table: row 0 holds each column's 1-based stimulus index.
    #[arg(long, value_name = "CSV")]
    pub input: PathBuf,

    /// Output table (marker row followed by the window).
    #[arg(long, value_name = "CSV", default_value = "subset_data.csv")]
    pub output: PathBuf,

    #[command(flatten)]
    pub window: WindowOpts,
}

#[derive(Debug, Parser, Clone)]
pub struct AnalyzeArgs {
    /// Measurement table: every row is a sample, every column a series.
    #[arg(long, value_name = "CSV")]
    pub file: PathBuf,

    /// 0-based row of the stimulus.
    #[arg(long, default_value_t = 505)]
    pub puff_idx: usize,

    #[command(flatten)]
    pub analysis: AnalysisOpts,
}

#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Input table in the windowing layout.
    #[arg(long, value_name = "CSV")]
    pub input: PathBuf,

    /// Also write the windowed table.
    #[arg(long = "windowed-output", value_name = "CSV")]
    pub windowed_output: Option<PathBuf>,

    #[command(flatten)]
    pub window: WindowOpts,

    #[command(flatten)]
    pub analysis: AnalysisOpts,
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output table in the windowing layout.
    #[arg(long, value_name = "CSV")]
    pub output: PathBuf,

    /// Number of cells (columns).
    #[arg(long, default_value_t = 12)]
    pub cells: usize,

    /// Samples per cell.
    #[arg(long, default_value_t = 2000)]
    pub samples: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Sampling rate (Hz) used to place the bleaching decay and puff in time.
    #[arg(long, default_value_t = 5.0)]
    pub sampling_rate: f64,

    /// Smallest 1-based stimulus index.
    #[arg(long, default_value_t = 800)]
    pub stimulus_min: usize,

    /// Largest 1-based stimulus index.
    #[arg(long, default_value_t = 1200)]
    pub stimulus_max: usize,

    /// Standard deviation of the additive noise.
    #[arg(long, default_value_t = 5.0)]
    pub noise: f64,
}
