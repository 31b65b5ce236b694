//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - windows traces around their stimulus
//! - runs the fit -> z-score -> summary pipeline
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{AnalysisOpts, AnalyzeArgs, Command, RunArgs, SynthArgs, WindowArgs, WindowOpts};
use crate::data::{SynthConfig, generate_traces};
use crate::domain::{AnalysisConfig, TraceTable, WindowConfig};
use crate::error::AppError;
use crate::window::window_traces;

pub mod pipeline;

/// Entry point for the `cadecay` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_logging(cli.verbose);

    let delimiter = delimiter_byte(cli.delimiter)?;
    match cli.command {
        Command::Window(args) => handle_window(args, delimiter),
        Command::Analyze(args) => handle_analyze(args, delimiter),
        Command::Run(args) => handle_run(args, delimiter),
        Command::Synth(args) => handle_synth(args, delimiter),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    // `RUST_LOG` is parsed after the default so it wins.
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

fn delimiter_byte(c: char) -> Result<u8, AppError> {
    u8::try_from(c)
        .ok()
        .filter(|b| b.is_ascii() && *b != b'"' && *b != b'\n' && *b != b'\r')
        .ok_or_else(|| AppError::input(format!("Delimiter must be a single ASCII character, got '{c}'.")))
}

fn handle_window(args: WindowArgs, delimiter: u8) -> Result<(), AppError> {
    let config = window_config_from_args(&args.window);
    let table = crate::io::read_table(&args.input, delimiter)?;
    let windowed = window_traces(&table, &config)?;

    crate::io::write_table(&args.output, &windowed.to_output_table(), delimiter)?;
    println!(
        "Windowed {} series to {} samples (stimulus row {}) -> {}",
        windowed.values.n_series(),
        windowed.values.n_samples(),
        windowed.stimulus_row(),
        args.output.display()
    );
    let padded = windowed.reports.iter().filter(|r| r.is_padded()).count();
    if padded > 0 {
        println!("Padded with empty cells: {padded} series");
    }

    Ok(())
}

fn handle_analyze(args: AnalyzeArgs, delimiter: u8) -> Result<(), AppError> {
    let config = analysis_config_from_args(&args.analysis, args.puff_idx);
    config.validate()?;

    let loaded = crate::io::load_measurements(&args.file, delimiter)?;
    analyze_and_report(loaded.table, &config, loaded.rows_dropped, delimiter)
}

fn handle_run(args: RunArgs, delimiter: u8) -> Result<(), AppError> {
    let window_config = window_config_from_args(&args.window);
    let table = crate::io::read_table(&args.input, delimiter)?;
    let windowed = window_traces(&table, &window_config)?;

    if let Some(path) = &args.windowed_output {
        crate::io::write_table(path, &windowed.to_output_table(), delimiter)?;
    }

    // Rows are not dropped here: clamped padding would shift the stimulus row.
    // Padded series fail their fit and show up as undefined instead.
    let config = analysis_config_from_args(&args.analysis, windowed.stimulus_row());
    info!("Analyzing windowed table with stimulus at row {}", config.puff_idx);
    analyze_and_report(windowed.values, &config, 0, delimiter)
}

fn handle_synth(args: SynthArgs, delimiter: u8) -> Result<(), AppError> {
    let config = SynthConfig {
        cells: args.cells,
        samples: args.samples,
        seed: args.seed,
        sampling_rate: args.sampling_rate,
        stimulus_min: args.stimulus_min,
        stimulus_max: args.stimulus_max,
        noise: args.noise,
        ..SynthConfig::default()
    };
    let table = generate_traces(&config)?;
    crate::io::write_table(&args.output, &table, delimiter)?;
    println!(
        "Wrote {} synthetic cells x {} samples -> {}",
        config.cells,
        config.samples,
        args.output.display()
    );
    Ok(())
}

fn analyze_and_report(
    table: TraceTable,
    config: &AnalysisConfig,
    rows_dropped: usize,
    delimiter: u8,
) -> Result<(), AppError> {
    let run = pipeline::run_analysis(table, config)?;

    println!("{}", crate::report::format_run_summary(&run, config, rows_dropped));

    if config.plot {
        let stimulus_time = run.time.get(config.puff_idx).copied();
        for figure in run.figures() {
            let plot = crate::plot::render_band_plot(
                figure,
                &run.time,
                stimulus_time,
                config.plot_width,
                config.plot_height,
            );
            println!("{plot}");
        }
    }

    // Optional exports.
    if let Some(path) = &config.output {
        crate::io::write_table(path, &run.zscores.table, delimiter)?;
    }
    if let Some(path) = &config.export_summary {
        crate::io::write_summary_csv(path, &run)?;
    }
    if let Some(path) = &config.export_report {
        crate::io::write_report_json(path, &run, config, rows_dropped)?;
    }

    Ok(())
}

pub fn window_config_from_args(args: &WindowOpts) -> WindowConfig {
    WindowConfig {
        pre: args.pre,
        post: args.post,
        marker: args.marker.unwrap_or(args.pre + 1),
        edge_policy: args.edge_policy,
    }
}

pub fn analysis_config_from_args(args: &AnalysisOpts, puff_idx: usize) -> AnalysisConfig {
    AnalysisConfig {
        sampling_rate: args.sampling_rate,
        puff_idx,
        baseline_seconds: args.baseline_seconds,
        initial_rate: args.initial_rate,
        max_evaluations: args.max_evaluations,
        plot: args.plot && !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        output: args.output.clone(),
        export_summary: args.export_summary.clone(),
        export_report: args.export_report.clone(),
    }
}
