use calcium_decay::app::pipeline::run_analysis;
use calcium_decay::data::{SynthConfig, generate_traces};
use calcium_decay::domain::{AnalysisConfig, EdgePolicy, TraceTable, WindowConfig};
use calcium_decay::error::EXIT_INPUT;
use calcium_decay::fit::SeriesFit;
use calcium_decay::io::{load_measurements, read_table, write_report_json, write_summary_csv, write_table};
use calcium_decay::window::window_traces;

fn synth(cells: usize, stimulus: usize) -> TraceTable {
    generate_traces(&SynthConfig {
        cells,
        samples: 2000,
        stimulus_min: stimulus,
        stimulus_max: stimulus,
        ..SynthConfig::default()
    })
    .unwrap()
}

fn bits(table: &TraceTable) -> Vec<u64> {
    table.as_matrix().iter().map(|v| v.to_bits()).collect()
}

#[test]
fn windowing_through_files_keeps_the_marker_row() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("traces.csv");
    let output = dir.path().join("subset_data.csv");

    write_table(&input, &synth(3, 1000), b',').unwrap();
    let table = read_table(&input, b',').unwrap();
    let windowed = window_traces(&table, &WindowConfig::default()).unwrap();
    write_table(&output, &windowed.to_output_table(), b',').unwrap();

    let written = read_table(&output, b',').unwrap();
    assert_eq!(written.n_samples(), 1101);
    assert_eq!(written.n_series(), 3);
    assert!(written.row(0).iter().all(|&v| v == 501.0));
    // Row 1 is value index 1000 - 1 - 500 of the input column.
    assert_eq!(written.get(1, 0), table.get(1 + 499, 0));
}

#[test]
fn analysis_of_windowed_synthetic_traces() {
    let table = synth(4, 1000);
    let windowed = window_traces(&table, &WindowConfig::default()).unwrap();
    let config = AnalysisConfig {
        puff_idx: windowed.stimulus_row(),
        ..AnalysisConfig::default()
    };

    let run = run_analysis(windowed.values.clone(), &config).unwrap();
    assert_eq!(run.zscores.table.n_samples(), 1100);
    assert_eq!(run.zscores.table.n_series(), 4);
    assert_eq!(run.fit.params_table().shape(), (4, 3));
    assert_eq!(run.zscores.window, 450..500);

    // Every bleaching fit must move off the initial guess.
    for (j, series) in run.fit.series.iter().enumerate() {
        let SeriesFit::Converged(fit) = series else {
            panic!("series {j} failed: {series:?}");
        };
        assert!(fit.evaluations > 1, "series {j}: {fit:?}");
        assert_ne!(fit.params.rate, AnalysisConfig::default().initial_rate, "series {j}: {fit:?}");
        assert!(fit.params.rate > 0.0, "series {j}: {fit:?}");
    }

    for (j, baseline) in run.zscores.baselines.iter().enumerate() {
        if !baseline.is_defined() {
            continue;
        }
        let col = run.zscores.table.column(j);
        let mean: f64 = col[450..500].iter().sum::<f64>() / 50.0;
        assert!(mean.abs() < 1e-9, "series {j} baseline mean {mean}");
    }

    let peak = run.z_figure.band.mean[500..]
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    assert!(peak > 3.0, "peak mean z-score {peak}");
}

#[test]
fn identical_input_gives_bit_identical_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let table = synth(3, 900);
    let windowed = window_traces(&table, &WindowConfig::default()).unwrap();
    let config = AnalysisConfig {
        puff_idx: windowed.stimulus_row(),
        ..AnalysisConfig::default()
    };

    let a = run_analysis(windowed.values.clone(), &config).unwrap();
    let b = run_analysis(windowed.values.clone(), &config).unwrap();
    assert_eq!(bits(&a.fit.curves), bits(&b.fit.curves));
    assert_eq!(bits(&a.zscores.table), bits(&b.zscores.table));

    let pa = dir.path().join("a.csv");
    let pb = dir.path().join("b.csv");
    write_summary_csv(&pa, &a).unwrap();
    write_summary_csv(&pb, &b).unwrap();
    assert_eq!(std::fs::read(&pa).unwrap(), std::fs::read(&pb).unwrap());
}

#[test]
fn analyze_file_with_incomplete_rows_and_export_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("measurements.csv");

    let mut text = String::new();
    for i in 0..120 {
        let t = i as f64 / 5.0;
        let a = 3.0 * (-0.05 * t).exp() + 1.0 + 0.01 * (i as f64 * 1.3).sin();
        let b = 2.0 * (-0.08 * t).exp() + 0.5 + 0.01 * (i as f64 * 0.7).cos();
        if i == 10 {
            text.push_str(&format!("{a},\n"));
        } else if i == 11 {
            text.push_str(&format!("inf,{b}\n"));
        } else {
            text.push_str(&format!("{a},{b}\n"));
        }
    }
    std::fs::write(&input, text).unwrap();

    let loaded = load_measurements(&input, b',').unwrap();
    assert_eq!(loaded.rows_read, 120);
    assert_eq!(loaded.rows_dropped, 2);

    let config = AnalysisConfig {
        puff_idx: 80,
        ..AnalysisConfig::default()
    };
    let run = run_analysis(loaded.table, &config).unwrap();
    assert_eq!(run.fit.n_converged(), 2);

    let report = dir.path().join("report.json");
    write_report_json(&report, &run, &config, loaded.rows_dropped).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&report).unwrap()).unwrap();
    assert_eq!(json["rows_dropped"], 2);
    assert_eq!(json["config"]["puff_idx"], 80);
    assert_eq!(json["series"].as_array().unwrap().len(), 2);
    assert_eq!(json["series"][0]["fit"]["status"], "converged");
    assert_eq!(json["series"][1]["baseline"]["status"], "defined");
    assert_eq!(json["figures"].as_array().unwrap().len(), 3);
}

#[test]
fn edge_policy_decides_out_of_range_windows() {
    let table = synth(2, 100);

    let err = window_traces(&table, &WindowConfig::default()).unwrap_err();
    assert_eq!(err.exit_code(), EXIT_INPUT);
    assert!(err.message().starts_with("Column 0:"));

    let clamp = WindowConfig {
        edge_policy: EdgePolicy::Clamp,
        ..WindowConfig::default()
    };
    let windowed = window_traces(&table, &clamp).unwrap();
    assert_eq!(windowed.values.n_samples(), 1100);
    assert!(windowed.reports.iter().all(|r| r.padded_before == 401));
    assert!(windowed.values.get(0, 0).is_nan());
    assert_eq!(windowed.values.get(500, 1), table.get(100, 1));
}

#[test]
fn short_pre_window_keeps_stimulus_and_baseline_aligned() {
    let table = synth(2, 1000);
    let config = WindowConfig {
        pre: 50,
        marker: 51,
        ..WindowConfig::default()
    };
    let windowed = window_traces(&table, &config).unwrap();
    assert_eq!(windowed.values.n_samples(), 650);
    assert_eq!(windowed.stimulus_row(), 50);
    // Event value index 999 sits at table row 1000.
    assert_eq!(windowed.values.get(50, 0), table.get(1000, 0));
    assert!(windowed.to_output_table().row(0).iter().all(|&v| v == 51.0));

    let analysis = AnalysisConfig {
        puff_idx: windowed.stimulus_row(),
        ..AnalysisConfig::default()
    };
    let run = run_analysis(windowed.values.clone(), &analysis).unwrap();
    assert_eq!(run.zscores.window, 0..50);

    let mismatched = WindowConfig {
        pre: 50,
        ..WindowConfig::default()
    };
    let err = window_traces(&table, &mismatched).unwrap_err();
    assert_eq!(err.exit_code(), EXIT_INPUT);
}
