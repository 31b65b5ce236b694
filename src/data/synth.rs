//! Synthetic fluorescence traces in the windowing input layout.
//!
//! Each cell is a bleaching decay `A·exp(−k·t) + C`, plus a puff-evoked
//! transient starting at a per-cell stimulus index, plus Gaussian noise.
//! Row 0 of every column holds the 1-based stimulus index.

use log::debug;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::Serialize;

use crate::domain::TraceTable;
use crate::error::AppError;

/// Generator settings.
#[derive(Debug, Clone, Serialize)]
pub struct SynthConfig {
    pub cells: usize,
    /// Values per cell (excluding the stimulus row).
    pub samples: usize,
    pub seed: u64,
    pub sampling_rate: f64,
    /// Inclusive range of 1-based stimulus indices.
    pub stimulus_min: usize,
    pub stimulus_max: usize,
    /// Bleaching amplitude `A`.
    pub bleach_amplitude: f64,
    /// Inclusive range the per-cell bleaching rate `k` (1/s) is drawn from.
    pub rate_min: f64,
    pub rate_max: f64,
    /// Resting fluorescence `C`.
    pub offset: f64,
    /// Peak height of the puff transient.
    pub puff_amplitude: f64,
    /// Rise and decay time constants of the transient, in seconds.
    pub puff_rise: f64,
    pub puff_decay: f64,
    /// Standard deviation of the additive noise.
    pub noise: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            cells: 12,
            samples: 2000,
            seed: 42,
            sampling_rate: 5.0,
            stimulus_min: 800,
            stimulus_max: 1200,
            bleach_amplitude: 400.0,
            rate_min: 0.005,
            rate_max: 0.02,
            offset: 1000.0,
            puff_amplitude: 150.0,
            puff_rise: 0.4,
            puff_decay: 3.0,
            noise: 5.0,
        }
    }
}

impl SynthConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.cells == 0 || self.samples == 0 {
            return Err(AppError::input("Cell and sample counts must be > 0."));
        }
        if !(self.sampling_rate.is_finite() && self.sampling_rate > 0.0) {
            return Err(AppError::input("Sampling rate must be positive and finite."));
        }
        if self.stimulus_min == 0 || self.stimulus_min > self.stimulus_max || self.stimulus_max > self.samples {
            return Err(AppError::input(format!(
                "Stimulus range {}..={} must lie within 1..={}.",
                self.stimulus_min, self.stimulus_max, self.samples
            )));
        }
        if !(self.rate_min.is_finite() && self.rate_max.is_finite() && self.rate_min <= self.rate_max) {
            return Err(AppError::input("Invalid bleaching rate range."));
        }
        if !(self.puff_rise > 0.0 && self.puff_decay > self.puff_rise) {
            return Err(AppError::input("Puff time constants must satisfy 0 < rise < decay."));
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(AppError::input("Noise level must be non-negative and finite."));
        }
        Ok(())
    }
}

/// Generate `(samples + 1) × cells` traces; deterministic for a given seed.
pub fn generate_traces(config: &SynthConfig) -> Result<TraceTable, AppError> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, config.noise)
        .map_err(|e| AppError::new(crate::error::EXIT_COMPUTE, format!("Noise distribution error: {e}")))?;

    let columns: Vec<Vec<f64>> = (0..config.cells)
        .map(|cell| {
            let stimulus = rng.gen_range(config.stimulus_min..=config.stimulus_max);
            let rate = rng.gen_range(config.rate_min..=config.rate_max);
            let puff_scale = rng.gen_range(0.5..=1.5);
            debug!("Synthetic cell {cell}: stimulus={stimulus} rate={rate:.4} puff_scale={puff_scale:.2}");

            let t_stim = (stimulus - 1) as f64 / config.sampling_rate;
            let mut column = Vec::with_capacity(config.samples + 1);
            column.push(stimulus as f64);
            for i in 0..config.samples {
                let t = i as f64 / config.sampling_rate;
                let bleach = config.bleach_amplitude * (-rate * t).exp() + config.offset;
                let puff = config.puff_amplitude * puff_scale * transient(t - t_stim, config.puff_rise, config.puff_decay);
                column.push(bleach + puff + normal.sample(&mut rng));
            }
            column
        })
        .collect();

    TraceTable::from_columns(&columns)
}

/// Difference-of-exponentials pulse normalized to a peak of 1; zero before onset.
fn transient(dt: f64, rise: f64, decay: f64) -> f64 {
    if dt < 0.0 {
        return 0.0;
    }
    let t_peak = rise * decay / (decay - rise) * (decay / rise).ln();
    let peak = (-t_peak / decay).exp() - (-t_peak / rise).exp();
    ((-dt / decay).exp() - (-dt / rise).exp()) / peak
}
