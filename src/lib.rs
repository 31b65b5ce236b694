//! `calcium-decay` library crate.
//!
//! The binary (`cadecay`) is a thin wrapper around this library so that:
//!
//! - the numeric pipeline is testable without spawning processes
//! - windowing, fitting and normalization can be reused from other tools
//!
//! Pipeline stages, in order:
//!
//! 1. [`window`]: cut a fixed window around each series' stimulus index
//! 2. [`fit`]: fit `A·exp(−k·t) + C` per series and reconstruct the curves
//! 3. [`normalize`]: z-score the decay-corrected signal against a pre-stimulus baseline
//! 4. [`report`]: cross-series mean ± SEM for reporting and plots

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod normalize;
pub mod plot;
pub mod report;
pub mod window;
