//! Decay fitting orchestration.
//!
//! Responsibilities:
//!
//! - build the initial guess for each series
//! - run Levenberg–Marquardt per series (parallel)
//! - keep per-series failures as values and reconstruct fixed-shape curve tables

pub mod fitter;
pub mod outcome;

pub use fitter::*;
pub use outcome::*;
