//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the time × series table (`TraceTable`) and the time axis helper
//! - decay model parameters (`DecayParams`)
//! - run configuration (`WindowConfig`, `AnalysisConfig`, `EdgePolicy`)

pub mod types;

pub use types::*;
