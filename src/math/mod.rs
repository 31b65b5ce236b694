//! Mathematical utilities: descriptive statistics, linear least squares and the
//! Levenberg–Marquardt optimizer used for decay fitting.

pub mod lm;
pub mod ols;
pub mod stats;

pub use lm::*;
pub use ols::*;
pub use stats::*;
