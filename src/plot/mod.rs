//! Terminal rendering of the summary figures.

pub mod ascii;

pub use ascii::*;
