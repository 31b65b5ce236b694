//! Input/output helpers.
//!
//! - headerless numeric table read/write + cleaning (`table`)
//! - summary band CSV export (`export`)
//! - JSON run report (`run_report`)

pub mod export;
pub mod run_report;
pub mod table;

pub use export::*;
pub use run_report::*;
pub use table::*;
