//! Model implementations.
//!
//! Models are implemented as small, pure functions so that fitting code can stay
//! generic over the optimizer.

pub mod model;

pub use model::*;
