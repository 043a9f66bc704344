//! Circuit representation and validation.
//!
//! The [`Circuit`] struct owns the unknown numbering, the device list and,
//! once finalized, the assembled matrices and solution vector that the
//! analyses in [`crate::analysis`] operate on.

mod graph;
mod types;
mod validate;

pub use graph::Circuit;
pub use types::*;
pub use validate::check_voltage_source_loops;
