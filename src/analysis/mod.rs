//! Circuit analyses.
//!
//! Each analysis is a method on [`Circuit`](crate::circuit::Circuit):
//!
//! - [`dc`](crate::circuit::Circuit::dc): operating point
//! - [`tran`](crate::circuit::Circuit::tran): time-domain response with
//!   adaptive steps
//! - [`ac`](crate::circuit::Circuit::ac): small-signal frequency response
//!
//! All of them finalize the circuit on first use and share its solution
//! vector, so a transient or AC run starts from the last operating point.

mod ac;
mod dc;
mod result;
mod transient;

pub use result::{AcResult, DcResult, TransientResult};
