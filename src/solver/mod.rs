//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! The linearized circuit is written as
//! ```text
//! C dx/dt = -G x + rhs
//! ```
//! where:
//! - x contains node voltages and branch currents (inductors, voltage
//!   sources, op-amp outputs)
//! - G holds conductances and the +-1 topology entries of branch rows
//! - C holds capacitances and inductances, with many all-zero rows
//! - rhs holds source values
//!
//! Nonlinear devices are relinearized on every Newton iteration, so `G`
//! is rebuilt from the purely linear `Gl` each time.

mod config;
mod matrix;
mod mna;
mod newton;

pub use config::SimulationConfig;
pub use matrix::Matrix;
pub use mna::{add_to_rhs, two_terminal_value, MnaSystem};
pub use newton::{NewtonRaphson, NonConvergence, SolverState};
