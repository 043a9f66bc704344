//! # Cktlab Core
//!
//! A circuit simulator for schematic-capture front ends.
//!
//! This library provides:
//! - A JSON netlist reader for the schematic editor's part list
//! - Modified Nodal Analysis (MNA) assembly with voltage source loop detection
//! - DC operating point, adaptive-step transient and small-signal AC analyses
//! - Linear components (R, C, L), independent sources with time-varying
//!   waveforms, and nonlinear diodes and MOSFETs, plus finite-gain op-amps
//!
//! ## Architecture
//!
//! - [`netlist`] - Netlist input and engineering-notation numbers
//! - [`circuit`] - Unknown numbering, device list and topology checks
//! - [`components`] - Device models and their matrix stamps
//! - [`solver`] - Dense matrices, MNA storage and Newton-Raphson
//! - [`analysis`] - DC, transient and AC analyses and their results
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! cktlab circuit.json tran --points 200 --start 0 --stop 5m --probe out
//! ```
//!
//! ### Library
//!
//! ```no_run
//! use cktlab_core::{Circuit, Netlist};
//!
//! # fn main() -> cktlab_core::Result<()> {
//! let netlist = Netlist::from_file("circuit.json")?;
//! let mut circuit = Circuit::from_netlist(&netlist)?;
//! let op = circuit.dc()?;
//! println!("V(out) = {:?}", op.get("out"));
//! # Ok(())
//! # }
//! ```
//!
//! ### WASM
//!
//! ```javascript
//! import { WasmCircuitSim } from 'cktlab_core';
//!
//! const sim = new WasmCircuitSim(netlistJson);
//! const response = JSON.parse(sim.ac(10, 1, 1e6, "Vin"));
//! ```
//!
//! ## Simulation Method
//!
//! Unknowns are node voltages plus one branch current per voltage source,
//! inductor and op-amp output. The static equations are `G(x) x = b(t)`
//! and the dynamic ones add `C dx/dt`:
//!
//! 1. Linear stamps go into `Gl` and `C` once, at finalize
//! 2. Each Newton iteration rebuilds `G` from `Gl` plus the nonlinear stamps
//! 3. Transient steps blend trapezoidal and backward Euler per unknown and
//!    adapt the step to a local truncation error estimate

pub mod analysis;
pub mod circuit;
pub mod components;
pub mod error;
pub mod netlist;
pub mod solver;

// Re-export main types for convenience
pub use analysis::{AcResult, DcResult, TransientResult};
pub use circuit::Circuit;
pub use error::{Result, SimError};
pub use netlist::Netlist;
pub use solver::SimulationConfig;

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmCircuitSim;
