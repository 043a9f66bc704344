//! DC operating point.

use std::collections::BTreeMap;

use crate::circuit::Circuit;
use crate::components::{Component, Stamp};
use crate::error::{Result, SimError};
use crate::solver::{Matrix, MnaSystem, NewtonRaphson};

use super::DcResult;

/// Assemble `-f(x)` and `df/dx` for the static equations.
///
/// `G` is rebuilt from the linear `Gl` and the nonlinear devices stamp on
/// top of it; the Jacobian is a copy of `G`, which AC analysis reuses as
/// the small-signal conductance matrix.
pub(crate) fn load_dc(
    mna: &mut MnaSystem,
    devices: &[Component],
    soln: &[f64],
    rhs: &mut [f64],
    jacobian: &mut Matrix,
) {
    mna.gl.mul_vec_into(soln, rhs, -1.0);
    mna.g.copy_from(&mna.gl);
    for device in devices {
        device.load_dc(&mut mna.g, soln, rhs);
    }
    jacobian.copy_from(&mna.g);
}

impl Circuit {
    /// Find the DC operating point.
    ///
    /// Capacitors are open and inductors shorted; sources take their value
    /// at time zero. On success the solution stays in the circuit as the
    /// starting point for a following transient or AC analysis.
    pub fn dc(&mut self) -> Result<DcResult> {
        let _span = tracing::info_span!("dc_analysis").entered();

        let (config, devices, ws) = self.split()?;
        let newton = NewtonRaphson::new(config);
        let mna = &mut ws.mna;
        let outcome = newton.find_solution(&mut ws.state, config.dc_max_iters, |x, rhs, jac| {
            load_dc(mna, devices, x, rhs, jac)
        });

        match outcome {
            Ok(iterations) => {
                tracing::debug!(iterations, "operating point found");
                self.dc_solved = true;
                Ok(self.dc_result())
            }
            Err(failure) => {
                let hint = if self.current_sources.is_empty() {
                    "Newton Method Failed, it may be your circuit or it may be our simulator"
                } else {
                    "Newton Method Failed, do your current sources have a conductive path to ground?"
                };
                let unknown = failure.unknown.map(|i| self.unknown_name(i));
                tracing::debug!(iterations = failure.iterations, ?unknown, "operating point failed");
                Err(SimError::DcNonConvergence {
                    hint,
                    iterations: failure.iterations,
                    unknown,
                })
            }
        }
    }

    fn dc_result(&self) -> DcResult {
        let solution = self.solution().unwrap_or(&[]);
        let value = |i: Option<usize>| i.and_then(|i| solution.get(i).copied()).unwrap_or(0.0);

        let mut values = BTreeMap::new();
        for (name, id) in &self.node_map {
            values.insert(name.clone(), value(id.index()));
        }
        for (name, branch) in self.source_branches() {
            values.insert(format!("I({})", name), value(branch.index()));
        }
        DcResult { values }
    }
}
