//! Circuit validation.

use crate::error::{Result, SimError};
use crate::solver::Matrix;

/// Check that no voltage sources form a loop.
///
/// The branch rows of the linear conductance matrix are the KVL equations
/// of the voltage sources. Two sources in parallel, or a source shorted by
/// a wire (a zero-ohm resistor becomes a 0 V source), make these rows
/// linearly dependent, so the row block loses rank.
pub fn check_voltage_source_loops(gl: &Matrix, branches: &[usize], eps: f64) -> Result<()> {
    if branches.is_empty() {
        return Ok(());
    }

    let mut gv = Matrix::new(branches.len(), gl.cols());
    for (i, &branch) in branches.iter().enumerate() {
        for j in 0..gl.cols() {
            gv.set(i, j, gl.get(branch, j));
        }
    }

    let rank = gv.rank(eps);
    if rank < branches.len() {
        tracing::debug!(rank, sources = branches.len(), "voltage source rows are dependent");
        return Err(SimError::VoltageSourceLoop);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Unknowns: 0 = node a, 1 and 2 = source branches
    fn two_sources(second_node: f64) -> Matrix {
        let mut gl = Matrix::square(3);
        gl.set(1, 0, 1.0);
        gl.set(0, 1, 1.0);
        gl.set(2, 0, second_node);
        gl.set(0, 2, second_node);
        gl
    }

    #[test]
    fn test_parallel_sources_detected() {
        let gl = two_sources(1.0);
        assert!(matches!(
            check_voltage_source_loops(&gl, &[1, 2], 1e-12),
            Err(SimError::VoltageSourceLoop)
        ));
    }

    #[test]
    fn test_independent_sources_pass() {
        let mut gl = Matrix::square(4);
        gl.set(2, 0, 1.0);
        gl.set(3, 1, 1.0);
        assert!(check_voltage_source_loops(&gl, &[2, 3], 1e-12).is_ok());
        assert!(check_voltage_source_loops(&gl, &[], 1e-12).is_ok());
    }

    #[test]
    fn test_shorted_source_detected() {
        // Source across a wire: both terminals map to ground, row is empty
        let gl = Matrix::square(2);
        assert!(check_voltage_source_loops(&gl, &[1], 1e-12).is_err());
    }
}
