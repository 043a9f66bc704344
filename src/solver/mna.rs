//! MNA matrix assembly.
//!
//! Devices stamp into three square matrices sized to the unknown count:
//! `gl` holds the purely linear conductances, `g` is rebuilt from `gl` on
//! every Newton iteration and receives the linearized nonlinear devices,
//! and `c` holds the linear charge/flux storage coefficients.

use crate::circuit::NodeId;

use super::matrix::Matrix;

/// The assembled matrices of a finalized circuit.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    /// Matrix dimension (number of unknowns)
    pub size: usize,
    /// Linear conductances, stamped once at finalize
    pub gl: Matrix,
    /// Working conductance matrix (Jacobian of the static part)
    pub g: Matrix,
    /// Capacitances and inductances
    pub c: Matrix,
}

impl MnaSystem {
    /// Create zeroed matrices for `size` unknowns.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            gl: Matrix::square(size),
            g: Matrix::square(size),
            c: Matrix::square(size),
        }
    }
}

impl Matrix {
    /// Stamp a two-terminal value between nodes i and j:
    ///   M[i,i] += g, M[j,j] += g, M[i,j] -= g, M[j,i] -= g
    /// with ground rows/columns dropped.
    pub fn add_two_terminal(&mut self, i: NodeId, j: NodeId, g: f64) {
        let (i, j) = (i.index(), j.index());
        if let Some(i) = i {
            self.add(i, i, g);
        }
        if let Some(j) = j {
            self.add(j, j, g);
        }
        if let (Some(i), Some(j)) = (i, j) {
            self.add(i, j, -g);
            self.add(j, i, -g);
        }
    }

    /// Add to a single entry unless either index is ground.
    pub fn add_entry(&mut self, i: NodeId, j: NodeId, value: f64) {
        if let (Some(i), Some(j)) = (i.index(), j.index()) {
            self.add(i, j, value);
        }
    }
}

/// Add to a right-hand-side entry unless the node is ground.
pub fn add_to_rhs(rhs: &mut [f64], i: NodeId, value: f64) {
    if let Some(i) = i.index() {
        rhs[i] += value;
    }
}

/// Value of `x[i] - x[j]`, ground reading as zero.
pub fn two_terminal_value(i: NodeId, j: NodeId, x: &[f64]) -> f64 {
    let xi = i.index().map_or(0.0, |i| x[i]);
    let xj = j.index().map_or(0.0, |j| x[j]);
    xi - xj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conductance_stamp() {
        let mut m = Matrix::square(2);
        m.add_two_terminal(NodeId::unknown(0), NodeId::unknown(1), 0.5);
        assert_eq!(m.row(0), &[0.5, -0.5]);
        assert_eq!(m.row(1), &[-0.5, 0.5]);
    }

    #[test]
    fn test_conductance_stamp_to_ground() {
        let mut m = Matrix::square(2);
        m.add_two_terminal(NodeId::GROUND, NodeId::unknown(1), 2.0);
        assert_eq!(m.row(0), &[0.0, 0.0]);
        assert_eq!(m.row(1), &[0.0, 2.0]);
        m.add_entry(NodeId::GROUND, NodeId::unknown(1), 7.0);
        assert_eq!(m.row(1), &[0.0, 2.0]);
    }

    #[test]
    fn test_two_terminal_value() {
        let x = [3.0, 1.0];
        assert_eq!(two_terminal_value(NodeId::unknown(0), NodeId::unknown(1), &x), 2.0);
        assert_eq!(two_terminal_value(NodeId::GROUND, NodeId::unknown(1), &x), -1.0);

        let mut rhs = [0.0; 2];
        add_to_rhs(&mut rhs, NodeId::unknown(1), 4.0);
        add_to_rhs(&mut rhs, NodeId::GROUND, 4.0);
        assert_eq!(rhs, [0.0, 4.0]);
    }
}
