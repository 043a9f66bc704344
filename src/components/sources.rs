//! Independent voltage and current sources.

use crate::circuit::NodeId;
use crate::solver::{add_to_rhs, Matrix, MnaSystem};

use super::waveform::Source;
use super::Stamp;

/// An independent voltage source.
///
/// Voltage sources own a branch current unknown. The branch row enforces
/// `V+ - V- = value`, where the value enters through the right-hand side.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub name: String,
    pub nodes: [NodeId; 2], // [positive, negative]
    pub source: Source,
    pub branch: NodeId,
}

impl VoltageSource {
    /// Create a new voltage source.
    pub fn new(name: impl Into<String>, nodes: [NodeId; 2], source: Source, branch: NodeId) -> Self {
        Self {
            name: name.into(),
            nodes,
            source,
            branch,
        }
    }
}

impl Stamp for VoltageSource {
    fn load_linear(&self, mna: &mut MnaSystem) {
        let [npos, nneg] = self.nodes;
        mna.gl.add_entry(self.branch, npos, 1.0);
        mna.gl.add_entry(self.branch, nneg, -1.0);
        mna.gl.add_entry(npos, self.branch, 1.0);
        mna.gl.add_entry(nneg, self.branch, -1.0);
    }

    fn load_dc(&self, _g: &mut Matrix, _soln: &[f64], rhs: &mut [f64]) {
        add_to_rhs(rhs, self.branch, self.source.dc);
    }

    fn load_tran(&self, _g: &mut Matrix, _soln: &[f64], rhs: &mut [f64], time: f64) {
        add_to_rhs(rhs, self.branch, self.source.value(time));
    }

    fn load_ac(&self, rhs: &mut [f64]) {
        add_to_rhs(rhs, self.branch, 1.0);
    }

    fn breakpoint(&self, time: f64) -> Option<f64> {
        self.source.inflection_point(time)
    }
}

/// An independent current source.
///
/// Current flows from the positive terminal through the source to the
/// negative terminal; it only touches the right-hand side.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    pub name: String,
    pub nodes: [NodeId; 2], // [positive, negative]
    pub source: Source,
}

impl CurrentSource {
    /// Create a new current source.
    pub fn new(name: impl Into<String>, nodes: [NodeId; 2], source: Source) -> Self {
        Self {
            name: name.into(),
            nodes,
            source,
        }
    }

    fn stamp(&self, rhs: &mut [f64], is: f64) {
        let [npos, nneg] = self.nodes;
        add_to_rhs(rhs, npos, -is);
        add_to_rhs(rhs, nneg, is);
    }
}

impl Stamp for CurrentSource {
    fn load_dc(&self, _g: &mut Matrix, _soln: &[f64], rhs: &mut [f64]) {
        self.stamp(rhs, self.source.dc);
    }

    fn load_tran(&self, _g: &mut Matrix, _soln: &[f64], rhs: &mut [f64], time: f64) {
        self.stamp(rhs, self.source.value(time));
    }

    fn load_ac(&self, rhs: &mut [f64]) {
        self.stamp(rhs, 1.0);
    }

    fn breakpoint(&self, time: f64) -> Option<f64> {
        self.source.inflection_point(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voltage_source_topology_rows() {
        let v = VoltageSource::new(
            "V1",
            [NodeId::unknown(0), NodeId::GROUND],
            Source::constant(5.0),
            NodeId::unknown(1),
        );
        let mut mna = MnaSystem::new(2);
        v.load_linear(&mut mna);
        assert_eq!(mna.gl.row(0), &[0.0, 1.0]);
        assert_eq!(mna.gl.row(1), &[1.0, 0.0]);

        let mut rhs = vec![0.0; 2];
        v.load_dc(&mut mna.g, &[0.0, 0.0], &mut rhs);
        assert_eq!(rhs, vec![0.0, 5.0]);

        let mut ac = vec![0.0; 2];
        v.load_ac(&mut ac);
        assert_eq!(ac, vec![0.0, 1.0]);
    }

    #[test]
    fn test_voltage_source_follows_waveform() {
        let v = VoltageSource::new(
            "V1",
            [NodeId::unknown(0), NodeId::GROUND],
            Source::parse("pwl(0,0,1,2)").unwrap(),
            NodeId::unknown(1),
        );
        let mut g = Matrix::square(2);
        let mut rhs = vec![0.0; 2];
        v.load_tran(&mut g, &[0.0, 0.0], &mut rhs, 0.5);
        assert_eq!(rhs[1], 1.0);
        assert_eq!(v.breakpoint(0.5), Some(1.0));
    }

    #[test]
    fn test_current_source_direction() {
        let i = CurrentSource::new(
            "I1",
            [NodeId::unknown(0), NodeId::unknown(1)],
            Source::constant(2e-3),
        );
        let mut g = Matrix::square(2);
        let mut rhs = vec![0.0; 2];
        i.load_dc(&mut g, &[0.0, 0.0], &mut rhs);
        assert_eq!(rhs, vec![-2e-3, 2e-3]);

        let mut ac = vec![0.0; 2];
        i.load_ac(&mut ac);
        assert_eq!(ac, vec![-1.0, 1.0]);
    }
}
