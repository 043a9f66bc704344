//! Linear passive components: Resistor, Capacitor, Inductor.
//!
//! All three stamp only at finalize; they contribute nothing per Newton
//! iteration and nothing to the AC excitation.

use crate::circuit::NodeId;
use crate::solver::MnaSystem;

use super::Stamp;

/// A resistor component.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub resistance: f64,
}

impl Resistor {
    /// Create a new resistor. Zero resistance is handled by the circuit,
    /// which substitutes a 0 V source.
    pub fn new(name: impl Into<String>, nodes: [NodeId; 2], resistance: f64) -> Self {
        Self {
            name: name.into(),
            nodes,
            resistance,
        }
    }

    /// Get the conductance (1/R).
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }
}

impl Stamp for Resistor {
    fn load_linear(&self, mna: &mut MnaSystem) {
        mna.gl
            .add_two_terminal(self.nodes[0], self.nodes[1], self.conductance());
    }
}

/// A capacitor component.
///
/// Its capacitance goes into the storage matrix `C`; the transient
/// integrator turns `C dx/dt` into currents, so there is no companion
/// model here.
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub capacitance: f64,
}

impl Capacitor {
    /// Create a new capacitor.
    pub fn new(name: impl Into<String>, nodes: [NodeId; 2], capacitance: f64) -> Self {
        Self {
            name: name.into(),
            nodes,
            capacitance,
        }
    }
}

impl Stamp for Capacitor {
    fn load_linear(&self, mna: &mut MnaSystem) {
        mna.c
            .add_two_terminal(self.nodes[0], self.nodes[1], self.capacitance);
    }
}

/// An inductor component.
///
/// Owns a branch current unknown. The branch row reads
/// `L di/dt = v(n1) - v(n2)`, which makes the inductor a short at DC.
#[derive(Debug, Clone)]
pub struct Inductor {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub inductance: f64,
    pub branch: NodeId,
}

impl Inductor {
    /// Create a new inductor.
    pub fn new(name: impl Into<String>, nodes: [NodeId; 2], inductance: f64, branch: NodeId) -> Self {
        Self {
            name: name.into(),
            nodes,
            inductance,
            branch,
        }
    }
}

impl Stamp for Inductor {
    fn load_linear(&self, mna: &mut MnaSystem) {
        let [n1, n2] = self.nodes;
        let br = self.branch;
        mna.gl.add_entry(n1, br, 1.0);
        mna.gl.add_entry(n2, br, -1.0);
        mna.gl.add_entry(br, n1, -1.0);
        mna.gl.add_entry(br, n2, 1.0);
        mna.c.add_entry(br, br, self.inductance);
    }
}
