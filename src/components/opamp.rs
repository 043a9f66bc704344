//! Operational amplifier model.
//!
//! A finite-gain voltage-controlled voltage source. The op-amp owns a
//! branch current unknown for its output and stamps the algebraic relation
//!
//! ```text
//! (1/A) * (V(out) - V(ref)) = V(+) - V(-)
//! ```
//!
//! which tends to the ideal virtual short as `A` grows.

use crate::circuit::NodeId;
use crate::solver::MnaSystem;

use super::Stamp;

/// An operational amplifier component.
#[derive(Debug, Clone)]
pub struct OpAmp {
    pub name: String,
    pub nodes: [NodeId; 4], // [non-inverting (+), inverting (-), output, reference]
    pub gain: f64,
    pub branch: NodeId,
}

impl OpAmp {
    /// Create a new op-amp.
    pub fn new(name: impl Into<String>, nodes: [NodeId; 4], gain: f64, branch: NodeId) -> Self {
        Self {
            name: name.into(),
            nodes,
            gain,
            branch,
        }
    }

    /// Get the non-inverting input node.
    pub fn input_pos(&self) -> NodeId {
        self.nodes[0]
    }

    /// Get the inverting input node.
    pub fn input_neg(&self) -> NodeId {
        self.nodes[1]
    }

    /// Get the output node.
    pub fn output(&self) -> NodeId {
        self.nodes[2]
    }

    /// Get the output reference node.
    pub fn reference(&self) -> NodeId {
        self.nodes[3]
    }
}

impl Stamp for OpAmp {
    fn load_linear(&self, mna: &mut MnaSystem) {
        let inv_a = 1.0 / self.gain;
        let br = self.branch;
        mna.gl.add_entry(self.output(), br, 1.0);
        mna.gl.add_entry(self.reference(), br, -1.0);
        mna.gl.add_entry(br, self.output(), inv_a);
        mna.gl.add_entry(br, self.reference(), -inv_a);
        mna.gl.add_entry(br, self.input_pos(), -1.0);
        mna.gl.add_entry(br, self.input_neg(), 1.0);
    }
}
