//! Simplified MOSFET model.
//!
//! Square-law device with channel-length modulation and no body effect:
//!
//! ```text
//! saturation (Vgst < Vds):  Ids = 0.5 * beta * (1 + lambda*Vds) * Vgst^2
//! triode:                   Ids = beta * (1 + lambda*Vds) * Vds * (Vgst - Vds/2)
//! ```
//!
//! with `Vgst = Vgs - Vt` and the device off (no contribution at all) when
//! `Vgst <= 0`. Voltages are multiplied by the type sign so the same
//! equations serve N and P devices.

use crate::circuit::NodeId;
use crate::solver::{add_to_rhs, two_terminal_value, Matrix};

use super::Stamp;

/// Threshold voltage (V)
const THRESHOLD: f64 = 0.5;
/// Process transconductance (A/V^2)
const KP: f64 = 20e-6;
/// Channel-length modulation (1/V)
const LAMBDA: f64 = 0.05;

/// Channel polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetType {
    N,
    P,
}

impl FetType {
    fn sign(&self) -> f64 {
        match self {
            FetType::N => 1.0,
            FetType::P => -1.0,
        }
    }
}

/// Drain current and small-signal conductances at an operating point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetOperatingPoint {
    /// Terminal acting as drain for this evaluation
    pub drain: NodeId,
    /// Terminal acting as source for this evaluation
    pub source: NodeId,
    /// Signed drain current
    pub ids: f64,
    /// Output conductance dIds/dVds
    pub gds: f64,
    /// Transconductance dIds/dVgs
    pub gm: f64,
}

/// A MOSFET component.
#[derive(Debug, Clone)]
pub struct Fet {
    pub name: String,
    pub nodes: [NodeId; 3], // [drain, gate, source]
    pub fet_type: FetType,
    /// Width over length ratio
    pub ratio: f64,
    beta: f64,
}

impl Fet {
    /// Create a new FET.
    pub fn new(name: impl Into<String>, nodes: [NodeId; 3], fet_type: FetType, ratio: f64) -> Self {
        Self {
            name: name.into(),
            nodes,
            fet_type,
            ratio,
            beta: KP * ratio,
        }
    }

    /// Evaluate the device at `soln`, or `None` when it is off.
    ///
    /// Drain and source are symmetric: when the signed drain-source voltage
    /// is negative, the two terminals trade roles for this evaluation only.
    pub fn operating_point(&self, soln: &[f64]) -> Option<FetOperatingPoint> {
        let sign = self.fet_type.sign();
        let [mut d, g, mut s] = self.nodes;

        let mut vds = sign * two_terminal_value(d, s, soln);
        if vds < 0.0 {
            std::mem::swap(&mut d, &mut s);
            vds = -vds;
        }
        let vgst = sign * two_terminal_value(g, s, soln) - THRESHOLD;
        if vgst <= 0.0 {
            return None;
        }

        let (ids, gds, gm) = if vgst < vds {
            let gm = self.beta * (1.0 + LAMBDA * vds) * vgst;
            (
                sign * 0.5 * gm * vgst,
                0.5 * self.beta * vgst * vgst * LAMBDA,
                gm,
            )
        } else {
            let gm = self.beta * (1.0 + LAMBDA * vds);
            (
                sign * gm * vds * (vgst - 0.5 * vds),
                gm * (vgst - vds) + self.beta * LAMBDA * vds * (vgst - 0.5 * vds),
                gm * vds,
            )
        };

        Some(FetOperatingPoint {
            drain: d,
            source: s,
            ids,
            gds,
            gm,
        })
    }
}

impl Stamp for Fet {
    fn load_dc(&self, g: &mut Matrix, soln: &[f64], rhs: &mut [f64]) {
        let Some(op) = self.operating_point(soln) else {
            return;
        };
        let gate = self.nodes[1];
        let (d, s) = (op.drain, op.source);

        add_to_rhs(rhs, d, -op.ids);
        add_to_rhs(rhs, s, op.ids);
        g.add_two_terminal(d, s, op.gds);
        g.add_entry(s, s, op.gm);
        g.add_entry(d, s, -op.gm);
        g.add_entry(d, gate, op.gm);
        g.add_entry(s, gate, -op.gm);
    }
}
