//! Diode model.
//!
//! Uses the Shockley diode equation:
//!   I = Is * (exp(V / Vt) - 1)
//!
//! Past an exponent of 50 the exponential is continued by its quadratic
//! Taylor expansion, for both the current and the conductance, so large
//! Newton steps cannot overflow. Negative arguments use `exp(-x) = 1/exp(x)`
//! with the same continuation.

use crate::circuit::NodeId;
use crate::solver::{add_to_rhs, two_terminal_value, Matrix};

use super::Stamp;

/// Saturation current per unit area.
const SATURATION_CURRENT: f64 = 1e-14;

/// Exponent beyond which the quadratic continuation is used.
const EXP_ARG_MAX: f64 = 50.0;

/// Diode flavor, selecting the thermal voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiodeKind {
    /// Silicon junction, Vt = 25.8 mV
    Normal,
    /// Nearly ideal switch, Vt = 0.1 mV
    Ideal,
}

impl DiodeKind {
    /// Parse a netlist `type` property. Anything but `ideal` is a normal diode.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("ideal") {
            Self::Ideal
        } else {
            Self::Normal
        }
    }

    /// Thermal voltage used by this flavor.
    pub fn thermal_voltage(&self) -> f64 {
        match self {
            Self::Normal => 25.8e-3,
            Self::Ideal => 0.1e-3,
        }
    }
}

/// A diode component.
#[derive(Debug, Clone)]
pub struct Diode {
    pub name: String,
    pub nodes: [NodeId; 2], // [anode, cathode]
    pub area: f64,
    pub kind: DiodeKind,
    /// Area-scaled saturation current
    ais: f64,
    vt: f64,
}

impl Diode {
    /// Create a new diode.
    pub fn new(name: impl Into<String>, nodes: [NodeId; 2], area: f64, kind: DiodeKind) -> Self {
        Self {
            name: name.into(),
            nodes,
            area,
            kind,
            ais: area * SATURATION_CURRENT,
            vt: kind.thermal_voltage(),
        }
    }

    /// Current and conductance at junction voltage `vd`.
    pub fn evaluate(&self, vd: f64) -> (f64, f64) {
        let exp_arg = vd / self.vt;
        let exp_max = EXP_ARG_MAX.exp();

        let d_arg = exp_arg.abs() - EXP_ARG_MAX;
        let (mut value, mut slope) = if d_arg > 0.0 {
            (
                exp_max * (1.0 + d_arg + 0.5 * d_arg * d_arg),
                exp_max * (1.0 + d_arg),
            )
        } else {
            let e = exp_arg.abs().exp();
            (e, e)
        };
        if exp_arg < 0.0 {
            value = 1.0 / value;
            slope = value * slope * value;
        }

        let id = self.ais * (value - 1.0);
        let gd = self.ais * slope / self.vt;
        (id, gd)
    }
}

impl Stamp for Diode {
    fn load_dc(&self, g: &mut Matrix, soln: &[f64], rhs: &mut [f64]) {
        let [anode, cathode] = self.nodes;
        let (id, gd) = self.evaluate(two_terminal_value(anode, cathode, soln));
        add_to_rhs(rhs, anode, -id);
        add_to_rhs(rhs, cathode, id);
        g.add_two_terminal(anode, cathode, gd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn diode(kind: DiodeKind) -> Diode {
        Diode::new("D1", [NodeId::unknown(0), NodeId::GROUND], 1.0, kind)
    }

    #[test]
    fn test_diode_forward_bias() {
        let d = diode(DiodeKind::Normal);
        let (i0, _) = d.evaluate(0.0);
        assert!(i0.abs() < 1e-20);

        let (i_small, _) = d.evaluate(0.3);
        let (i_large, g_large) = d.evaluate(0.6);
        assert!(i_large > i_small * 100.0);
        assert_relative_eq!(g_large, (i_large + 1e-14) / 25.8e-3, max_relative = 1e-9);
    }

    #[test]
    fn test_diode_reverse_bias() {
        let d = diode(DiodeKind::Normal);
        let (i_rev, g_rev) = d.evaluate(-1.0);
        assert!(i_rev < 0.0);
        assert!(i_rev > -2e-14);
        assert!(g_rev >= 0.0);
    }

    #[test]
    fn test_quadratic_continuation_is_finite() {
        let d = diode(DiodeKind::Ideal);
        // Exponent of 1e5 would overflow a plain exp()
        let (id, gd) = d.evaluate(10.0);
        assert!(id.is_finite() && gd.is_finite());
        let (id, gd) = d.evaluate(-10.0);
        assert!(id.is_finite() && gd.is_finite());

        // Continuation is smooth at the cutoff
        let n = diode(DiodeKind::Normal);
        let v_cut = EXP_ARG_MAX * 25.8e-3;
        let (below, _) = n.evaluate(v_cut * (1.0 - 1e-9));
        let (above, _) = n.evaluate(v_cut * (1.0 + 1e-9));
        assert_relative_eq!(below, above, max_relative = 1e-6);
    }

    #[test]
    fn test_area_and_kind() {
        let big = Diode::new("D2", [NodeId::unknown(0), NodeId::GROUND], 4.0, DiodeKind::Normal);
        let (i1, _) = diode(DiodeKind::Normal).evaluate(0.5);
        let (i4, _) = big.evaluate(0.5);
        assert_relative_eq!(i4, 4.0 * i1, max_relative = 1e-12);
        assert_eq!(DiodeKind::from_name("ideal"), DiodeKind::Ideal);
        assert_eq!(DiodeKind::from_name("normal"), DiodeKind::Normal);
    }

    #[test]
    fn test_stamp_signs() {
        let d = diode(DiodeKind::Normal);
        let mut g = Matrix::square(1);
        let mut rhs = vec![0.0];
        d.load_dc(&mut g, &[0.6], &mut rhs);
        assert!(rhs[0] < 0.0);
        assert!(g.get(0, 0) > 0.0);
    }
}
