//! Component models for circuit simulation.
//!
//! This module provides models for all supported circuit components:
//! - Linear: Resistor, Capacitor, Inductor
//! - Sources: Voltage Source, Current Source (with time-varying waveforms)
//! - Nonlinear: Diode, MOSFET
//! - Op-Amp (finite-gain VCVS)
//!
//! Each component implements [`Stamp`], contributing to the MNA matrices
//! once at finalize and, when nonlinear or time-varying, on every Newton
//! iteration.

mod diode;
mod fet;
mod linear;
mod opamp;
mod sources;
mod waveform;

pub use diode::{Diode, DiodeKind};
pub use fet::{Fet, FetOperatingPoint, FetType};
pub use linear::{Capacitor, Inductor, Resistor};
pub use opamp::OpAmp;
pub use sources::{CurrentSource, VoltageSource};
pub use waveform::{Source, SourceFunction, Waveform};

use crate::solver::{Matrix, MnaSystem};

/// How a device contributes to the circuit equations.
///
/// `load_dc` and `load_tran` receive the current solution guess and add
/// the device's current into `rhs` as the negative of the KCL mismatch,
/// and its incremental conductance into `g`. Devices without a
/// contribution of some kind keep the default no-op.
pub trait Stamp {
    /// Add the operating-point independent part to `Gl` and `C`.
    fn load_linear(&self, _mna: &mut MnaSystem) {}

    /// Add the DC contribution at `soln`.
    fn load_dc(&self, _g: &mut Matrix, _soln: &[f64], _rhs: &mut [f64]) {}

    /// Add the contribution at `soln` and `time`.
    fn load_tran(&self, g: &mut Matrix, soln: &[f64], rhs: &mut [f64], _time: f64) {
        self.load_dc(g, soln, rhs);
    }

    /// Add the unit small-signal excitation of this device.
    fn load_ac(&self, _rhs: &mut [f64]) {}

    /// Next time after `time` at which the device has a corner.
    fn breakpoint(&self, _time: f64) -> Option<f64> {
        None
    }
}

/// A circuit component.
#[derive(Debug, Clone)]
pub enum Component {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    VoltageSource(VoltageSource),
    CurrentSource(CurrentSource),
    Diode(Diode),
    OpAmp(OpAmp),
    Fet(Fet),
}

impl Component {
    fn as_stamp(&self) -> &dyn Stamp {
        match self {
            Component::Resistor(r) => r,
            Component::Capacitor(c) => c,
            Component::Inductor(l) => l,
            Component::VoltageSource(v) => v,
            Component::CurrentSource(i) => i,
            Component::Diode(d) => d,
            Component::OpAmp(o) => o,
            Component::Fet(m) => m,
        }
    }

    /// Get the component name.
    pub fn name(&self) -> &str {
        match self {
            Component::Resistor(r) => &r.name,
            Component::Capacitor(c) => &c.name,
            Component::Inductor(l) => &l.name,
            Component::VoltageSource(v) => &v.name,
            Component::CurrentSource(i) => &i.name,
            Component::Diode(d) => &d.name,
            Component::OpAmp(o) => &o.name,
            Component::Fet(m) => &m.name,
        }
    }

    /// Waveform driving this component, for independent sources.
    pub fn source(&self) -> Option<&Source> {
        match self {
            Component::VoltageSource(v) => Some(&v.source),
            Component::CurrentSource(i) => Some(&i.source),
            _ => None,
        }
    }

    /// Check if this component is nonlinear (requires Newton-Raphson iteration).
    pub fn is_nonlinear(&self) -> bool {
        matches!(self, Component::Diode(_) | Component::Fet(_))
    }
}

impl Stamp for Component {
    fn load_linear(&self, mna: &mut MnaSystem) {
        self.as_stamp().load_linear(mna);
    }

    fn load_dc(&self, g: &mut Matrix, soln: &[f64], rhs: &mut [f64]) {
        self.as_stamp().load_dc(g, soln, rhs);
    }

    fn load_tran(&self, g: &mut Matrix, soln: &[f64], rhs: &mut [f64], time: f64) {
        self.as_stamp().load_tran(g, soln, rhs, time);
    }

    fn load_ac(&self, rhs: &mut [f64]) {
        self.as_stamp().load_ac(rhs);
    }

    fn breakpoint(&self, time: f64) -> Option<f64> {
        self.as_stamp().breakpoint(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::NodeId;

    #[test]
    fn test_dispatch_and_accessors() {
        let v = Component::VoltageSource(VoltageSource::new(
            "Vin",
            [NodeId::unknown(0), NodeId::GROUND],
            Source::parse("step(0,1,1m)").unwrap(),
            NodeId::unknown(1),
        ));
        assert_eq!(v.name(), "Vin");
        assert!(v.source().is_some());
        assert!(!v.is_nonlinear());
        assert_eq!(v.breakpoint(0.0), Some(1e-3));

        let d = Component::Diode(Diode::new(
            "D1",
            [NodeId::unknown(0), NodeId::GROUND],
            1.0,
            DiodeKind::Normal,
        ));
        assert!(d.is_nonlinear());
        assert!(d.source().is_none());
        assert_eq!(d.breakpoint(0.0), None);
    }

    #[test]
    fn test_passive_devices_ignore_ac_excitation() {
        let r = Component::Resistor(Resistor::new(
            "R1",
            [NodeId::unknown(0), NodeId::GROUND],
            1e3,
        ));
        let mut rhs = vec![0.0];
        r.load_ac(&mut rhs);
        assert_eq!(rhs, vec![0.0]);
    }
}
