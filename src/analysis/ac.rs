//! Small-signal AC analysis.
//!
//! Linearizes the circuit at its operating point and solves
//! `(G + jwC) x = b` for a unit excitation of one source. The complex
//! system is carried as a real one of twice the size:
//!
//! ```text
//! [ G  -wC ] [ Re x ]   [ b ]
//! [ wC   G ] [ Im x ] = [ 0 ]
//! ```

use std::collections::BTreeMap;
use std::f64::consts::{LN_10, PI};

use crate::circuit::Circuit;
use crate::components::Stamp;
use crate::error::{Result, SimError};
use crate::solver::Matrix;

use super::result::phase_key;
use super::AcResult;

/// Phase jumps larger than this between points are taken as wraps.
const PHASE_WRAP_THRESHOLD: f64 = 90.0;

impl Circuit {
    /// Sweep the response to `source_name` from `fstart` to `fstop` with
    /// `npts` points per decade.
    ///
    /// The operating point is always recomputed first so the linearization
    /// matches the current circuit.
    pub fn ac(&mut self, npts: usize, fstart: f64, fstop: f64, source_name: &str) -> Result<AcResult> {
        let _span = tracing::info_span!("ac_analysis", source = source_name).entered();

        if npts == 0 {
            return Err(SimError::invalid_analysis("points per decade must be positive"));
        }
        if !(fstart > 0.0 && fstart.is_finite()) {
            return Err(SimError::invalid_analysis(format!(
                "start frequency {} must be positive",
                fstart
            )));
        }
        if !(fstop >= fstart && fstop.is_finite()) {
            return Err(SimError::invalid_analysis(format!(
                "stop frequency {} is below start frequency {}",
                fstop, fstart
            )));
        }
        let source = *self
            .device_map
            .get(source_name)
            .ok_or_else(|| SimError::UnknownSource {
                name: source_name.to_string(),
            })?;
        if self.devices[source].source().is_none() {
            return Err(SimError::UnknownSource {
                name: source_name.to_string(),
            });
        }

        self.dc()?;

        let (config, devices, ws) = self.split()?;
        let n = ws.mna.size;
        let mut rhs = vec![0.0; 2 * n];
        devices[source].load_ac(&mut rhs[..n]);

        // G is still linearized at the operating point from the last DC load
        let mut m = Matrix::square(2 * n);
        for i in 0..n {
            for j in 0..n {
                let g = ws.mna.g.get(i, j);
                m.set(i, j, g);
                m.set(i + n, j + n, g);
            }
        }

        let delta = (LN_10 / npts as f64).exp();
        let fstop = fstop * 1.0001;
        let mut frequencies = Vec::new();
        let mut magnitude: Vec<Vec<f64>> = vec![Vec::new(); n];
        let mut phase: Vec<Vec<f64>> = vec![Vec::new(); n];
        let mut offset = vec![0.0; n];

        let mut freq = fstart;
        while freq <= fstop {
            let omega = 2.0 * PI * freq;
            for i in 0..n {
                for j in 0..n {
                    let wc = omega * ws.mna.c.get(i, j);
                    m.set(i, j + n, -wc);
                    m.set(i + n, j, wc);
                }
            }

            let x = m.solve(&rhs, config.eps);
            for i in 0..n {
                let (re, im) = (x[i], x[i + n]);
                magnitude[i].push(re.hypot(im));

                let mut deg = im.atan2(re) * 180.0 / PI + offset[i];
                if let Some(&prev) = phase[i].last() {
                    let jump = deg - prev;
                    if jump > PHASE_WRAP_THRESHOLD {
                        offset[i] -= 360.0;
                        deg -= 360.0;
                    } else if jump < -PHASE_WRAP_THRESHOLD {
                        offset[i] += 360.0;
                        deg += 360.0;
                    }
                }
                phase[i].push(deg);
            }
            frequencies.push(freq);
            freq *= delta;
        }
        tracing::debug!(points = frequencies.len(), "sweep done");

        let points = frequencies.len();
        let mut traces = BTreeMap::new();
        for (name, id) in &self.node_map {
            let (mag, ph) = match id.index() {
                Some(i) => (magnitude[i].clone(), phase[i].clone()),
                None => (vec![0.0; points], vec![0.0; points]),
            };
            traces.insert(name.clone(), mag);
            traces.insert(phase_key(name), ph);
        }
        Ok(AcResult {
            frequencies,
            traces,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::NodeType;
    use crate::components::Source;
    use approx::assert_relative_eq;

    fn rc_lowpass(r: f64, c: f64) -> Circuit {
        let mut ckt = Circuit::new();
        let gnd = Circuit::gnd_node();
        let vin = ckt.node(Some("in"), NodeType::Voltage, None);
        let out = ckt.node(Some("out"), NodeType::Voltage, None);
        ckt.voltage_source(vin, gnd, Source::constant(0.0), "Vin");
        ckt.resistor(vin, out, r, "R1");
        ckt.capacitor(out, gnd, c, "C1");
        ckt
    }

    #[test]
    fn test_rc_corner() {
        let (r, c) = (1e3, 1e-6);
        let corner = 1.0 / (2.0 * PI * r * c);
        let mut ckt = rc_lowpass(r, c);
        let result = ckt.ac(1, corner, corner, "Vin").unwrap();

        assert_eq!(result.frequencies.len(), 1);
        assert_relative_eq!(result.magnitude("in").unwrap()[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(
            result.magnitude("out").unwrap()[0],
            1.0 / 2f64.sqrt(),
            epsilon = 1e-6
        );
        assert_relative_eq!(result.phase("out").unwrap()[0], -45.0, epsilon = 1e-4);
    }

    #[test]
    fn test_log_sweep_points() {
        let mut ckt = rc_lowpass(1e3, 1e-6);
        let result = ckt.ac(10, 1.0, 1e3, "Vin").unwrap();
        assert_eq!(result.frequencies.len(), 31);
        assert_relative_eq!(*result.frequencies.last().unwrap(), 1e3, max_relative = 1e-9);

        // Low-pass rolls off monotonically towards -90 degrees
        let mag = result.magnitude("out").unwrap();
        assert!(mag.windows(2).all(|w| w[1] < w[0]));
        let ph = result.phase("out").unwrap();
        assert!(ph.iter().all(|&p| p <= 0.0 && p > -90.0));
        assert_eq!(result.magnitude("gnd"), None);
    }

    #[test]
    fn test_phase_continues_past_180() {
        // Four RC sections head towards -360 degrees
        let mut ckt = Circuit::new();
        let gnd = Circuit::gnd_node();
        let vin = ckt.node(Some("in"), NodeType::Voltage, None);
        ckt.voltage_source(vin, gnd, Source::constant(0.0), "Vin");
        let mut prev = vin;
        for k in 0..4 {
            let next = ckt.node(Some(format!("n{}", k).as_str()), NodeType::Voltage, None);
            ckt.resistor(prev, next, 1e3, &format!("R{}", k));
            ckt.capacitor(next, gnd, 1e-6, &format!("C{}", k));
            prev = next;
        }
        let result = ckt.ac(20, 1.0, 1e5, "Vin").unwrap();
        let ph = result.phase("n3").unwrap();
        assert!(ph.windows(2).all(|w| (w[1] - w[0]).abs() < PHASE_WRAP_THRESHOLD));
        assert!(*ph.last().unwrap() < -180.0);
    }

    #[test]
    fn test_unknown_source() {
        let mut ckt = rc_lowpass(1e3, 1e-6);
        assert!(matches!(
            ckt.ac(10, 1.0, 1e3, "V9"),
            Err(SimError::UnknownSource { .. })
        ));
        assert!(matches!(
            ckt.ac(10, 1.0, 1e3, "R1"),
            Err(SimError::UnknownSource { .. })
        ));
    }

    #[test]
    fn test_invalid_sweep() {
        let mut ckt = rc_lowpass(1e3, 1e-6);
        assert!(matches!(
            ckt.ac(0, 1.0, 1e3, "Vin"),
            Err(SimError::InvalidAnalysis { .. })
        ));
        assert!(matches!(
            ckt.ac(10, 0.0, 1e3, "Vin"),
            Err(SimError::InvalidAnalysis { .. })
        ));
        assert!(matches!(
            ckt.ac(10, 1e3, 1.0, "Vin"),
            Err(SimError::InvalidAnalysis { .. })
        ));
    }
}
