//! Time-varying source waveforms.
//!
//! A source is described by text of the form `function(arg1, arg2, ...)` or
//! by a bare number (a constant). Pulse, step, square, triangle and impulse
//! shapes are all reduced to a piecewise-linear table, repeating for the
//! periodic ones.
//!
//! | Function | Arguments (defaults) |
//! |----------|----------------------|
//! | `dc` | value (0) |
//! | `impulse` | height (1), width (1ns) |
//! | `step` | v_init (0), v_plateau (1), t_delay (0), t_rise (1ns) |
//! | `square` | v_init (0), v_plateau (1), freq (1Hz), duty_cycle % (50) |
//! | `triangle` | v_init (0), v_plateau (1), freq (1Hz) |
//! | `pwl`, `pwl_repeating` | t1, v1, t2, v2, ... |
//! | `pulse` | v_init (0), v_plateau (1), t_delay (0), t_rise (1ns), t_fall (1ns), t_width (1e9), t_period (1e9) |
//! | `sin` | v_offset (0), v_amplitude (1), freq (1Hz), t_delay (0), phase_deg (0) |

use std::f64::consts::PI;

use crate::error::{Result, SimError};
use crate::netlist::parse_number;

/// The function named by a source specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFunction {
    Dc,
    Impulse,
    Step,
    Square,
    Triangle,
    Pwl,
    PwlRepeating,
    Pulse,
    Sin,
}

impl SourceFunction {
    /// Look up a function by its specification name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "dc" => Self::Dc,
            "impulse" => Self::Impulse,
            "step" => Self::Step,
            "square" => Self::Square,
            "triangle" => Self::Triangle,
            "pwl" => Self::Pwl,
            "pwl_repeating" => Self::PwlRepeating,
            "pulse" => Self::Pulse,
            "sin" => Self::Sin,
            _ => return None,
        })
    }
}

/// Closed-form shape of a source.
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
    /// Constant value
    Dc(f64),
    /// `offset + amplitude * sin(2π (freq (t - delay) + phase))`, held at
    /// its `t = delay` value before the delay; `phase` is in cycles
    Sin {
        offset: f64,
        amplitude: f64,
        freq: f64,
        delay: f64,
        phase: f64,
    },
    /// Linear interpolation over (time, value) breakpoints, optionally
    /// repeating with the last breakpoint time as period
    Pwl {
        points: Vec<(f64, f64)>,
        repeating: bool,
    },
}

impl Waveform {
    /// Value at time `t`.
    pub fn evaluate(&self, t: f64) -> f64 {
        match self {
            Waveform::Dc(v) => *v,
            Waveform::Sin {
                offset,
                amplitude,
                freq,
                delay,
                phase,
            } => {
                if t < *delay {
                    offset + amplitude * (2.0 * PI * phase).sin()
                } else {
                    offset + amplitude * (2.0 * PI * (freq * (t - delay) + phase)).sin()
                }
            }
            Waveform::Pwl { points, .. } => {
                let Some(&(mut last_t, mut last_v)) = points.first() else {
                    return 0.0;
                };
                let t = self.fold(t).1;
                if t > last_t {
                    for &(next_t, next_v) in &points[1..] {
                        // Out-of-order breakpoints are skipped
                        if next_t > last_t && t < next_t {
                            return last_v + (next_v - last_v) * (t - last_t) / (next_t - last_t);
                        }
                        last_t = next_t;
                        last_v = next_v;
                    }
                }
                last_v
            }
        }
    }

    /// Next time after `t` at which the waveform has a corner.
    pub fn next_breakpoint(&self, t: f64) -> Option<f64> {
        match self {
            Waveform::Dc(_) => None,
            Waveform::Sin { delay, .. } => (t < *delay).then_some(*delay),
            Waveform::Pwl { points, .. } => {
                if points.len() < 2 {
                    return None;
                }
                let (base, local) = self.fold(t);
                if let Some(&(next_t, _)) = points.iter().find(|(pt, _)| local < *pt) {
                    return Some(base + next_t);
                }
                let period = self.period();
                (period > 0.0).then(|| base + period + points[0].0)
            }
        }
    }

    /// Repeat period, 0 when aperiodic.
    pub fn period(&self) -> f64 {
        match self {
            Waveform::Dc(_) => 0.0,
            Waveform::Sin { freq, .. } => {
                if *freq > 0.0 {
                    1.0 / freq
                } else {
                    0.0
                }
            }
            Waveform::Pwl { points, repeating } => match points.last() {
                Some(&(t_last, _)) if *repeating && t_last > 0.0 => t_last,
                _ => 0.0,
            },
        }
    }

    /// Split `t` into the start of its period and the offset within it.
    fn fold(&self, t: f64) -> (f64, f64) {
        let period = match self {
            Waveform::Pwl { .. } => self.period(),
            _ => 0.0,
        };
        if period > 0.0 {
            let base = (t / period).floor() * period;
            (base, t - base)
        } else {
            (0.0, t)
        }
    }
}

/// A parsed source specification.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// Function the specification named
    pub function: SourceFunction,
    /// Arguments with defaults filled in
    pub args: Vec<f64>,
    /// Shape evaluated during transient analysis
    pub waveform: Waveform,
    /// Value at time 0
    pub dc: f64,
    /// Repeat period, 0 when aperiodic
    pub period: f64,
}

impl Source {
    /// A constant source.
    pub fn constant(value: f64) -> Self {
        Self::build(SourceFunction::Dc, vec![value], Waveform::Dc(value))
    }

    /// Parse a source specification such as `"5"`, `"sin(0,1,1k)"` or
    /// `"pwl(0,0,1m,5)"`.
    pub fn parse(spec: &str) -> Result<Self> {
        let Some(open) = spec.find('(') else {
            let value = parse_number(spec)
                .ok_or_else(|| SimError::invalid_source(spec, "not a number"))?;
            return Ok(Self::constant(value));
        };

        let name = spec[..open].trim();
        let function = SourceFunction::from_name(name)
            .ok_or_else(|| SimError::invalid_source(spec, format!("unknown function '{}'", name)))?;

        let body = &spec[open + 1..];
        let body = body.find(')').map_or(body, |end| &body[..end]);
        let args = if body.trim().is_empty() {
            Vec::new()
        } else {
            body.split(',')
                .map(|arg| {
                    let arg = arg.trim();
                    if arg.is_empty() {
                        Ok(None)
                    } else {
                        parse_number(arg).map(Some).ok_or_else(|| {
                            SimError::invalid_source(spec, format!("invalid argument '{}'", arg))
                        })
                    }
                })
                .collect::<Result<Vec<_>>>()?
        };

        Self::from_args(spec, function, &args)
    }

    fn from_args(spec: &str, function: SourceFunction, args: &[Option<f64>]) -> Result<Self> {
        let arg = |i: usize, default: f64| args.get(i).copied().flatten().unwrap_or(default);

        let source = match function {
            SourceFunction::Dc => Self::build(function, vec![arg(0, 0.0)], Waveform::Dc(arg(0, 0.0))),

            SourceFunction::Impulse => {
                let h = arg(0, 1.0);
                let w = arg(1, 1e-9).abs();
                Self::pwl(function, vec![h, w], vec![(0.0, 0.0), (w / 2.0, h), (w, 0.0)], false)
            }

            SourceFunction::Step => {
                let v1 = arg(0, 0.0);
                let v2 = arg(1, 1.0);
                let td = arg(2, 0.0).max(0.0);
                let tr = arg(3, 1e-9).abs();
                Self::pwl(function, vec![v1, v2, td, tr], vec![(td, v1), (td + tr, v2)], false)
            }

            SourceFunction::Square => {
                let v1 = arg(0, 0.0);
                let v2 = arg(1, 1.0);
                let freq = arg(2, 1.0).abs();
                let duty = arg(3, 50.0).abs().min(100.0);
                let args = vec![v1, v2, freq, duty];
                if freq == 0.0 {
                    Self::build(function, args, Waveform::Dc(v1))
                } else {
                    let per = 1.0 / freq;
                    let t_change = 0.01 * per;
                    let t_pw = 0.01 * duty * 0.98 * per;
                    let points = vec![
                        (0.0, v1),
                        (t_change, v2),
                        (t_change + t_pw, v2),
                        (2.0 * t_change + t_pw, v1),
                        (per, v1),
                    ];
                    Self::pwl(function, args, points, true)
                }
            }

            SourceFunction::Triangle => {
                let v1 = arg(0, 0.0);
                let v2 = arg(1, 1.0);
                let freq = arg(2, 1.0).abs();
                let args = vec![v1, v2, freq];
                if freq == 0.0 {
                    Self::build(function, args, Waveform::Dc(v1))
                } else {
                    let per = 1.0 / freq;
                    Self::pwl(function, args, vec![(0.0, v1), (per / 2.0, v2), (per, v1)], true)
                }
            }

            SourceFunction::Pwl | SourceFunction::PwlRepeating => {
                let values = args
                    .iter()
                    .map(|a| a.ok_or_else(|| SimError::invalid_source(spec, "empty breakpoint")))
                    .collect::<Result<Vec<f64>>>()?;
                // A dangling time without a value is dropped
                let points = values.chunks_exact(2).map(|tv| (tv[0], tv[1])).collect();
                Self::pwl(function, values, points, function == SourceFunction::PwlRepeating)
            }

            SourceFunction::Pulse => {
                let v1 = arg(0, 0.0);
                let v2 = arg(1, 1.0);
                let td = arg(2, 0.0).max(0.0);
                let tr = arg(3, 1e-9).abs();
                let tf = arg(4, 1e-9).abs();
                let pw = arg(5, 1e9).abs();
                let per = arg(6, 1e9).abs();

                let t1 = td;
                let t2 = t1 + tr;
                let t3 = t2 + pw;
                let t4 = t3 + tf;
                let points = vec![(t1, v1), (t2, v2), (t3, v2), (t4, v1), (per, v1)];
                Self::pwl(function, vec![v1, v2, td, tr, tf, pw, per], points, true)
            }

            SourceFunction::Sin => {
                let offset = arg(0, 0.0);
                let amplitude = arg(1, 1.0);
                let freq = arg(2, 1.0).abs();
                let delay = arg(3, 0.0).max(0.0);
                let phase_deg = arg(4, 0.0);
                Self::build(
                    function,
                    vec![offset, amplitude, freq, delay, phase_deg],
                    Waveform::Sin {
                        offset,
                        amplitude,
                        freq,
                        delay,
                        phase: phase_deg / 360.0,
                    },
                )
            }
        };
        Ok(source)
    }

    fn pwl(function: SourceFunction, args: Vec<f64>, points: Vec<(f64, f64)>, repeating: bool) -> Self {
        Self::build(function, args, Waveform::Pwl { points, repeating })
    }

    fn build(function: SourceFunction, args: Vec<f64>, waveform: Waveform) -> Self {
        let dc = waveform.evaluate(0.0);
        let period = waveform.period();
        Self {
            function,
            args,
            waveform,
            dc,
            period,
        }
    }

    /// Value at time `t`.
    pub fn value(&self, t: f64) -> f64 {
        self.waveform.evaluate(t)
    }

    /// Next time after `t` at which the source has a corner.
    pub fn inflection_point(&self, t: f64) -> Option<f64> {
        self.waveform.next_breakpoint(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_constant() {
        let s = Source::parse("5").unwrap();
        assert_eq!(s.function, SourceFunction::Dc);
        assert_eq!(s.dc, 5.0);
        assert_eq!(s.value(123.0), 5.0);
        assert_eq!(s.period, 0.0);
        assert_eq!(s.inflection_point(0.0), None);

        let s = Source::parse("dc(2.5k)").unwrap();
        assert_eq!(s.dc, 2500.0);
    }

    #[test]
    fn test_pwl_interpolation() {
        let s = Source::parse("pwl(0,0,1,5,2,0)").unwrap();
        assert_eq!(s.value(0.5), 2.5);
        assert_eq!(s.value(1.5), 2.5);
        assert_eq!(s.value(2.0), 0.0);
        assert_eq!(s.value(7.0), 0.0);
        assert_eq!(s.period, 0.0);
    }

    #[test]
    fn test_pwl_repeating() {
        let s = Source::parse("pwl_repeating(0,0,1,5,2,0)").unwrap();
        assert_eq!(s.period, 2.0);
        assert_eq!(s.value(2.5), 2.5);
        assert_eq!(s.value(4.5), 2.5);
        assert_eq!(s.value(3.0), 5.0);
    }

    #[test]
    fn test_pwl_breakpoints() {
        let s = Source::parse("pwl(0,0,1,5,2,0)").unwrap();
        assert_eq!(s.inflection_point(0.5), Some(1.0));
        assert_eq!(s.inflection_point(1.0), Some(2.0));
        assert_eq!(s.inflection_point(2.5), None);

        let r = Source::parse("pwl_repeating(0,0,1,5,2,0)").unwrap();
        assert_eq!(r.inflection_point(2.5), Some(3.0));
        assert_eq!(r.inflection_point(3.5), Some(4.0));
    }

    #[test]
    fn test_step_defaults() {
        let s = Source::parse("step(0,3,1m)").unwrap();
        assert_eq!(s.args, vec![0.0, 3.0, 1e-3, 1e-9]);
        assert_eq!(s.value(0.5e-3), 0.0);
        assert_eq!(s.value(2e-3), 3.0);
        assert_eq!(s.dc, 0.0);
    }

    #[test]
    fn test_empty_argument_takes_default() {
        let s = Source::parse("step(1,,0)").unwrap();
        assert_eq!(s.args[1], 1.0);
    }

    #[test]
    fn test_square() {
        let s = Source::parse("square(0,1,1k)").unwrap();
        assert_abs_diff_eq!(s.period, 1e-3, epsilon = 1e-15);
        assert_abs_diff_eq!(s.value(0.25e-3), 1.0);
        assert_abs_diff_eq!(s.value(0.75e-3), 0.0);
        assert_abs_diff_eq!(s.value(1.25e-3), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_triangle() {
        let s = Source::parse("triangle(0,2,1)").unwrap();
        assert_eq!(s.period, 1.0);
        assert_abs_diff_eq!(s.value(0.25), 1.0);
        assert_abs_diff_eq!(s.value(0.5), 2.0);
        assert_abs_diff_eq!(s.value(1.25), 1.0);
    }

    #[test]
    fn test_pulse() {
        let s = Source::parse("pulse(0,5,1m,1u,1u,2m,10m)").unwrap();
        assert_eq!(s.period, 10e-3);
        assert_eq!(s.value(0.5e-3), 0.0);
        assert_eq!(s.value(2e-3), 5.0);
        assert_eq!(s.value(5e-3), 0.0);
        assert_eq!(s.value(12e-3), 5.0);
    }

    #[test]
    fn test_impulse() {
        let s = Source::parse("impulse(2,1u)").unwrap();
        assert_abs_diff_eq!(s.value(0.5e-6), 2.0);
        assert_eq!(s.value(2e-6), 0.0);
    }

    #[test]
    fn test_sin() {
        let s = Source::parse("sin(1,2,1k,0,90)").unwrap();
        assert_abs_diff_eq!(s.dc, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.period, 1e-3, epsilon = 1e-15);
        assert_abs_diff_eq!(s.value(0.5e-3), -1.0, epsilon = 1e-9);

        let delayed = Source::parse("sin(0,1,1,0.5)").unwrap();
        assert_eq!(delayed.inflection_point(0.1), Some(0.5));
        assert_eq!(delayed.inflection_point(0.6), None);
        assert_eq!(delayed.value(0.2), 0.0);
    }

    #[test]
    fn test_rejects_bad_specs() {
        assert!(matches!(Source::parse("abc"), Err(SimError::InvalidSource { .. })));
        assert!(matches!(Source::parse("wobble(1,2)"), Err(SimError::InvalidSource { .. })));
        assert!(matches!(Source::parse("sin(0,x)"), Err(SimError::InvalidSource { .. })));
        assert!(matches!(Source::parse("pwl(0,,1,1)"), Err(SimError::InvalidSource { .. })));
    }
}
