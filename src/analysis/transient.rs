//! Transient analysis.
//!
//! Integrates `C dx/dt = i(x, t)` with a charge formulation: each step
//! solves
//!
//! ```text
//! beta0 * i(x_n) + beta1 * i(x_{n-1}) - (alpha0 * C x_n + alpha1 * C x_{n-1}) = 0
//! ```
//!
//! by Newton iteration, where `beta0 = beta1 = 1/2` is the trapezoidal rule
//! and `beta0 = 1, beta1 = 0` backward Euler. Rows of `C` that carry no
//! independent dynamics (algebraic rows) always use backward Euler, since
//! averaging their currents would let trapezoidal ringing through.
//!
//! The step is chosen from a local truncation error estimate: the new
//! solution is compared with a quadratic through the three previous points
//! and the step scaled by the cube root of the error ratio.

use std::collections::BTreeMap;

use crate::circuit::Circuit;
use crate::components::{Component, Stamp};
use crate::error::{Result, SimError};
use crate::solver::{Matrix, MnaSystem, NewtonRaphson, SimulationConfig, SolverState};

use super::TransientResult;

/// Integration history and coefficients of the current step.
struct History {
    time: f64,
    oldt: f64,
    old2t: f64,
    old3t: f64,
    alpha0: f64,
    alpha1: f64,
    alpha2: f64,
    beta0: Vec<f64>,
    beta1: Vec<f64>,
    /// Device currents at the latest load
    crnt: Vec<f64>,
    oldcrnt: Vec<f64>,
    /// Charges `C x` at the latest load
    q: Vec<f64>,
    oldq: Vec<f64>,
    old2q: Vec<f64>,
    oldsol: Vec<f64>,
    old2sol: Vec<f64>,
    old3sol: Vec<f64>,
}

impl History {
    fn new(n: usize, tstart: f64, step: f64) -> Self {
        Self {
            time: tstart,
            oldt: tstart - step,
            old2t: tstart - 2.0 * step,
            old3t: tstart - 3.0 * step,
            alpha0: 1.0,
            alpha1: 0.0,
            alpha2: 0.0,
            beta0: vec![1.0; n],
            beta1: vec![0.0; n],
            crnt: vec![0.0; n],
            oldcrnt: vec![0.0; n],
            q: vec![0.0; n],
            oldq: vec![0.0; n],
            old2q: vec![0.0; n],
            oldsol: vec![0.0; n],
            old2sol: vec![0.0; n],
            old3sol: vec![0.0; n],
        }
    }

    /// Shift the latest solution, charges and currents into history.
    fn rotate(&mut self, solution: &[f64]) {
        self.oldcrnt.copy_from_slice(&self.crnt);
        std::mem::swap(&mut self.old3sol, &mut self.old2sol);
        std::mem::swap(&mut self.old2sol, &mut self.oldsol);
        self.oldsol.copy_from_slice(solution);
        std::mem::swap(&mut self.old2q, &mut self.oldq);
        self.oldq.copy_from_slice(&self.q);
    }

    /// Seed all history with the starting point.
    fn fill(&mut self, solution: &[f64]) {
        self.oldsol.copy_from_slice(solution);
        self.old2sol.copy_from_slice(solution);
        self.old3sol.copy_from_slice(solution);
        self.oldq.copy_from_slice(&self.q);
        self.old2q.copy_from_slice(&self.q);
        self.oldcrnt.copy_from_slice(&self.crnt);
    }

    fn set_averaging(&mut self, beta0: f64, beta1: f64, algebraic: &[f64]) {
        for ((b0, b1), &ar) in self.beta0.iter_mut().zip(&mut self.beta1).zip(algebraic) {
            *b0 = beta0 + ar * beta1;
            *b1 = (1.0 - ar) * beta1;
        }
    }

    fn use_backward_euler(&mut self) {
        self.beta0.fill(1.0);
        self.beta1.fill(0.0);
    }
}

/// Assemble `-f(x)` and `df/dx` for one time step.
fn load_tran(
    mna: &mut MnaSystem,
    devices: &[Component],
    h: &mut History,
    soln: &[f64],
    rhs: &mut [f64],
    jacobian: &mut Matrix,
) {
    mna.gl.mul_vec_into(soln, &mut h.crnt, -1.0);
    mna.g.copy_from(&mna.gl);
    for device in devices {
        device.load_tran(&mut mna.g, soln, &mut h.crnt, h.time);
    }
    // Storage elements are linear, so q = C x
    mna.c.mul_vec_into(soln, &mut h.q, 1.0);

    for (i, r) in rhs.iter_mut().enumerate() {
        let dqdt = h.alpha0 * h.q[i] + h.alpha1 * h.oldq[i] + h.alpha2 * h.old2q[i];
        *r = h.beta0[i] * h.crnt[i] + h.beta1[i] * h.oldcrnt[i] - dqdt;
    }
    jacobian.scale_add(&mna.g, &mna.c, &h.beta0, h.alpha0);
}

/// Lagrange weights of `t0`, `t1`, `t2` for the quadratic through them,
/// evaluated at `t`.
fn interp_coeffs(t: f64, t0: f64, t1: f64, t2: f64) -> [f64; 3] {
    let (dtt0, dtt1, dtt2) = (t - t0, t - t1, t - t2);
    let (dt0dt1, dt0dt2, dt1dt2) = (t0 - t1, t0 - t2, t1 - t2);
    [
        (dtt1 * dtt2) / (dt0dt1 * dt0dt2),
        (dtt0 * dtt2) / (-dt0dt1 * dt1dt2),
        (dtt0 * dtt1) / (dt0dt2 * dt1dt2),
    ]
}

/// Number of steps allowed for `periods` cycles of the fastest source.
fn step_budget(periods: f64, steps_per_period: usize) -> usize {
    (periods as usize).saturating_mul(steps_per_period)
}

/// Step bounds derived from the requested interval.
struct StepLimits {
    min: f64,
    max: f64,
}

/// Next step size from the truncation error of the step just solved.
fn pick_step(
    h: &History,
    state: &SolverState,
    ltecheck: &[bool],
    limits: &StepLimits,
    config: &SimulationConfig,
) -> f64 {
    let p = interp_coeffs(h.time, h.oldt, h.old2t, h.old3t);
    let trapcoeff = 0.5 * (h.time - h.oldt) / (h.time - h.old3t);

    let mut max_ratio = 0.0f64;
    for i in (0..state.size()).filter(|&i| ltecheck[i]) {
        let pred = p[0] * h.oldsol[i] + p[1] * h.old2sol[i] + p[2] * h.old3sol[i];
        let lte = (state.solution[i] - pred).abs() * trapcoeff;
        let tol = config.lterel * (state.abstol[i] + config.reltol * state.soln_max[i]);
        max_ratio = max_ratio.max(lte / tol);
    }

    // Trapezoidal error is third order in the step
    let ratio = 1.0 / max_ratio.cbrt();
    let dt = h.time - h.oldt;
    if ratio < 1.0 {
        let ratio = ratio.max(1.0 / config.lte_step_decrease_factor);
        (dt * 0.75 * ratio).max(limits.min)
    } else {
        let ratio = ratio.min(config.step_increase_factor);
        let step = if ratio > 1.2 { dt * ratio / 1.2 } else { dt };
        step.min(limits.max)
    }
}

impl Circuit {
    /// Simulate from `tstart` to `tstop`.
    ///
    /// `npts` sets the maximum step as `span / (periods * npts)`, where
    /// `periods` counts the cycles of the fastest periodic source in the
    /// interval. Unknowns named in `probes` get truncation error control
    /// even when algebraic. Unless `no_dc` is set, the run starts from the
    /// operating point; if that fails it starts from zero.
    pub fn tran<S: AsRef<str>>(
        &mut self,
        npts: usize,
        tstart: f64,
        tstop: f64,
        probes: &[S],
        no_dc: bool,
    ) -> Result<TransientResult> {
        let _span = tracing::info_span!("transient_analysis", npts, tstart, tstop).entered();

        if npts == 0 {
            return Err(SimError::invalid_analysis("number of time points must be positive"));
        }
        if !(tstart.is_finite() && tstop.is_finite() && tstop > tstart) {
            return Err(SimError::invalid_analysis(format!(
                "stop time {} must be after start time {}",
                tstop, tstart
            )));
        }

        if !self.dc_solved && !no_dc {
            if let Err(err) = self.dc() {
                if err.is_structural() {
                    return Err(err);
                }
                tracing::warn!(error = %err, "DC failed, trying transient analysis from zero");
                self.reset();
            }
        }

        let span = tstop - tstart;
        let shortest_period = self
            .devices
            .iter()
            .filter_map(Component::source)
            .map(|s| s.period)
            .filter(|&p| p > 0.0)
            .fold(span, f64::min);
        let periods = (span / shortest_period).ceil().max(1.0);
        let limits = StepLimits {
            max: span / (periods * npts as f64),
            min: span / (periods * npts as f64) / 1e8,
        };
        let mut new_step = limits.max / 1e6;

        let mut probe_rows = Vec::new();
        for probe in probes {
            match self.find_node(probe.as_ref()).and_then(|id| id.index()) {
                Some(i) => probe_rows.push(i),
                None => tracing::debug!(probe = probe.as_ref(), "ignoring unknown probe"),
            }
        }

        let (config, devices, ws) = self.split()?;
        let n = ws.mna.size;
        let max_nsteps = step_budget(periods, config.max_steps_per_period);

        let algebraic: Vec<f64> = ws
            .mna
            .c
            .algebraic_rows(config.eps)
            .into_iter()
            .map(|a| if a { 1.0 } else { 0.0 })
            .collect();
        // Differential unknowns and probes get LTE control
        let mut ltecheck: Vec<bool> = algebraic.iter().map(|&a| a == 0.0).collect();
        for i in probe_rows {
            ltecheck[i] = true;
        }

        let newton = NewtonRaphson::new(config);
        let mna = &mut ws.mna;
        let state = &mut ws.state;

        let mut h = History::new(n, tstart, new_step);
        load_tran(mna, devices, &mut h, &state.solution, &mut state.rhs, &mut state.jacobian);
        h.fill(&state.solution);

        let mut response: Vec<Vec<f64>> = vec![Vec::new(); n];
        let mut times = Vec::new();
        let mut finished = false;

        // Three backward Euler pre-steps at tstart build up history
        let last_step = i64::try_from(max_nsteps).unwrap_or(i64::MAX);
        for step_index in -3..last_step {
            if step_index >= 0 {
                for (trace, &x) in response.iter_mut().zip(&state.solution) {
                    trace.push(x);
                }
            }
            h.rotate(&state.solution);

            let (beta0, beta1) = if step_index < 0 {
                h.old3t = h.old2t - (h.oldt - h.old2t);
                h.old2t = h.oldt - (tstart - h.oldt);
                h.oldt = tstart - (h.time - h.oldt);
                h.time = tstart;
                (1.0, 0.0)
            } else {
                times.push(h.time);
                h.old3t = h.old2t;
                h.old2t = h.oldt;
                h.oldt = h.time;
                // Land on tstop without a sliver of a last step
                if h.time >= tstop {
                    finished = true;
                    break;
                } else if h.time + new_step > tstop {
                    h.time = tstop;
                } else if h.time + 1.5 * new_step > tstop {
                    h.time += (2.0 / 3.0) * (tstop - h.time);
                } else {
                    h.time += new_step;
                }
                (0.5, 0.5)
            };
            h.set_averaging(beta0, beta1, &algebraic);

            loop {
                let dt = h.time - h.oldt;
                h.alpha0 = 1.0 / dt;
                h.alpha1 = -h.alpha0;
                h.alpha2 = 0.0;
                if dt < 1e-4 * tstop {
                    h.use_backward_euler();
                }

                let outcome = newton.find_solution(state, config.tran_max_iters, |x, rhs, jac| {
                    load_tran(mna, devices, &mut h, x, rhs, jac)
                });

                match outcome {
                    Ok(_) if step_index <= 0 || dt < (1.0 + config.reltol) * limits.min => {
                        if step_index > 0 {
                            new_step = config.step_increase_factor * limits.min;
                        }
                        break;
                    }
                    Ok(_) => {
                        new_step = pick_step(&h, state, &ltecheck, &limits, config);
                        if new_step < (1.0 - config.reltol) * dt {
                            tracing::trace!(time = h.oldt, dt, new_step, "step rejected by LTE");
                            h.time = h.oldt + new_step;
                        } else {
                            break;
                        }
                    }
                    Err(failure) => {
                        if dt < limits.min {
                            return Err(SimError::TimestepTooSmall {
                                time: h.oldt,
                                step: dt,
                            });
                        }
                        tracing::debug!(
                            time = h.oldt,
                            dt,
                            iterations = failure.iterations,
                            "Newton failed, shrinking step"
                        );
                        state.solution.copy_from_slice(&h.oldsol);
                        h.time = h.oldt + dt / config.nr_step_decrease_factor;
                    }
                }
            }
        }

        if !finished {
            tracing::warn!(
                steps = max_nsteps,
                time = h.oldt,
                "step budget exhausted before reaching stop time"
            );
        }
        tracing::debug!(points = times.len(), "transient finished");

        // The solution now holds the last time point, not the operating point
        self.dc_solved = false;
        Ok(self.transient_result(times, response))
    }

    fn transient_result(&self, time: Vec<f64>, response: Vec<Vec<f64>>) -> TransientResult {
        let trace = |id: Option<usize>| match id {
            Some(i) => response[i].clone(),
            None => vec![0.0; time.len()],
        };

        let mut traces: BTreeMap<String, Vec<f64>> = self
            .node_map
            .iter()
            .map(|(name, id)| (name.clone(), trace(id.index())))
            .collect();
        for (name, branch) in self.source_branches() {
            traces.insert(format!("I({})", name), trace(branch.index()));
        }
        TransientResult { time, traces }
    }
}
