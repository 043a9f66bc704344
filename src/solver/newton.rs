//! Newton-Raphson iteration shared by DC and transient analysis.

use crate::circuit::NodeType;

use super::config::SimulationConfig;
use super::matrix::Matrix;

/// Per-unknown solver state owned by a finalized circuit.
#[derive(Debug, Clone)]
pub struct SolverState {
    /// Voltage or current, per unknown
    pub node_types: Vec<NodeType>,
    /// Absolute tolerance, per unknown
    pub abstol: Vec<f64>,
    /// Largest magnitude seen at a converged point, per unknown
    pub soln_max: Vec<f64>,
    /// Current solution guess
    pub solution: Vec<f64>,
    /// Residual (negative mismatch) from the last load
    pub rhs: Vec<f64>,
    /// Jacobian from the last load
    pub jacobian: Matrix,
}

impl SolverState {
    /// Create state for the given unknowns, seeding any initial conditions.
    pub fn new(node_types: &[NodeType], initial: &[Option<f64>], config: &SimulationConfig) -> Self {
        let size = node_types.len();
        let abstol = node_types
            .iter()
            .map(|t| match t {
                NodeType::Voltage => config.v_abstol,
                NodeType::Current => config.i_abstol,
            })
            .collect();
        let solution = (0..size)
            .map(|i| initial.get(i).copied().flatten().unwrap_or(0.0))
            .collect();
        Self {
            node_types: node_types.to_vec(),
            abstol,
            soln_max: vec![0.0; size],
            solution,
            rhs: vec![0.0; size],
            jacobian: Matrix::square(size),
        }
    }

    /// Number of unknowns.
    pub fn size(&self) -> usize {
        self.node_types.len()
    }
}

/// Newton ran out of iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonConvergence {
    /// Iteration budget that was exhausted
    pub iterations: usize,
    /// Last unknown whose update exceeded its tolerance
    pub unknown: Option<usize>,
}

/// Newton-Raphson solver for nonlinear circuits.
pub struct NewtonRaphson<'a> {
    config: &'a SimulationConfig,
}

impl<'a> NewtonRaphson<'a> {
    /// Create a solver using the given tolerances.
    pub fn new(config: &'a SimulationConfig) -> Self {
        Self { config }
    }

    /// Iterate until both the residual and the update are small.
    ///
    /// `load(solution, rhs, jacobian)` must write `-f(x)` into `rhs` and
    /// `df/dx` into `jacobian`. On success the solution is left in
    /// `state.solution`, `state.soln_max` is updated, and the number of
    /// iterations is returned.
    pub fn find_solution<F>(
        &self,
        state: &mut SolverState,
        max_iters: usize,
        mut load: F,
    ) -> std::result::Result<usize, NonConvergence>
    where
        F: FnMut(&[f64], &mut [f64], &mut Matrix),
    {
        let cfg = self.config;
        let n = state.size();
        let mut d_sol = vec![0.0; n];
        let mut abssum_old = 0.0;
        let mut abssum_compare = 0.0;
        let mut use_limiting = false;
        let mut down_count = 0usize;
        let mut problem = None;

        let mut iter = 0usize;
        while iter < max_iters {
            load(&state.solution, &mut state.rhs, &mut state.jacobian);

            // Voltage unknowns pair with current (KCL) equations
            let abssum_rhs: f64 = state
                .rhs
                .iter()
                .zip(&state.node_types)
                .filter(|(_, t)| **t == NodeType::Voltage)
                .map(|(r, _)| r.abs())
                .sum();

            let mut k = iter;
            if iter > 0 && !use_limiting && abssum_old < abssum_rhs {
                // Previous point was better: back out and retry with limiting
                for (x, d) in state.solution.iter_mut().zip(&d_sol) {
                    *x -= d;
                }
                k -= 1;
                use_limiting = true;
                tracing::debug!(iteration = iter, "residual grew, enabling voltage limiting");
            } else {
                d_sol = state.jacobian.solve_rq(&state.rhs, cfg.eps);

                if abssum_rhs < abssum_old {
                    down_count += 1;
                } else {
                    down_count = 0;
                }
                if down_count > 10 {
                    use_limiting = false;
                    down_count = 0;
                }
                abssum_old = abssum_rhs;
            }

            if k == 0 || abssum_rhs > abssum_compare {
                abssum_compare = abssum_rhs;
            }

            // Loose residual check, waived on the last allowed iteration
            let mut converged = k + 1 >= max_iters
                || abssum_rhs <= cfg.res_check_abs + cfg.res_check_rel * abssum_compare;

            for i in 0..n {
                if use_limiting && state.node_types[i] == NodeType::Voltage {
                    d_sol[i] = d_sol[i].clamp(-cfg.v_newton_limit, cfg.v_newton_limit);
                }
                state.solution[i] += d_sol[i];
                let thresh = state.abstol[i] + cfg.reltol * state.soln_max[i];
                if d_sol[i].abs() > thresh {
                    converged = false;
                    problem = Some(i);
                }
            }

            if converged {
                for (m, x) in state.soln_max.iter_mut().zip(&state.solution) {
                    *m = m.max(x.abs());
                }
                tracing::trace!(iterations = k + 1, "Newton converged");
                return Ok(k + 1);
            }

            iter = k + 1;
        }

        Err(NonConvergence {
            iterations: max_iters,
            unknown: problem,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn voltage_state(n: usize, cfg: &SimulationConfig) -> SolverState {
        SolverState::new(&vec![NodeType::Voltage; n], &[], cfg)
    }

    #[test]
    fn test_linear_system_converges_fast() {
        // 2x = 4 expressed as residual -f = 4 - 2x, jacobian 2
        let cfg = SimulationConfig::default();
        let mut state = voltage_state(1, &cfg);
        let newton = NewtonRaphson::new(&cfg);
        let iters = newton
            .find_solution(&mut state, 50, |x, rhs, jac| {
                rhs[0] = 4.0 - 2.0 * x[0];
                jac.set(0, 0, 2.0);
            })
            .unwrap();
        assert!(iters <= 3);
        assert_abs_diff_eq!(state.solution[0], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(state.soln_max[0], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_nonlinear_scalar() {
        // x^3 = 8
        let cfg = SimulationConfig::default();
        let mut state = voltage_state(1, &cfg);
        state.solution[0] = 1.0;
        let newton = NewtonRaphson::new(&cfg);
        newton
            .find_solution(&mut state, 100, |x, rhs, jac| {
                rhs[0] = 8.0 - x[0].powi(3);
                jac.set(0, 0, 3.0 * x[0] * x[0]);
            })
            .unwrap();
        assert_abs_diff_eq!(state.solution[0], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_reports_non_convergence() {
        // No real root: x^2 + 1 = 0
        let cfg = SimulationConfig::default();
        let mut state = voltage_state(1, &cfg);
        state.solution[0] = 0.5;
        let newton = NewtonRaphson::new(&cfg);
        let err = newton
            .find_solution(&mut state, 30, |x, rhs, jac| {
                rhs[0] = -(x[0] * x[0] + 1.0);
                jac.set(0, 0, 2.0 * x[0]);
            })
            .unwrap_err();
        assert_eq!(err.iterations, 30);
        assert_eq!(err.unknown, Some(0));
    }

    /// Run Newton on `atan(x) = 0` from `x0`, recording every point loaded.
    fn atan_history(node_type: NodeType, x0: f64, max_iters: usize) -> (Vec<f64>, bool) {
        let cfg = SimulationConfig::default();
        let mut state = SolverState::new(&[node_type], &[], &cfg);
        state.solution[0] = x0;
        let mut history = Vec::new();
        let outcome = NewtonRaphson::new(&cfg).find_solution(&mut state, max_iters, |x, rhs, jac| {
            history.push(x[0]);
            rhs[0] = -x[0].atan();
            jac.set(0, 0, 1.0 / (1.0 + x[0] * x[0]));
        });
        (history, outcome.is_ok())
    }

    #[test]
    fn test_limiting_backs_out_growing_residual() {
        let limit = SimulationConfig::default().v_newton_limit;
        let (history, converged) = atan_history(NodeType::Voltage, 10.0, 100);
        assert!(converged);
        assert_abs_diff_eq!(*history.last().unwrap(), 0.0, epsilon = 1e-6);

        // The first full step overshoots to about -138.6
        assert_abs_diff_eq!(history[1], 10.0 - 10f64.atan() * 101.0, epsilon = 1e-9);
        // It is undone and replaced by a clamped step
        assert_abs_diff_eq!(history[2], 10.0 - limit, epsilon = 1e-12);

        let grew: Vec<usize> = (1..history.len())
            .filter(|&i| history[i].abs() > history[i - 1].abs())
            .collect();
        for &i in &grew {
            assert!((history[i] - history[i - 1]).abs() > limit);
            assert!((history[i + 1] - history[i - 1]).abs() <= limit + 1e-12);
        }
        // Limiting switches off after each run of eleven improving steps,
        // and the full step overshoots again twice before the root
        assert_eq!(grew.len(), 3);

        // Between overshoots every accepted update is clamped
        let limited = &history[2..grew[1]];
        assert!(limited.windows(2).all(|w| (w[1] - w[0]).abs() <= limit + 1e-12));
    }

    #[test]
    fn test_current_unknowns_are_never_clamped() {
        let limit = SimulationConfig::default().v_newton_limit;
        let (history, converged) = atan_history(NodeType::Current, 10.0, 3);
        assert!(!converged);
        assert_eq!(history.len(), 3);
        assert_abs_diff_eq!(history[1], 10.0 - 10f64.atan() * 101.0, epsilon = 1e-9);
        assert!(history.windows(2).all(|w| (w[1] - w[0]).abs() > limit));
    }

    #[test]
    fn test_initial_conditions_seed_solution() {
        let cfg = SimulationConfig::default();
        let state = SolverState::new(
            &[NodeType::Voltage, NodeType::Current],
            &[Some(1.5), None],
            &cfg,
        );
        assert_eq!(state.solution, vec![1.5, 0.0]);
        assert_eq!(state.abstol, vec![cfg.v_abstol, cfg.i_abstol]);
    }
}
