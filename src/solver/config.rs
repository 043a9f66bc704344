//! Numerical configuration shared by all analyses.

/// Tolerances, iteration budgets and step-control factors.
///
/// Defaults reproduce the tuning the engine has always shipped with.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Largest Newton update applied to a voltage unknown while limiting (volts)
    pub v_newton_limit: f64,
    /// Absolute tolerance for voltage unknowns
    pub v_abstol: f64,
    /// Absolute tolerance for current unknowns
    pub i_abstol: f64,
    /// Zero threshold relative to one, used by rank tests and pivot fixes
    pub eps: f64,
    /// Newton iteration budget for the operating point
    pub dc_max_iters: usize,
    /// Newton iteration budget per transient time point
    pub tran_max_iters: usize,
    /// Largest factor the LTE controller may grow the step by
    pub step_increase_factor: f64,
    /// Largest factor the LTE controller may shrink the step by in one retry
    pub lte_step_decrease_factor: f64,
    /// Step shrink factor after a Newton failure
    pub nr_step_decrease_factor: f64,
    /// Relative tolerance against the largest magnitude seen per unknown
    pub reltol: f64,
    /// Ratio of LTE tolerance to Newton tolerance
    pub lterel: f64,
    /// Absolute part of the loose residual check
    pub res_check_abs: f64,
    /// Relative part of the loose residual check
    pub res_check_rel: f64,
    /// Transient step budget per period of the fastest periodic source
    pub max_steps_per_period: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let i_abstol = 1e-12;
        let reltol = 1e-4;
        Self {
            v_newton_limit: 0.3,
            v_abstol: 1e-6,
            i_abstol,
            eps: 1e-12,
            dc_max_iters: 1000,
            tran_max_iters: 20,
            step_increase_factor: 2.0,
            lte_step_decrease_factor: 8.0,
            nr_step_decrease_factor: 4.0,
            reltol,
            lterel: 10.0,
            res_check_abs: i_abstol.sqrt(),
            res_check_rel: reltol.sqrt(),
            max_steps_per_period: 50_000,
        }
    }
}

impl SimulationConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the relative tolerance.
    ///
    /// The loose residual check follows it as `sqrt(reltol)`.
    pub fn with_reltol(mut self, reltol: f64) -> Self {
        self.reltol = reltol;
        self.res_check_rel = reltol.sqrt();
        self
    }

    /// Set the absolute tolerances for voltage and current unknowns.
    pub fn with_abstol(mut self, v_abstol: f64, i_abstol: f64) -> Self {
        self.v_abstol = v_abstol;
        self.i_abstol = i_abstol;
        self.res_check_abs = i_abstol.sqrt();
        self
    }

    /// Set the LTE-to-Newton tolerance ratio.
    ///
    /// Lower values tighten transient accuracy at the cost of more steps.
    pub fn with_lterel(mut self, lterel: f64) -> Self {
        self.lterel = lterel;
        self
    }

    /// Set the Newton iteration budgets for DC and per transient step.
    pub fn with_max_iterations(mut self, dc: usize, tran: usize) -> Self {
        self.dc_max_iters = dc;
        self.tran_max_iters = tran;
        self
    }

    /// Set the step growth and shrink factors of the transient controller.
    pub fn with_step_factors(mut self, increase: f64, lte_decrease: f64, nr_decrease: f64) -> Self {
        self.step_increase_factor = increase;
        self.lte_step_decrease_factor = lte_decrease;
        self.nr_step_decrease_factor = nr_decrease;
        self
    }

    /// Set the voltage step limit used while Newton limiting is active.
    pub fn with_newton_limit(mut self, volts: f64) -> Self {
        self.v_newton_limit = volts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_checks_follow_tolerances() {
        let cfg = SimulationConfig::default();
        assert!((cfg.res_check_abs - 1e-6).abs() < 1e-18);
        assert!((cfg.res_check_rel - 1e-2).abs() < 1e-15);

        let cfg = cfg.with_reltol(1e-6).with_abstol(1e-9, 1e-16);
        assert!((cfg.res_check_rel - 1e-3).abs() < 1e-15);
        assert!((cfg.res_check_abs - 1e-8).abs() < 1e-20);
        assert_eq!(cfg.v_abstol, 1e-9);
    }
}
