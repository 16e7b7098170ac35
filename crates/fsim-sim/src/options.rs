//! Run configuration.

use fsim_core::Tolerances;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Acceleration applied to tear streams between recycle iterations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceMethod {
    /// Plain fixed-point iteration, optionally relaxed.
    DirectSubstitution = 0,
    #[default]
    Wegstein = 1,
    /// Aitken-type update applied on every other iteration.
    Steffensen = 2,
}

/// How tear streams are seeded for the next time window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrapolationMethod {
    Linear = 0,
    #[default]
    Spline = 1,
    Nearest = 2,
}

/// Options for a flowsheet run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Start of the simulation horizon (s)
    pub start_time: f64,
    /// End of the simulation horizon (s)
    pub end_time: f64,
    /// Length of the first time window (s)
    pub init_window: f64,
    /// Window length below which the run fails (s)
    pub min_window: f64,
    /// Upper clamp for the window length (s)
    pub max_window: f64,
    /// Iterations per window before the run fails
    pub max_iterations: usize,
    /// Shrink the window when a window needs more iterations than this
    pub iters_upper_limit: usize,
    /// Grow the next window when a window needed fewer iterations than this
    pub iters_lower_limit: usize,
    /// Upper limit used for the first window instead of `iters_upper_limit`
    pub iters_first_upper_limit: usize,
    /// Factor for growing or shrinking windows
    pub magnification_ratio: f64,
    pub convergence: ConvergenceMethod,
    /// Upper clamp of the Wegstein q factor
    pub wegstein_accel: f64,
    /// Relaxation for direct substitution, in (0, 2]
    pub relaxation: f64,
    pub extrapolation: ExtrapolationMethod,
    pub tolerances: Tolerances,
    /// Spacing of stored points after data reduction; 0 disables it (s)
    pub save_time_step: f64,
    /// Also reduce unit holdups during data reduction
    pub save_step_applies_to_holdups: bool,
    /// Seed tear streams from the previous run and store new seeds at the end
    pub auto_init_tear_streams: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            end_time: 60.0,
            init_window: 1.0,
            min_window: 1e-9,
            max_window: 1e6,
            max_iterations: 500,
            iters_upper_limit: 7,
            iters_lower_limit: 3,
            iters_first_upper_limit: 20,
            magnification_ratio: 1.2,
            convergence: ConvergenceMethod::default(),
            wegstein_accel: -0.5,
            relaxation: 1.0,
            extrapolation: ExtrapolationMethod::default(),
            tolerances: Tolerances::default(),
            save_time_step: 0.0,
            save_step_applies_to_holdups: true,
            auto_init_tear_streams: true,
        }
    }
}

impl RunOptions {
    pub fn validate(&self) -> SimResult<()> {
        let checks: [(bool, &'static str); 10] = [
            (
                self.start_time >= 0.0 && self.start_time.is_finite(),
                "start_time must be non-negative",
            ),
            (
                self.end_time > self.start_time && self.end_time.is_finite(),
                "end_time must be greater than start_time",
            ),
            (self.init_window > 0.0, "init_window must be positive"),
            (self.min_window > 0.0, "min_window must be positive"),
            (
                self.min_window <= self.max_window,
                "min_window must not exceed max_window",
            ),
            (self.max_iterations > 0, "max_iterations must be positive"),
            (
                self.magnification_ratio >= 1.0,
                "magnification_ratio must be at least 1",
            ),
            (
                self.relaxation > 0.0 && self.relaxation <= 2.0,
                "relaxation must be in (0, 2]",
            ),
            (
                self.tolerances.abs >= 0.0 && self.tolerances.rel >= 0.0,
                "tolerances must be non-negative",
            ),
            (self.save_time_step >= 0.0, "save_time_step must be non-negative"),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some(&(_, what)) => Err(SimError::InvalidArg { what }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_options_defaults() {
        let opts = RunOptions::default();
        assert_eq!(opts.end_time, 60.0);
        assert_eq!(opts.init_window, 1.0);
        assert_eq!(opts.min_window, 1e-9);
        assert_eq!(opts.max_window, 1e6);
        assert_eq!(opts.max_iterations, 500);
        assert_eq!(opts.iters_upper_limit, 7);
        assert_eq!(opts.iters_lower_limit, 3);
        assert_eq!(opts.iters_first_upper_limit, 20);
        assert_eq!(opts.magnification_ratio, 1.2);
        assert_eq!(opts.convergence, ConvergenceMethod::Wegstein);
        assert_eq!(opts.wegstein_accel, -0.5);
        assert_eq!(opts.extrapolation, ExtrapolationMethod::Spline);
        assert_eq!(opts.tolerances.abs, 1e-6);
        assert_eq!(opts.tolerances.rel, 1e-3);
        assert!(opts.auto_init_tear_streams);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn run_options_invalid() {
        let opts = RunOptions {
            min_window: 2.0,
            max_window: 1.0,
            ..RunOptions::default()
        };
        assert!(matches!(opts.validate(), Err(SimError::InvalidArg { .. })));

        let opts = RunOptions {
            relaxation: 0.0,
            ..RunOptions::default()
        };
        assert!(opts.validate().is_err());

        let opts = RunOptions {
            end_time: 0.0,
            ..RunOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn enum_discriminants_are_stable() {
        assert_eq!(ConvergenceMethod::Steffensen as i32, 2);
        assert_eq!(ExtrapolationMethod::Nearest as i32, 2);
    }
}
