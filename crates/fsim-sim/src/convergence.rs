//! Tear-stream convergence test and acceleration.

use fsim_core::{Tolerances, union_sorted, within_tolerance};
use fsim_stream::{MaterialStream, StreamPoint, are_equal};

use crate::error::SimResult;
use crate::executor::Executor;
use crate::options::{ConvergenceMethod, RunOptions};

/// Per-run state of the fixed-point iteration over tear streams.
#[derive(Debug, Clone)]
pub struct ConvergenceEngine {
    method: ConvergenceMethod,
    relaxation: f64,
    accel_limit: f64,
    tolerances: Tolerances,
    steffensen_trigger: bool,
    executor: Executor,
}

impl ConvergenceEngine {
    pub fn new(options: &RunOptions, executor: Executor) -> Self {
        Self {
            method: options.convergence,
            relaxation: options.relaxation,
            accel_limit: options.wegstein_accel,
            tolerances: options.tolerances,
            steffensen_trigger: true,
            executor,
        }
    }

    pub fn method(&self) -> ConvergenceMethod {
        self.method
    }

    /// Whether `current` matches `previous` on their time points in `[t1, t2]`.
    ///
    /// The first point is skipped unless it lies at time 0: it belongs to the
    /// previous, already converged window.
    pub fn compare_streams(&self, current: &MaterialStream, previous: &MaterialStream, t1: f64, t2: f64) -> bool {
        let mut points = union_sorted(
            &current.time_points_in(t1, t2),
            &previous.time_points_in(t1, t2),
        );
        if points.is_empty() {
            return true;
        }
        if points[0] != 0.0 {
            points.remove(0);
        }
        points
            .iter()
            .all(|&t| are_equal(current, previous, t, self.tolerances))
    }

    /// Update the current iterate of every tear stream in place.
    ///
    /// `current[i]` holds the newest values, `previous[i]` and
    /// `pre_previous[i]` the two iterates before it.
    pub fn accelerate(
        &mut self,
        current: &mut [&mut MaterialStream],
        previous: &[MaterialStream],
        pre_previous: &[MaterialStream],
        t1: f64,
        t2: f64,
    ) -> SimResult<()> {
        match self.method {
            ConvergenceMethod::DirectSubstitution if self.relaxation == 1.0 => return Ok(()),
            ConvergenceMethod::Steffensen => {
                self.steffensen_trigger = !self.steffensen_trigger;
                if self.steffensen_trigger {
                    return Ok(());
                }
            }
            _ => {}
        }

        for ((s3, s2), s1) in current.iter_mut().zip(previous).zip(pre_previous) {
            for t in s3.time_points_in(t1, t2) {
                let Some(v3) = s3.point(t) else { continue };
                let v2 = s2.sample(t);
                let v1 = s1.sample(t);
                let predicted = self.predict_point(&v1, &v2, v3);
                s3.set_point(t, predicted)?;
            }
        }
        Ok(())
    }

    fn predict(&self, v1: f64, v2: f64, v3: f64) -> f64 {
        match self.method {
            ConvergenceMethod::DirectSubstitution => relaxation(v2, v3, self.relaxation),
            ConvergenceMethod::Wegstein => wegstein(v3, v2, v2, v1, self.accel_limit, self.tolerances),
            ConvergenceMethod::Steffensen => steffensen(v3, v2, v1, self.tolerances),
        }
    }

    fn predict_point(&self, v1: &StreamPoint, v2: &StreamPoint, v3: &StreamPoint) -> StreamPoint {
        let mut out = v3.clone();
        for ((o, x1), x2) in out.scalars_mut().zip(v1.scalars()).zip(v2.scalars()) {
            *o = self.predict(x1, x2, *o);
        }
        for (phase, o) in out.distributions.iter_mut().enumerate() {
            let (d1, d2, d3) = (&v1.distributions[phase], &v2.distributions[phase], &v3.distributions[phase]);
            self.executor
                .fill(o.as_mut_slice(), |i| self.predict(d1[i], d2[i], d3[i]));
        }
        out
    }
}

/// Relaxed direct substitution: `(1 - w) * f1 + w * f2`.
pub fn relaxation(f1: f64, f2: f64, w: f64) -> f64 {
    (1.0 - w) * f1 + w * f2
}

/// Wegstein update from two function values `f2 = g(x2)`, `f1 = g(x1)`.
///
/// `q` is bounded to `[-5, accel_limit]`; when the arguments are already
/// equal within tolerance the newest value is returned.
pub fn wegstein(f2: f64, f1: f64, x2: f64, x1: f64, accel_limit: f64, tol: Tolerances) -> f64 {
    if within_tolerance(x2, x1, tol) {
        return f2;
    }
    let slope = (f2 - f1) / (x2 - x1);
    let q = (slope / (slope - 1.0)).max(-5.0).min(accel_limit);
    q * x2 + (1.0 - q) * f2
}

/// Steffensen (Aitken) update from three successive iterates.
pub fn steffensen(f3: f64, f2: f64, f1: f64, tol: Tolerances) -> f64 {
    let denominator = f3 - 2.0 * f2 + f1;
    if denominator.abs() <= denominator.abs() * tol.rel + tol.abs {
        return f3;
    }
    f1 - (f2 - f1).powi(2) / denominator
}
