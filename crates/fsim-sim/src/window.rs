//! Adaptive time-window sizing for recycle partitions.

use crate::options::RunOptions;

/// Limit that ends a windowed solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowLimit {
    MinimumLength,
    MaximumIterations,
}

impl WindowLimit {
    pub fn message(self) -> &'static str {
        match self {
            WindowLimit::MinimumLength => {
                "The minimum length of the time window is reached. Simulation stopped."
            }
            WindowLimit::MaximumIterations => {
                "Maximum number of iterations has been reached. Simulation will be stopped."
            }
        }
    }
}

/// Current window `[start, end]` over the horizon `[t1, t2]` and its
/// iteration counters.
///
/// `iterations` counts every iteration of the current window, while
/// `window_iterations` restarts whenever the window is shrunk.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeWindowController {
    horizon_start: f64,
    horizon_end: f64,
    start_prev: f64,
    start: f64,
    end: f64,
    length: f64,
    window: usize,
    iterations: usize,
    window_iterations: usize,
    min_length: f64,
    max_length: f64,
    ratio: f64,
    upper: usize,
    lower: usize,
    first_upper: usize,
    max_iterations: usize,
}

impl TimeWindowController {
    pub fn new(t1: f64, t2: f64, options: &RunOptions) -> Self {
        let length = options.init_window.min(options.max_window);
        Self {
            horizon_start: t1,
            horizon_end: t2,
            start_prev: t1,
            start: t1,
            end: (t1 + length).min(t2),
            length,
            window: 0,
            iterations: 0,
            window_iterations: 0,
            min_length: options.min_window,
            max_length: options.max_window,
            ratio: options.magnification_ratio,
            upper: options.iters_upper_limit,
            lower: options.iters_lower_limit,
            first_upper: options.iters_first_upper_limit,
            max_iterations: options.max_iterations,
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    /// Start of the previously converged window.
    pub fn start_prev(&self) -> f64 {
        self.start_prev
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Zero-based number of the current window.
    pub fn window(&self) -> usize {
        self.window
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn window_iterations(&self) -> usize {
        self.window_iterations
    }

    pub fn has_remaining(&self) -> bool {
        self.start < self.horizon_end
    }

    pub fn is_first(&self) -> bool {
        self.start == self.horizon_start
    }

    pub fn is_last(&self) -> bool {
        self.end >= self.horizon_end
    }

    pub fn check_limits(&self) -> Result<(), WindowLimit> {
        if self.length < self.min_length {
            return Err(WindowLimit::MinimumLength);
        }
        if self.iterations >= self.max_iterations {
            return Err(WindowLimit::MaximumIterations);
        }
        Ok(())
    }

    pub fn count_iteration(&mut self) {
        self.iterations += 1;
        self.window_iterations += 1;
    }

    pub fn reset_counters(&mut self) {
        self.iterations = 0;
        self.window_iterations = 0;
    }

    /// Whether the current window needs too many iterations.
    pub fn is_stalled(&self) -> bool {
        let limit = if self.is_first() {
            self.first_upper
        } else {
            self.upper
        };
        self.window_iterations > limit
    }

    /// Shorten the current window by the magnification ratio.
    pub fn shrink(&mut self) {
        self.length /= self.ratio;
        self.end = (self.start + self.length).min(self.horizon_end);
        self.window_iterations = 0;
    }

    /// Move on after convergence, sizing the next window by the effort the
    /// current one needed.
    pub fn advance(&mut self) {
        if self.window_iterations < self.lower {
            self.length *= self.ratio;
        } else if self.window_iterations > self.upper {
            self.length /= self.ratio;
        }
        self.length = self.length.min(self.max_length);
        self.reset_counters();
        self.window += 1;
        self.start_prev = self.start;
        self.start = self.end;
        self.end = (self.end + self.length).min(self.horizon_end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn options() -> RunOptions {
        RunOptions {
            end_time: 10.0,
            ..RunOptions::default()
        }
    }

    #[test]
    fn first_window_starts_at_horizon() {
        let w = TimeWindowController::new(0.0, 10.0, &options());
        assert_eq!((w.start(), w.end(), w.length()), (0.0, 1.0, 1.0));
        assert!(w.is_first());
        assert!(w.check_limits().is_ok());
    }

    #[test]
    fn quick_windows_grow() {
        let mut w = TimeWindowController::new(0.0, 10.0, &options());
        w.count_iteration();
        w.advance();
        assert_eq!(w.window(), 1);
        assert_eq!(w.start_prev(), 0.0);
        assert_eq!(w.start(), 1.0);
        assert!((w.length() - 1.2).abs() < 1e-12);
        assert!((w.end() - 2.2).abs() < 1e-12);
        assert_eq!(w.iterations(), 0);
    }

    #[test]
    fn slow_windows_shrink() {
        let mut w = TimeWindowController::new(0.0, 10.0, &options());
        w.advance();
        for _ in 0..8 {
            w.count_iteration();
        }
        assert!(w.is_stalled());
        w.shrink();
        assert_eq!(w.window_iterations(), 0);
        assert_eq!(w.iterations(), 8);
        assert!((w.end() - (w.start() + w.length())).abs() < 1e-12);
    }

    #[test]
    fn first_window_uses_its_own_limit() {
        let mut w = TimeWindowController::new(0.0, 10.0, &options());
        for _ in 0..8 {
            w.count_iteration();
        }
        assert!(!w.is_stalled());
    }

    #[test]
    fn last_window_is_clipped() {
        let opts = RunOptions {
            init_window: 4.0,
            ..options()
        };
        let mut w = TimeWindowController::new(0.0, 5.0, &opts);
        w.count_iteration();
        w.advance();
        assert_eq!(w.end(), 5.0);
        assert!(w.is_last());
    }

    #[test]
    fn limits_are_reported() {
        let opts = RunOptions {
            max_iterations: 2,
            ..options()
        };
        let mut w = TimeWindowController::new(0.0, 10.0, &opts);
        w.count_iteration();
        w.count_iteration();
        assert_eq!(w.check_limits(), Err(WindowLimit::MaximumIterations));

        let opts = RunOptions {
            init_window: 1e-3,
            min_window: 1e-3,
            magnification_ratio: 2.0,
            ..options()
        };
        let mut w = TimeWindowController::new(0.0, 10.0, &opts);
        w.shrink();
        assert_eq!(w.check_limits(), Err(WindowLimit::MinimumLength));
    }

    proptest! {
        #[test]
        fn length_stays_within_bounds(efforts in prop::collection::vec(0usize..30, 1..60)) {
            let opts = RunOptions {
                end_time: 1e9,
                init_window: 5.0,
                max_window: 8.0,
                min_window: 0.5,
                ..RunOptions::default()
            };
            let mut w = TimeWindowController::new(0.0, 1e9, &opts);
            for effort in efforts {
                for _ in 0..effort {
                    w.count_iteration();
                    if w.is_stalled() {
                        w.shrink();
                    }
                }
                if w.check_limits().is_err() {
                    break;
                }
                prop_assert!(w.length() <= 8.0);
                prop_assert!(w.length() >= 0.5);
                let before = w.end();
                w.advance();
                prop_assert_eq!(w.start(), before);
                prop_assert!(w.length() <= 8.0);
            }
        }
    }
}
