//! Run scheduler: partition loop and windowed recycle solve.
//!
//! A run walks the calculation sequence partition by partition. Acyclic
//! partitions are evaluated once over the whole horizon; cyclic partitions
//! are solved window by window with a fixed-point iteration over their tear
//! streams, see [`Simulator::simulate`].

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fsim_core::timing::{Timer, format_hms};
use fsim_core::{StreamId, TIME_EPS, UnitId, union_sorted};
use fsim_stream::MaterialStream;
use fsim_units::{PortDirection, Severity, Unit, UnitResult};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::convergence::ConvergenceEngine;
use crate::error::{SimError, SimResult};
use crate::executor::Executor;
use crate::flowsheet::{Flowsheet, StreamMap, UnitMap, port_streams, select_streams_mut, stream_ids};
use crate::log::{SharedLog, SimulatorLog};
use crate::options::{ExtrapolationMethod, RunOptions};
use crate::sequence::CalculationSequence;
use crate::window::TimeWindowController;

/// Scheduler state as seen by observers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SimulatorStatus {
    #[default]
    Idle,
    Running,
    ToBeStopped,
}

/// Snapshot of where a run currently is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunProgress {
    pub status: SimulatorStatus,
    pub partition: Option<usize>,
    pub partitions: usize,
    pub window: usize,
    pub iteration: usize,
    pub window_start: f64,
    pub window_end: f64,
}

/// How a run that did not fail ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Stopped,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub wall_time_s: f64,
    pub partitions: usize,
    /// Converged time windows over all cyclic partitions.
    pub windows: usize,
    /// Recycle iterations over all cyclic partitions.
    pub iterations: usize,
}

/// Shared stop flag and progress of one simulator.
///
/// Cloning yields another handle to the same run.
#[derive(Clone, Debug, Default)]
pub struct RunControl {
    stop: Arc<AtomicBool>,
    progress: Arc<Mutex<RunProgress>>,
}

impl RunControl {
    /// Ask a running simulation to stop at its next poll point.
    ///
    /// Ignored while idle.
    pub fn request_stop(&self) {
        let mut progress = self.progress.lock();
        if progress.status != SimulatorStatus::Idle {
            progress.status = SimulatorStatus::ToBeStopped;
            self.stop.store(true, Ordering::Release);
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn status(&self) -> SimulatorStatus {
        self.progress.lock().status
    }

    pub fn progress(&self) -> RunProgress {
        self.progress.lock().clone()
    }

    /// Enter the running state, keeping an already requested stop.
    pub(crate) fn begin(&self) {
        let mut progress = self.progress.lock();
        let status = match progress.status {
            SimulatorStatus::ToBeStopped => SimulatorStatus::ToBeStopped,
            _ => SimulatorStatus::Running,
        };
        *progress = RunProgress {
            status,
            ..RunProgress::default()
        };
    }

    fn finish(&self) {
        self.progress.lock().status = SimulatorStatus::Idle;
        self.stop.store(false, Ordering::Release);
    }

    fn set_partition(&self, partition: usize, partitions: usize) {
        let mut progress = self.progress.lock();
        progress.partition = Some(partition);
        progress.partitions = partitions;
        progress.window = 0;
        progress.iteration = 0;
    }

    fn set_window(&self, window: &TimeWindowController) {
        let mut progress = self.progress.lock();
        progress.window = window.window();
        progress.iteration = window.iterations();
        progress.window_start = window.start();
        progress.window_end = window.end();
    }
}

/// Sequential scheduler of a flowsheet simulation.
#[derive(Debug)]
pub struct Simulator {
    options: RunOptions,
    executor: Executor,
    log: SharedLog,
    control: RunControl,
}

impl Simulator {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            executor: Executor::sequential(),
            log: SimulatorLog::shared(),
            control: RunControl::default(),
        }
    }

    pub fn with_executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: RunOptions) {
        self.options = options;
    }

    pub fn log(&self) -> SharedLog {
        Arc::clone(&self.log)
    }

    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    pub fn status(&self) -> SimulatorStatus {
        self.control.status()
    }

    /// Run the whole flowsheet over `[start_time, end_time]`.
    ///
    /// A stop request ends the run early with [`RunOutcome::Stopped`]; data
    /// computed so far is kept. When tear-stream auto-initialization is on,
    /// the tear values of completed and stopped runs become the seeds of the
    /// next run.
    pub fn simulate(&mut self, flowsheet: &mut Flowsheet) -> SimResult<RunSummary> {
        self.control.begin();
        if let Err(e) = self.options.validate() {
            self.control.finish();
            return Err(e);
        }
        let timer = Timer::start("simulation");
        self.log.lock().clear();

        let mut stats = RunStats::default();
        let mut result = self.run(flowsheet, &mut stats);

        if self.options.auto_init_tear_streams
            && stats.seeded
            && matches!(result, Ok(()) | Err(SimError::Stopped))
        {
            self.log.lock().write_info("Saving new initial values of tear streams...");
            let (_, streams, sequence) = flowsheet.parts_mut();
            if let Err(e) = sequence.copy_tear_to_init(streams, self.options.init_window) {
                result = Err(e);
            }
        }
        self.control.finish();

        let summary = |outcome| RunSummary {
            outcome,
            wall_time_s: timer.elapsed_s(),
            partitions: stats.partitions,
            windows: stats.windows,
            iterations: stats.iterations,
        };
        match result {
            Ok(()) => {
                let text = format!("Simulation finished in {}", format_hms(timer.elapsed()));
                info!(windows = stats.windows, iterations = stats.iterations, "{text}");
                self.log.lock().write_info(text);
                Ok(summary(RunOutcome::Completed))
            }
            Err(SimError::Stopped) => {
                self.log.lock().write_info("Simulation stopped by user.");
                Ok(summary(RunOutcome::Stopped))
            }
            Err(e) => {
                error!("simulation failed: {e}");
                self.log.lock().write_error(e.to_string());
                Err(e)
            }
        }
    }

    fn run(&self, flowsheet: &mut Flowsheet, stats: &mut RunStats) -> SimResult<()> {
        flowsheet.initialize()?;
        let (units, streams, sequence) = flowsheet.parts_mut();

        let plans = partition_plans(sequence, self.options.init_window);
        stats.partitions = plans.len();
        sequence.copy_init_to_tear(streams, self.options.init_window)?;
        stats.seeded = true;

        let mut ctx = RunContext {
            options: &self.options,
            log: &self.log,
            control: &self.control,
            engine: ConvergenceEngine::new(&self.options, self.executor.clone()),
            units,
            streams,
            initialized: HashSet::new(),
            stats,
        };
        for (ip, plan) in plans.iter().enumerate() {
            ctx.control.set_partition(ip, plans.len());
            ctx.run_partition(ip, plan)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RunStats {
    partitions: usize,
    windows: usize,
    iterations: usize,
    seeded: bool,
}

/// Ids of one partition, resolved before the run starts.
#[derive(Debug)]
struct PartitionPlan {
    units: Vec<UnitId>,
    tears: Vec<StreamId>,
    /// Tear streams start from stored seeds rather than defaults.
    from_init: bool,
}

fn partition_plans(sequence: &CalculationSequence, init_window: f64) -> Vec<PartitionPlan> {
    sequence
        .partitions()
        .iter()
        .enumerate()
        .map(|(ip, partition)| PartitionPlan {
            units: partition.units.clone(),
            tears: partition.tear_ids(),
            from_init: (0..partition.tears.len()).any(|j| {
                sequence
                    .seed(ip, j)
                    .is_some_and(|seed| !seed.time_points_in(0.0, init_window).is_empty())
            }),
        })
        .collect()
}

/// Time points at which a steady unit is evaluated on `[t1, t2]`.
///
/// `t2` is always included. With `skip_start`, a leading point at `t1` is
/// dropped since the previous window already computed it.
pub fn steady_time_points(mut points: Vec<f64>, t1: f64, t2: f64, skip_start: bool) -> Vec<f64> {
    if points.last().is_none_or(|&t| (t - t2).abs() > TIME_EPS) {
        points.push(t2);
    }
    if skip_start && points.len() > 1 && (points[0] - t1).abs() <= TIME_EPS {
        points.remove(0);
    }
    points
}

fn check_stop(control: &RunControl) -> SimResult<()> {
    if control.stop_requested() {
        Err(SimError::Stopped)
    } else {
        Ok(())
    }
}

fn missing_unit(id: UnitId) -> SimError {
    SimError::NotFound {
        what: format!("Unit {id}"),
    }
}

fn missing_stream(id: StreamId) -> SimError {
    SimError::NotFound {
        what: format!("Stream {id}"),
    }
}

/// Drain unit messages into the log and turn failures into errors.
fn finish_call(unit: &mut dyn Unit, result: UnitResult<()>, log: &SharedLog) -> SimResult<()> {
    let mut failure = result.err().map(|e| e.to_string());
    let messages = unit.drain_messages();
    {
        let mut log = log.lock();
        for message in messages {
            match message.severity {
                Severity::Info => log.write_info(message.text),
                Severity::Warning => log.write_warning(message.text),
                Severity::Error if failure.is_none() => failure = Some(message.text),
                Severity::Error => log.write_error(message.text),
            }
        }
    }
    match failure {
        Some(message) => Err(SimError::UnitFailure {
            unit: unit.name().to_string(),
            message,
        }),
        None => Ok(()),
    }
}

fn empty_copies(streams: &StreamMap, ids: &[StreamId]) -> SimResult<Vec<MaterialStream>> {
    ids.iter()
        .map(|id| {
            let mut copy = streams.get(id).ok_or_else(|| missing_stream(*id))?.clone();
            copy.remove_all_time_points();
            Ok(copy)
        })
        .collect()
}

fn extrapolate(stream: &mut MaterialStream, method: ExtrapolationMethod, start_prev: f64, start: f64, end: f64) {
    match method {
        ExtrapolationMethod::Linear => stream.extrapolate_linear(end, start_prev, start),
        ExtrapolationMethod::Spline => {
            stream.extrapolate_spline(end, start_prev, (start_prev + start) / 2.0, start)
        }
        ExtrapolationMethod::Nearest => stream.extrapolate_nearest(end, start),
    }
}

/// Borrowed state of one run.
struct RunContext<'a> {
    options: &'a RunOptions,
    log: &'a SharedLog,
    control: &'a RunControl,
    engine: ConvergenceEngine,
    units: &'a mut UnitMap,
    streams: &'a mut StreamMap,
    initialized: HashSet<UnitId>,
    stats: &'a mut RunStats,
}

impl RunContext<'_> {
    fn run_partition(&mut self, ip: usize, plan: &PartitionPlan) -> SimResult<()> {
        info!(
            partition = ip,
            units = plan.units.len(),
            tears = plan.tears.len(),
            "simulating partition"
        );
        let (t1, t2) = (self.options.start_time, self.options.end_time);
        if plan.tears.is_empty() {
            self.simulate_units(&plan.units, t1, t2, false)?;
        } else {
            self.solve_recycle(ip, plan)?;
        }

        self.reduce_data(&plan.units);

        for id in &plan.units {
            let unit = self.units.get_mut(id).ok_or_else(|| missing_unit(*id))?;
            self.log.lock().write_info(format!(
                "Finalization of {} ({})...",
                unit.name(),
                unit.model_name()
            ));
            let result = unit.finalize();
            finish_call(&mut **unit, result, self.log)?;
        }
        Ok(())
    }

    /// Evaluate `ids` in order over `[t1, t2]`.
    fn simulate_units(&mut self, ids: &[UnitId], t1: f64, t2: f64, skip_start: bool) -> SimResult<()> {
        for &id in ids {
            check_stop(self.control)?;
            let unit = self.units.get_mut(&id).ok_or_else(|| missing_unit(id))?;

            if self.initialized.insert(id) {
                self.log.lock().write_info(format!(
                    "Initialization of {} ({})...",
                    unit.name(),
                    unit.model_name()
                ));
                let result = {
                    let mut io = port_streams(unit.ports(), self.streams)?;
                    unit.initialize(t1, &mut io)
                };
                finish_call(&mut **unit, result, self.log)?;
            }

            self.log.lock().write_info(format!(
                "Simulation of {} ({}): [{t1}, {t2}]...",
                unit.name(),
                unit.model_name()
            ));

            for sid in stream_ids(unit.ports(), PortDirection::Outlet) {
                if let Some(stream) = self.streams.get_mut(&sid) {
                    stream.remove_time_points_after(t1, false);
                }
            }

            let mut io = port_streams(unit.ports(), self.streams)?;
            if unit.is_dynamic() {
                let result = unit.simulate_interval(t1, t2, &mut io);
                finish_call(&mut **unit, result, self.log)?;
            } else {
                let points = steady_time_points(
                    union_sorted(&io.input_time_points(t1, t2), &unit.own_time_points(t1, t2)),
                    t1,
                    t2,
                    skip_start,
                );
                for t in points {
                    check_stop(self.control)?;
                    let result = unit.simulate(t, &mut io);
                    finish_call(&mut **unit, result, self.log)?;
                }
            }
        }
        Ok(())
    }

    /// Windowed fixed-point iteration over the tear streams of a partition.
    fn solve_recycle(&mut self, ip: usize, plan: &PartitionPlan) -> SimResult<()> {
        let options = self.options;
        let (t1, t2) = (options.start_time, options.end_time);
        let mut window = TimeWindowController::new(t1, t2, options);
        let mut prev = empty_copies(self.streams, &plan.tears)?;
        let mut prev_prev = empty_copies(self.streams, &plan.tears)?;
        let mut from_init = plan.from_init;

        while window.has_remaining() {
            if let Err(limit) = window.check_limits() {
                return Err(SimError::Fatal {
                    message: limit.message().to_string(),
                    partition: ip,
                    window: window.window(),
                    iteration: window.iterations(),
                });
            }
            check_stop(self.control)?;
            self.control.set_window(&window);

            let (start_prev, start, end) = (window.start_prev(), window.start(), window.end());
            self.log.lock().write_info(format!(
                "Recycle stream. Time window #{}. Iteration #{} [{start}, {end}]...",
                window.window(),
                window.iterations()
            ));

            for ((id, p), pp) in plan.tears.iter().zip(&mut prev).zip(&mut prev_prev) {
                pp.copy_from(p, start_prev, end)?;
                let current = self.streams.get(id).ok_or_else(|| missing_stream(*id))?;
                p.copy_from(current, start_prev, end)?;
            }

            for id in &plan.units {
                if let Some(unit) = self.units.get_mut(id) {
                    unit.load_state();
                }
            }

            self.simulate_units(&plan.units, start, end, !window.is_first())?;
            window.count_iteration();
            self.stats.iterations += 1;

            let mut converged = true;
            for (id, previous) in plan.tears.iter().zip(&prev) {
                let current = self.streams.get(id).ok_or_else(|| missing_stream(*id))?;
                if !self.engine.compare_streams(current, previous, start, end) {
                    converged = false;
                    break;
                }
            }

            if !converged {
                if window.is_first()
                    && window.window_iterations() > options.iters_first_upper_limit
                    && options.auto_init_tear_streams
                    && from_init
                {
                    warn!(partition = ip, "stored tear-stream seeds do not converge, restarting");
                    self.log.lock().write_warning(
                        "Cannot converge using previous results as initial values. \
                         Resetting to defaults and restarting.",
                    );
                    for id in &plan.tears {
                        if let Some(stream) = self.streams.get_mut(id) {
                            stream.remove_all_time_points();
                            stream.add_time_point(0.0);
                        }
                    }
                    prev.iter_mut()
                        .chain(prev_prev.iter_mut())
                        .for_each(MaterialStream::remove_all_time_points);
                    from_init = false;
                    window.reset_counters();
                    continue;
                }

                if window.iterations() > 2 {
                    let mut current = select_streams_mut(self.streams, &plan.tears)?;
                    self.engine
                        .accelerate(&mut current, &prev, &prev_prev, start, end)?;
                }

                if window.is_stalled() {
                    window.shrink();
                    debug!(partition = ip, length = window.length(), "time window reduced");
                }
                continue;
            }

            if window.is_first() && window.iterations() == 1 {
                for (id, previous) in plan.tears.iter().zip(&prev) {
                    let current = self.streams.get_mut(id).ok_or_else(|| missing_stream(*id))?;
                    current.copy_from(previous, start_prev, end)?;
                }
            }

            for id in &plan.units {
                if let Some(unit) = self.units.get_mut(id) {
                    unit.save_state(start, end);
                }
            }
            self.stats.windows += 1;

            if window.is_last() {
                break;
            }
            window.advance();
            debug!(
                partition = ip,
                window = window.window(),
                start = window.start(),
                end = window.end(),
                "time window advanced"
            );
            for id in &plan.tears {
                if let Some(stream) = self.streams.get_mut(id) {
                    extrapolate(
                        stream,
                        options.extrapolation,
                        window.start_prev(),
                        window.start(),
                        window.end(),
                    );
                }
            }
        }
        Ok(())
    }

    /// Thin out inlet streams and holdups of finished units.
    fn reduce_data(&mut self, ids: &[UnitId]) {
        let step = self.options.save_time_step;
        if step <= 0.0 {
            return;
        }
        let (t1, t2) = (self.options.start_time, self.options.end_time);
        let start = t1.min(t2 - 2.0 * step).max(0.0);
        for id in ids {
            let Some(unit) = self.units.get_mut(id) else {
                continue;
            };
            for sid in stream_ids(unit.ports(), PortDirection::Inlet) {
                if let Some(stream) = self.streams.get_mut(&sid) {
                    stream.reduce_time_points(start, t2, step);
                }
            }
            if self.options.save_step_applies_to_holdups {
                unit.reduce_holdups(start, t2, step);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_points_always_end_at_window_end() {
        assert_eq!(steady_time_points(vec![], 0.0, 10.0, false), vec![10.0]);
        assert_eq!(steady_time_points(vec![0.0, 5.0], 0.0, 10.0, false), vec![0.0, 5.0, 10.0]);
        assert_eq!(steady_time_points(vec![0.0, 10.0], 0.0, 10.0, false), vec![0.0, 10.0]);
    }

    #[test]
    fn steady_points_skip_solved_window_start() {
        assert_eq!(steady_time_points(vec![2.0, 3.0], 2.0, 4.0, true), vec![3.0, 4.0]);
        assert_eq!(steady_time_points(vec![2.5], 2.0, 4.0, true), vec![2.5, 4.0]);
        assert_eq!(steady_time_points(vec![0.0], 0.0, 1.0, false), vec![0.0, 1.0]);
    }

    #[test]
    fn stop_is_ignored_while_idle() {
        let control = RunControl::default();
        control.request_stop();
        assert!(!control.stop_requested());
        assert_eq!(control.status(), SimulatorStatus::Idle);

        control.begin();
        control.request_stop();
        assert!(control.stop_requested());
        assert_eq!(control.status(), SimulatorStatus::ToBeStopped);

        control.begin();
        assert_eq!(control.status(), SimulatorStatus::ToBeStopped);
        control.finish();
        assert!(!control.stop_requested());
        assert_eq!(control.status(), SimulatorStatus::Idle);
    }
}
