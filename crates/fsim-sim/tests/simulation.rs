//! End-to-end runs of small flowsheets.

use fsim_core::{StreamId, UnitId, kgps};
use fsim_stream::{MaterialStream, StreamStructure};
use fsim_units::{
    Feed, Lag, MessageQueue, Mixer, Port, PortStreams, Product, Splitter, Unit, UnitMessage, UnitResult,
};
use fsim_sim::{
    ConvergenceMethod, Flowsheet, RunControl, RunOptions, RunOutcome, SimError, SimulationRunner, Simulator,
    SimulatorStatus,
};

fn structure() -> StreamStructure {
    StreamStructure::new(["H2O", "NaCl"], ["liquid"], 1)
}

fn source(points: &[(f64, f64)]) -> MaterialStream {
    let mut s = MaterialStream::new("source", structure());
    for &(t, m) in points {
        s.set_mass_flow(t, kgps(m));
    }
    s
}

fn options(end_time: f64) -> RunOptions {
    RunOptions {
        end_time,
        ..RunOptions::default()
    }
}

/// Feed -> Product.
fn feed_product(points: &[(f64, f64)]) -> (Flowsheet, UnitId, StreamId) {
    let mut fs = Flowsheet::new(structure());
    let feed = fs.add_unit(Feed::new("Feed", source(points)));
    let product = fs.add_unit(Product::new("Product"));
    let s = fs.add_stream("S1");
    fs.connect(feed, "Out", s).unwrap();
    fs.connect(product, "In", s).unwrap();
    (fs, product, s)
}

/// Feed -> Mixer -> Splitter -> Product with Splitter -> Mixer.
fn recycle(feed_rate: f64) -> Flowsheet {
    let mut fs = Flowsheet::new(structure());
    let feed = fs.add_unit(Feed::new("Feed", source(&[(0.0, feed_rate)])));
    let mixer = fs.add_unit(Mixer::new("Mixer"));
    let splitter = fs.add_unit(Splitter::new("Splitter", 0.5).unwrap());
    let product = fs.add_unit(Product::new("Product"));
    let s_feed = fs.add_stream("feed");
    let s_mix = fs.add_stream("mix");
    let s_out = fs.add_stream("out");
    let s_back = fs.add_stream("back");
    fs.connect(feed, "Out", s_feed).unwrap();
    fs.connect(mixer, "In1", s_feed).unwrap();
    fs.connect(mixer, "Out", s_mix).unwrap();
    fs.connect(splitter, "In", s_mix).unwrap();
    fs.connect(splitter, "Out1", s_out).unwrap();
    fs.connect(product, "In", s_out).unwrap();
    fs.connect(splitter, "Out2", s_back).unwrap();
    fs.connect(mixer, "In2", s_back).unwrap();
    fs
}

fn snapshot(fs: &Flowsheet) -> Vec<MaterialStream> {
    fs.streams().map(|(_, s)| s.clone()).collect()
}

/// Sink that requests a stop once it sees time `at`.
struct StopAt {
    ports: [Port; 1],
    control: RunControl,
    at: f64,
}

impl StopAt {
    fn new(control: RunControl, at: f64) -> Self {
        Self {
            ports: [Port::inlet("In")],
            control,
            at,
        }
    }
}

impl Unit for StopAt {
    fn name(&self) -> &str {
        "Stopper"
    }

    fn model_name(&self) -> &str {
        "StopAt"
    }

    fn ports(&self) -> &[Port] {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut [Port] {
        &mut self.ports
    }

    fn simulate(&mut self, t: f64, _io: &mut PortStreams<'_>) -> UnitResult<()> {
        if t >= self.at {
            self.control.request_stop();
        }
        Ok(())
    }
}

/// Sink that reports an error message on every evaluation.
struct Faulty {
    ports: [Port; 1],
    messages: MessageQueue,
}

impl Unit for Faulty {
    fn name(&self) -> &str {
        "Bad"
    }

    fn model_name(&self) -> &str {
        "Faulty"
    }

    fn ports(&self) -> &[Port] {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut [Port] {
        &mut self.ports
    }

    fn simulate(&mut self, _t: f64, _io: &mut PortStreams<'_>) -> UnitResult<()> {
        self.messages.warning("suspicious input");
        self.messages.error("boom");
        Ok(())
    }

    fn drain_messages(&mut self) -> Vec<UnitMessage> {
        self.messages.drain()
    }
}

fn stoppable(control: RunControl) -> Flowsheet {
    let points: Vec<(f64, f64)> = (0..=10).map(|i| (i as f64, 1.0)).collect();
    let mut fs = Flowsheet::new(structure());
    let feed = fs.add_unit(Feed::new("Feed", source(&points)));
    let sink = fs.add_unit(StopAt::new(control, 3.0));
    let s = fs.add_stream("S1");
    fs.connect(feed, "Out", s).unwrap();
    fs.connect(sink, "In", s).unwrap();
    fs
}

#[test]
fn acyclic_run_follows_feed_points() {
    let (mut fs, product, s) = feed_product(&[(0.0, 1.0), (5.0, 2.0), (15.0, 3.0)]);
    let mut sim = Simulator::new(options(10.0));
    let summary = sim.simulate(&mut fs).unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.windows, 0);
    assert_eq!(sim.status(), SimulatorStatus::Idle);
    assert_eq!(fs.stream(s).unwrap().time_points(), vec![0.0, 5.0, 10.0]);

    let holdup = fs.unit(product).unwrap().holdups()[0].clone();
    assert_eq!(holdup.time_points(), vec![0.0, 5.0, 10.0]);
    assert!((holdup.mass_flow_raw(10.0) - 2.5).abs() < 1e-12);

    let log = sim.log().lock().full_log();
    assert!(log.contains("Initialization of Feed (Feed)..."));
    assert!(log.contains("Simulation of Product (Product): [0, 10]..."));
    assert!(log.contains("Finalization of Product (Product)..."));
}

#[test]
fn recycle_converges_to_steady_state() {
    let mut fs = recycle(1.0);
    let mut sim = Simulator::new(RunOptions {
        init_window: 1.0,
        magnification_ratio: 1.0,
        ..options(5.0)
    });
    let summary = sim.simulate(&mut fs).unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.windows, 5);
    let mix = fs.stream(fs.stream_id("mix").unwrap()).unwrap();
    assert!((mix.mass_flow_raw(5.0) - 2.0).abs() < 1e-2);
    let out = fs.stream(fs.stream_id("out").unwrap()).unwrap();
    assert!((out.mass_flow_raw(5.0) - 1.0).abs() < 1e-2);
}

#[test]
fn successive_runs_reproduce_recycle_values() {
    let mut fs = recycle(1.0);
    let mut sim = Simulator::new(RunOptions {
        init_window: 1.0,
        magnification_ratio: 1.0,
        ..options(5.0)
    });
    let first = sim.simulate(&mut fs).unwrap();

    let second = sim.simulate(&mut fs).unwrap();
    let after_second = snapshot(&fs);
    let third = sim.simulate(&mut fs).unwrap();
    let after_third = snapshot(&fs);

    assert_eq!(after_second, after_third);
    assert_eq!(second.iterations, third.iterations);
    assert!(second.iterations < first.iterations);
}

#[test]
fn too_many_iterations_is_fatal() {
    let mut fs = recycle(1.0);
    let mut sim = Simulator::new(RunOptions {
        max_iterations: 2,
        ..options(5.0)
    });
    let err = sim.simulate(&mut fs).unwrap_err();

    match err {
        SimError::Fatal {
            message,
            window,
            iteration,
            ..
        } => {
            assert_eq!(
                message,
                "Maximum number of iterations has been reached. Simulation will be stopped."
            );
            assert_eq!(window, 0);
            assert_eq!(iteration, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sim.status(), SimulatorStatus::Idle);
    assert!(sim.log().lock().full_log().contains("Error! Maximum number of iterations"));
}

#[test]
fn window_below_minimum_is_fatal() {
    let mut fs = recycle(1.0);
    let mut sim = Simulator::new(RunOptions {
        init_window: 1.0,
        min_window: 0.6,
        magnification_ratio: 2.0,
        iters_first_upper_limit: 1,
        ..options(5.0)
    });
    let err = sim.simulate(&mut fs).unwrap_err();
    assert!(matches!(
        err,
        SimError::Fatal { ref message, .. }
            if message == "The minimum length of the time window is reached. Simulation stopped."
    ));
}

#[test]
fn stale_seeds_trigger_cold_restart() {
    let mut sim = Simulator::new(options(1.0));

    // Seeds for ten times the feed are far from the new solution.
    let mut heavy = recycle(10.0);
    sim.simulate(&mut heavy).unwrap();
    let seeded = heavy.sequence().clone();
    assert!(seeded.partitions().iter().any(|p| p.is_cyclic()));

    let mut fs = recycle(1.0);
    *fs.sequence_mut() = seeded;
    fs.set_topology_modified(false);
    sim.set_options(RunOptions {
        iters_first_upper_limit: 1,
        convergence: ConvergenceMethod::DirectSubstitution,
        ..options(1.0)
    });
    let summary = sim.simulate(&mut fs).unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    let log = sim.log().lock().full_log();
    assert!(log.contains(
        "Warning! Cannot converge using previous results as initial values. Resetting to defaults and restarting."
    ));
    let out = fs.stream(fs.stream_id("out").unwrap()).unwrap();
    assert!((out.mass_flow_raw(1.0) - 1.0).abs() < 1e-2);
}

#[test]
fn stop_request_ends_run_at_next_poll() {
    let mut sim = Simulator::new(options(10.0));
    let mut fs = stoppable(sim.control());
    let summary = sim.simulate(&mut fs).unwrap();

    assert_eq!(summary.outcome, RunOutcome::Stopped);
    assert_eq!(sim.status(), SimulatorStatus::Idle);
    assert!(!sim.control().stop_requested());
    let log = sim.log().lock().full_log();
    assert!(log.contains("Simulation stopped by user."));
    assert!(!log.contains("Finalization of Stopper"));
}

#[test]
fn stop_while_idle_is_ignored() {
    let (mut fs, _, _) = feed_product(&[(0.0, 1.0)]);
    let mut sim = Simulator::new(options(10.0));
    sim.control().request_stop();
    let summary = sim.simulate(&mut fs).unwrap();
    assert_eq!(summary.outcome, RunOutcome::Completed);
}

#[test]
fn unit_error_message_fails_run() {
    let mut fs = Flowsheet::new(structure());
    let feed = fs.add_unit(Feed::new("Feed", source(&[(0.0, 1.0)])));
    let bad = fs.add_unit(Faulty {
        ports: [Port::inlet("In")],
        messages: MessageQueue::default(),
    });
    let s = fs.add_stream("S1");
    fs.connect(feed, "Out", s).unwrap();
    fs.connect(bad, "In", s).unwrap();

    let mut sim = Simulator::new(options(10.0));
    let err = sim.simulate(&mut fs).unwrap_err();
    assert_eq!(
        err,
        SimError::UnitFailure {
            unit: "Bad".into(),
            message: "boom".into(),
        }
    );
    let log = sim.log().lock().full_log();
    assert!(log.contains("Warning! suspicious input"));
    assert!(log.contains("Error! Unit 'Bad': boom"));
}

#[test]
fn structural_problems_prevent_the_run() {
    let mut fs = Flowsheet::new(structure());
    fs.add_unit(Product::new("Product"));
    let mut sim = Simulator::new(options(10.0));
    let err = sim.simulate(&mut fs).unwrap_err();
    assert_eq!(
        err,
        SimError::Structural {
            message: "Port 'In' in unit 'Product' is unconnected.".into(),
        }
    );
}

#[test]
fn invalid_options_are_rejected() {
    let (mut fs, _, _) = feed_product(&[(0.0, 1.0)]);
    let mut sim = Simulator::new(RunOptions {
        magnification_ratio: 0.5,
        ..options(10.0)
    });
    assert!(matches!(sim.simulate(&mut fs), Err(SimError::InvalidArg { .. })));
    assert_eq!(sim.status(), SimulatorStatus::Idle);
}

#[test]
fn save_step_thins_stored_points() {
    let points: Vec<(f64, f64)> = (0..=100).map(|i| (i as f64 * 0.1, 1.0)).collect();
    let (mut fs, product, s) = feed_product(&points);
    let mut sim = Simulator::new(RunOptions {
        save_time_step: 1.0,
        ..options(10.0)
    });
    sim.simulate(&mut fs).unwrap();

    let stream = fs.stream(s).unwrap();
    assert!(stream.len() <= 12, "{} points left", stream.len());
    assert!(stream.has_time(10.0));
    let holdup = &fs.unit(product).unwrap().holdups()[0];
    assert!(holdup.len() <= 12);
}

#[test]
fn lag_follows_step_over_horizon() {
    let mut fs = Flowsheet::new(structure());
    let feed = fs.add_unit(Feed::new("Feed", source(&[(0.0, 0.0), (1e-9, 1.0)])));
    let lag = fs.add_unit(Lag::new("Lag", 1.0).unwrap());
    let product = fs.add_unit(Product::new("Product"));
    let s1 = fs.add_stream("S1");
    let s2 = fs.add_stream("S2");
    fs.connect(feed, "Out", s1).unwrap();
    fs.connect(lag, "In", s1).unwrap();
    fs.connect(lag, "Out", s2).unwrap();
    fs.connect(product, "In", s2).unwrap();

    let mut sim = Simulator::new(options(5.0));
    sim.simulate(&mut fs).unwrap();

    let y = fs.stream(s2).unwrap().mass_flow_raw(5.0);
    assert!((y - (1.0 - (-5.0_f64).exp())).abs() < 1e-6, "{y}");
}

#[test]
fn lag_inside_recycle_converges() {
    let mut fs = Flowsheet::new(structure());
    let feed = fs.add_unit(Feed::new("Feed", source(&[(0.0, 1.0)])));
    let mixer = fs.add_unit(Mixer::new("Mixer"));
    let lag = fs.add_unit(Lag::new("Lag", 2.0).unwrap());
    let splitter = fs.add_unit(Splitter::new("Splitter", 0.5).unwrap());
    let product = fs.add_unit(Product::new("Product"));
    let streams: Vec<StreamId> = ["feed", "mix", "lagged", "out", "back"]
        .into_iter()
        .map(|n| fs.add_stream(n))
        .collect();
    fs.connect(feed, "Out", streams[0]).unwrap();
    fs.connect(mixer, "In1", streams[0]).unwrap();
    fs.connect(mixer, "Out", streams[1]).unwrap();
    fs.connect(lag, "In", streams[1]).unwrap();
    fs.connect(lag, "Out", streams[2]).unwrap();
    fs.connect(splitter, "In", streams[2]).unwrap();
    fs.connect(splitter, "Out1", streams[3]).unwrap();
    fs.connect(product, "In", streams[3]).unwrap();
    fs.connect(splitter, "Out2", streams[4]).unwrap();
    fs.connect(mixer, "In2", streams[4]).unwrap();

    let mut sim = Simulator::new(options(4.0));
    let summary = sim.simulate(&mut fs).unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert!(summary.windows > 0);
    let out = fs.stream(streams[3]).unwrap().mass_flow_raw(4.0);
    assert!(out > 0.0 && out < 1.0, "{out}");
}

#[test]
fn runner_hands_flowsheet_back() {
    let (fs, _, s) = feed_product(&[(0.0, 1.0), (2.0, 4.0)]);
    let sim = Simulator::new(options(4.0));
    let handle = SimulationRunner::start(sim, fs).unwrap();
    let finished = handle.wait().unwrap();

    let summary = finished.result.unwrap();
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(finished.flowsheet.stream(s).unwrap().time_points(), vec![0.0, 2.0, 4.0]);
    assert_eq!(finished.simulator.status(), SimulatorStatus::Idle);
}

#[test]
fn runner_reports_stopped_run() {
    let sim = Simulator::new(options(10.0));
    let fs = stoppable(sim.control());
    let mut handle = SimulationRunner::start(sim, fs).unwrap();
    while !handle.wait_for(std::time::Duration::from_millis(10)) {}
    assert!(!handle.is_running());

    let finished = handle.wait().unwrap();
    assert_eq!(finished.result.unwrap().outcome, RunOutcome::Stopped);
}
