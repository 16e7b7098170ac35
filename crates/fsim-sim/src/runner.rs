//! Background worker running one simulation.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{SimError, SimResult};
use crate::flowsheet::Flowsheet;
use crate::log::SharedLog;
use crate::scheduler::{RunControl, RunProgress, RunSummary, SimulatorStatus, Simulator};

/// Everything the worker hands back when it is joined.
#[derive(Debug)]
pub struct FinishedRun {
    pub flowsheet: Flowsheet,
    pub simulator: Simulator,
    pub result: SimResult<RunSummary>,
}

/// Spawns simulations on a dedicated thread.
///
/// The flowsheet moves into the worker for the duration of the run and is
/// returned by [`RunHandle::wait`].
pub struct SimulationRunner;

impl SimulationRunner {
    pub fn start(mut simulator: Simulator, mut flowsheet: Flowsheet) -> SimResult<RunHandle> {
        let control = simulator.control();
        let log = simulator.log();
        control.begin();

        let (tx, rx) = channel();
        let handle = thread::Builder::new()
            .name("fsim-worker".into())
            .spawn(move || {
                let result = simulator.simulate(&mut flowsheet);
                let _ = tx.send(());
                FinishedRun {
                    flowsheet,
                    simulator,
                    result,
                }
            })
            .map_err(|e| SimError::Backend {
                message: format!("failed to start simulation worker: {e}"),
            })?;

        Ok(RunHandle {
            control,
            log,
            done_rx: rx,
            finished: false,
            handle,
        })
    }
}

/// Caller side of a running simulation.
pub struct RunHandle {
    control: RunControl,
    log: SharedLog,
    done_rx: Receiver<()>,
    finished: bool,
    handle: JoinHandle<FinishedRun>,
}

impl RunHandle {
    /// Request a cooperative stop; the worker ends at its next poll point.
    pub fn stop(&self) {
        self.control.request_stop();
    }

    pub fn status(&self) -> SimulatorStatus {
        self.control.status()
    }

    pub fn progress(&self) -> RunProgress {
        self.control.progress()
    }

    pub fn log(&self) -> SharedLog {
        SharedLog::clone(&self.log)
    }

    /// Non-blocking completion check.
    pub fn try_finished(&mut self) -> bool {
        if !self.finished {
            self.finished = !matches!(self.done_rx.try_recv(), Err(TryRecvError::Empty));
        }
        self.finished
    }

    /// Block up to `timeout` for completion.
    pub fn wait_for(&mut self, timeout: Duration) -> bool {
        if !self.finished {
            self.finished = !matches!(
                self.done_rx.recv_timeout(timeout),
                Err(RecvTimeoutError::Timeout)
            );
        }
        self.finished
    }

    pub fn is_running(&mut self) -> bool {
        !self.try_finished()
    }

    /// Join the worker and take back the flowsheet.
    pub fn wait(self) -> SimResult<FinishedRun> {
        self.handle.join().map_err(|_| SimError::Backend {
            message: "simulation worker panicked".into(),
        })
    }
}
