//! fsim-sim: calculation sequencing and recycle convergence.
//!
//! A [`Flowsheet`] owns units, streams and the [`CalculationSequence`]. The
//! [`Simulator`] validates it, walks the sequence partition by partition and
//! solves cyclic partitions with a windowed fixed-point iteration over their
//! tear streams. [`SimulationRunner`] runs a simulation on a worker thread
//! with cooperative stop.
//!
//! # Example
//!
//! ```
//! use fsim_core::kgps;
//! use fsim_stream::{MaterialStream, StreamStructure};
//! use fsim_units::{Feed, Product};
//! use fsim_sim::{Flowsheet, RunOptions, RunOutcome, Simulator};
//!
//! let structure = StreamStructure::new(["H2O"], ["liquid"], 1);
//! let mut source = MaterialStream::new("source", structure.clone());
//! source.set_mass_flow(0.0, kgps(1.0));
//!
//! let mut fs = Flowsheet::new(structure);
//! let feed = fs.add_unit(Feed::new("Feed", source));
//! let product = fs.add_unit(Product::new("Product"));
//! let s = fs.add_stream("S1");
//! fs.connect(feed, "Out", s).unwrap();
//! fs.connect(product, "In", s).unwrap();
//!
//! let mut sim = Simulator::new(RunOptions { end_time: 10.0, ..RunOptions::default() });
//! let summary = sim.simulate(&mut fs).unwrap();
//! assert_eq!(summary.outcome, RunOutcome::Completed);
//! assert_eq!(fs.stream(s).unwrap().time_points(), vec![0.0, 10.0]);
//! ```

pub mod convergence;
pub mod error;
pub mod executor;
pub mod flowsheet;
pub mod log;
pub mod options;
pub mod runner;
pub mod scheduler;
pub mod sequence;
pub mod window;

// Re-exports
pub use convergence::ConvergenceEngine;
pub use error::{SimError, SimResult};
pub use executor::Executor;
pub use flowsheet::{Flowsheet, StreamMap, UnitMap};
pub use log::{LOG_CAPACITY, LogSeverity, SharedLog, SimulatorLog};
pub use options::{ConvergenceMethod, ExtrapolationMethod, RunOptions};
pub use runner::{FinishedRun, RunHandle, SimulationRunner};
pub use scheduler::{RunControl, RunOutcome, RunProgress, RunSummary, Simulator, SimulatorStatus};
pub use sequence::{CalculationSequence, SequencePartition, TearStream};
pub use window::{TimeWindowController, WindowLimit};
