//! fsim-units: processing-unit interface and built-in unit library.
//!
//! The scheduler treats every unit as an opaque [`Unit`]: it wires port
//! streams, calls `initialize` / `simulate` / `finalize`, saves and restores
//! internal state around recycle iterations, and drains messages.
//!
//! Built-in units:
//! - [`Feed`]: time-dependent source
//! - [`Mixer`]: mass-weighted mixing of two inlets
//! - [`Splitter`]: fixed split into two outlets
//! - [`Product`]: sink accumulating its inlet
//! - [`Lag`]: dynamic first-order lag on mass flow
//!
//! # Example
//!
//! ```
//! use fsim_core::{k, kgps, pa};
//! use fsim_stream::{MaterialStream, StreamStructure};
//! use fsim_units::{PortStreams, Splitter, Unit};
//!
//! let structure = StreamStructure::new(["H2O"], ["liquid"], 1);
//! let mut inlet = MaterialStream::new("in", structure.clone());
//! inlet.set_mass_flow(0.0, kgps(10.0));
//! let mut a = MaterialStream::new("a", structure.clone());
//! let mut b = MaterialStream::new("b", structure);
//!
//! let mut splitter = Splitter::new("S", 0.3).unwrap();
//! let mut io = PortStreams::new(vec![&inlet], vec![&mut a, &mut b]);
//! splitter.simulate(0.0, &mut io).unwrap();
//!
//! assert!((a.mass_flow_raw(0.0) - 3.0).abs() < 1e-12);
//! assert!((b.mass_flow_raw(0.0) - 7.0).abs() < 1e-12);
//! ```

pub mod error;
pub mod feed;
pub mod lag;
pub mod mixer;
pub mod product;
pub mod splitter;
pub mod traits;

// Re-exports
pub use error::{UnitError, UnitResult};
pub use feed::Feed;
pub use lag::Lag;
pub use mixer::Mixer;
pub use product::Product;
pub use splitter::Splitter;
pub use traits::{MessageQueue, Port, PortDirection, PortStreams, Severity, Unit, UnitMessage};
