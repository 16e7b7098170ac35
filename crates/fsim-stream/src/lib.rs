//! Time-dependent material streams.
//!
//! A [`MaterialStream`] holds, per time point, overall parameters (mass
//! flow, temperature, pressure), phase fractions and per-phase distribution
//! arrays. Values between points are interpolated linearly, values outside
//! the defined range take the nearest point.
//!
//! # Example
//!
//! ```
//! use fsim_core::{k, kgps, pa};
//! use fsim_stream::{MaterialStream, StreamStructure};
//!
//! let structure = StreamStructure::new(["H2O"], ["liquid"], 1);
//! let mut s = MaterialStream::new("S1", structure);
//! s.set_mass_flow(0.0, kgps(1.0));
//! s.set_mass_flow(10.0, kgps(3.0));
//! s.set_temperature(0.0, k(300.0));
//! s.set_pressure(0.0, pa(1e5));
//!
//! assert_eq!(s.time_points(), vec![0.0, 10.0]);
//! assert_eq!(s.mass_flow_raw(5.0), 2.0);
//! ```

pub mod compare;
pub mod error;
mod extrapolate;
mod persist;
pub mod point;
pub mod stream;
pub mod structure;

pub use compare::are_equal;
pub use error::{StreamError, StreamResult};
pub use point::StreamPoint;
pub use stream::MaterialStream;
pub use structure::StreamStructure;
