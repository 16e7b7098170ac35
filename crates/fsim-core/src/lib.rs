//! fsim-core: stable foundation for flowsim.
//!
//! Contains:
//! - units (uom SI types + constructors)
//! - numeric (Real + tolerances + time-axis helpers)
//! - ids (stable compact IDs for units, streams and ports)
//! - store (opaque structured key/value persistence)
//! - timing (wall-clock helpers)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod store;
pub mod timing;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
pub use store::StructuredStore;
pub use units::*;
