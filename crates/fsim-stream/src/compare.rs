//! Tolerance-based stream comparison.

use fsim_core::numeric::{Tolerances, within_tolerance};

use crate::stream::MaterialStream;

/// Whether two streams hold the same values at `t`.
///
/// `reference` provides the magnitude for the relative part of the tolerance.
/// Streams with different structures are never equal.
pub fn are_equal(reference: &MaterialStream, other: &MaterialStream, t: f64, tol: Tolerances) -> bool {
    if !reference.same_structure(other) {
        return false;
    }
    let a = reference.sample(t);
    let b = other.sample(t);

    if !a
        .scalars()
        .zip(b.scalars())
        .all(|(x, y)| within_tolerance(x, y, tol))
    {
        return false;
    }

    a.distributions
        .iter()
        .zip(&b.distributions)
        .all(|(da, db)| da.iter().zip(db.iter()).all(|(&x, &y)| within_tolerance(x, y, tol)))
}
