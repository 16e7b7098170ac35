use crate::CoreError;

/// Floating point type used throughout system
pub type Real = f64;

/// Epsilon used when matching time points that are meant to coincide.
pub const TIME_EPS: Real = 16.0 * f64::EPSILON;

/// Absolute and relative tolerance pair applied component-wise.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-6,
            rel: 1e-3,
        }
    }
}

/// `|a - b| <= |a| * rel + abs`, with `a` as the reference value.
///
/// Reflexive for any non-negative tolerance, not symmetric.
#[inline]
pub fn within_tolerance(a: Real, b: Real, tol: Tolerances) -> bool {
    (a - b).abs() <= a.abs() * tol.rel + tol.abs
}

/// Symmetric closeness check scaled by the larger magnitude.
pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Sorted union of two ascending time axes with exact duplicates removed.
pub fn union_sorted(a: &[Real], b: &[Real]) -> Vec<Real> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() || j < b.len() {
        let next = match (a.get(i), b.get(j)) {
            (Some(&x), Some(&y)) if x < y => {
                i += 1;
                x
            }
            (Some(&x), Some(&y)) if y < x => {
                j += 1;
                y
            }
            (Some(&x), Some(_)) => {
                i += 1;
                j += 1;
                x
            }
            (Some(&x), None) => {
                i += 1;
                x
            }
            (None, Some(&y)) => {
                j += 1;
                y
            }
            (None, None) => break,
        };
        if out.last() != Some(&next) {
            out.push(next);
        }
    }
    out
}

/// Two-point linear interpolation (or extrapolation) through `(x1, y1)`, `(x2, y2)`.
#[inline]
pub fn lerp(x1: Real, x2: Real, y1: Real, y2: Real, x: Real) -> Real {
    if x2 == x1 {
        return y1;
    }
    (y2 - y1) / (x2 - x1) * (x - x1) + y1
}

/// Locate `x` on an ascending axis.
///
/// Returns `(lo, hi, w)` such that the interpolated value is
/// `v[lo] * (1 - w) + v[hi] * w`. Outside the axis the nearest end is used.
pub fn bracket(xs: &[Real], x: Real) -> Option<(usize, usize, Real)> {
    let last = xs.len().checked_sub(1)?;
    let upper = xs.partition_point(|&v| v <= x);
    if upper > last {
        return Some((last, last, 0.0));
    }
    if upper == 0 {
        return Some((0, 0, 0.0));
    }
    let lower = upper - 1;
    if (xs[upper] - x).abs() <= TIME_EPS {
        return Some((upper, upper, 0.0));
    }
    if (xs[lower] - x).abs() <= TIME_EPS {
        return Some((lower, lower, 0.0));
    }
    let w = (x - xs[lower]) / (xs[upper] - xs[lower]);
    Some((lower, upper, w))
}

/// Piecewise-linear lookup with nearest-neighbour extrapolation at both ends.
pub fn interpolate(xs: &[Real], ys: &[Real], x: Real) -> Real {
    if xs.len() != ys.len() {
        return 0.0;
    }
    match bracket(xs, x) {
        Some((lo, hi, w)) if lo != hi => ys[lo] * (1.0 - w) + ys[hi] * w,
        Some((lo, _, _)) => ys[lo],
        None => 0.0,
    }
}

/// Natural cubic spline through three points, evaluated at `x` using the last segment.
///
/// A linear input reproduces its exact continuation.
pub fn spline_extrapolate(y: [Real; 3], xs: [Real; 3], x: Real) -> Real {
    let [y0, y1, y2] = y;
    let [x0, x1, x2] = xs;

    let a = x1 - x0;
    let b = x2 - x1;
    let c = 2.0 * (a + b);
    let f = 6.0 * ((y2 - y1) / b - (y1 - y0) / a);

    let alpha1 = -b / c;
    let beta1 = f / c;
    let c2 = (f - a * beta1) / (c + a * alpha1);
    let c1 = alpha1 * c2 + beta1;

    let d2 = (c2 - c1) / b;
    let b2 = b * (2.0 * c2 + c1) / 6.0 + (y2 - y1) / b;

    let dx = x - x2;
    y2 + (b2 + (c2 / 2.0 + d2 * dx / 6.0) * dx) * dx
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn within_tolerance_uses_reference_magnitude() {
        let tol = Tolerances { abs: 0.0, rel: 0.1 };
        assert!(within_tolerance(10.0, 11.0, tol));
        assert!(!within_tolerance(1.0, 1.2, tol));
        assert!(within_tolerance(0.0, 0.0, Tolerances { abs: 0.0, rel: 0.0 }));
    }

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        assert!(err.to_string().contains("Non-finite"));
    }

    #[test]
    fn union_merges_and_dedups() {
        let u = union_sorted(&[0.0, 1.0, 3.0], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(u, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(union_sorted(&[], &[]).is_empty());
    }

    #[test]
    fn interpolate_clamps_outside() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [10.0, 20.0, 40.0];
        assert_eq!(interpolate(&xs, &ys, -1.0), 10.0);
        assert_eq!(interpolate(&xs, &ys, 5.0), 40.0);
        assert_eq!(interpolate(&xs, &ys, 1.5), 30.0);
        assert_eq!(interpolate(&xs, &ys, 1.0), 20.0);
        assert_eq!(interpolate(&[], &[], 1.0), 0.0);
    }

    #[test]
    fn spline_of_line_is_line() {
        let v = spline_extrapolate([1.0, 2.0, 3.0], [0.0, 1.0, 2.0], 4.0);
        assert!((v - 5.0).abs() < 1e-12);
    }

    #[test]
    fn spline_of_constant_is_constant() {
        let v = spline_extrapolate([7.0, 7.0, 7.0], [0.0, 0.5, 2.0], 3.5);
        assert!((v - 7.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn tolerance_is_reflexive(
            a in -1e9_f64..1e9,
            abs in 0.0_f64..1.0,
            rel in 0.0_f64..1.0,
        ) {
            let ok = within_tolerance(a, a, Tolerances { abs, rel });
            prop_assert!(ok);
        }

        #[test]
        fn lerp_hits_anchors(y1 in -1e3_f64..1e3, y2 in -1e3_f64..1e3) {
            prop_assert_eq!(lerp(1.0, 3.0, y1, y2, 1.0), y1);
            prop_assert!((lerp(1.0, 3.0, y1, y2, 3.0) - y2).abs() < 1e-9);
        }
    }
}
