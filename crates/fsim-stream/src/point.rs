//! Data held by a stream at one time point.

use fsim_core::units::constants::{STANDARD_PRESSURE_PA, STANDARD_TEMPERATURE_K};
use nalgebra::DVector;

use crate::structure::StreamStructure;

/// Overall parameters, phase fractions and per-phase distributions at one instant.
///
/// Raw SI magnitudes: kg/s, K, Pa.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamPoint {
    pub mass_flow: f64,
    pub temperature: f64,
    pub pressure: f64,
    pub phase_fractions: Vec<f64>,
    pub distributions: Vec<DVector<f64>>,
}

impl StreamPoint {
    /// Zero flow at standard conditions, shaped for `structure`.
    pub fn empty(structure: &StreamStructure) -> Self {
        let n = structure.phase_count();
        Self {
            mass_flow: 0.0,
            temperature: STANDARD_TEMPERATURE_K,
            pressure: STANDARD_PRESSURE_PA,
            phase_fractions: vec![0.0; n],
            distributions: vec![DVector::zeros(structure.distribution_len()); n],
        }
    }

    pub fn fits(&self, structure: &StreamStructure) -> bool {
        self.phase_fractions.len() == structure.phase_count()
            && self.distributions.len() == structure.phase_count()
            && self
                .distributions
                .iter()
                .all(|d| d.len() == structure.distribution_len())
    }

    /// Scalar values in a fixed order: mass, temperature, pressure, phase fractions.
    pub fn scalars(&self) -> impl Iterator<Item = f64> + '_ {
        [self.mass_flow, self.temperature, self.pressure]
            .into_iter()
            .chain(self.phase_fractions.iter().copied())
    }

    pub fn scalars_mut(&mut self) -> impl Iterator<Item = &mut f64> + '_ {
        [
            &mut self.mass_flow,
            &mut self.temperature,
            &mut self.pressure,
        ]
        .into_iter()
        .chain(self.phase_fractions.iter_mut())
    }

    /// `a * (1 - w) + b * w`, component-wise.
    pub fn blend(a: &Self, b: &Self, w: f64) -> Self {
        let mix = |x: f64, y: f64| x * (1.0 - w) + y * w;
        Self {
            mass_flow: mix(a.mass_flow, b.mass_flow),
            temperature: mix(a.temperature, b.temperature),
            pressure: mix(a.pressure, b.pressure),
            phase_fractions: a
                .phase_fractions
                .iter()
                .zip(&b.phase_fractions)
                .map(|(&x, &y)| mix(x, y))
                .collect(),
            distributions: a
                .distributions
                .iter()
                .zip(&b.distributions)
                .map(|(x, y)| x.zip_map(y, mix))
                .collect(),
        }
    }

    /// Apply `f` to matching components of three same-shaped points.
    pub fn combine3(a: &Self, b: &Self, c: &Self, f: impl Fn(f64, f64, f64) -> f64) -> Self {
        let mut out = c.clone();
        for ((o, x), y) in out.scalars_mut().zip(a.scalars()).zip(b.scalars()) {
            *o = f(x, y, *o);
        }
        for ((o, x), y) in out
            .distributions
            .iter_mut()
            .zip(&a.distributions)
            .zip(&b.distributions)
        {
            for ((vo, &vx), &vy) in o.iter_mut().zip(x.iter()).zip(y.iter()) {
                *vo = f(vx, vy, *vo);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structure() -> StreamStructure {
        StreamStructure::new(["A", "B"], ["liquid", "solid"], 1)
    }

    #[test]
    fn empty_point_fits_structure() {
        let p = StreamPoint::empty(&structure());
        assert!(p.fits(&structure()));
        assert!(!p.fits(&StreamStructure::new(["A"], ["liquid"], 1)));
        assert_eq!(p.scalars().count(), 5);
    }

    #[test]
    fn blend_midpoint() {
        let s = structure();
        let mut a = StreamPoint::empty(&s);
        let mut b = StreamPoint::empty(&s);
        a.mass_flow = 1.0;
        b.mass_flow = 3.0;
        b.distributions[0][1] = 2.0;
        let m = StreamPoint::blend(&a, &b, 0.5);
        assert_eq!(m.mass_flow, 2.0);
        assert_eq!(m.distributions[0][1], 1.0);
    }

    #[test]
    fn combine3_visits_every_component() {
        let s = structure();
        let a = StreamPoint::empty(&s);
        let out = StreamPoint::combine3(&a, &a, &a, |_, _, _| 7.0);
        assert!(out.scalars().all(|v| v == 7.0));
        assert!(out.distributions.iter().all(|d| d.iter().all(|&v| v == 7.0)));
    }
}
