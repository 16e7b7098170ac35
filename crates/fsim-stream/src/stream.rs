//! Time-dependent material stream.

use fsim_core::numeric::{TIME_EPS, bracket};
use fsim_core::units::{MassRate, Pressure, Temperature, kgps, k, pa, raw};
use nalgebra::DVector;

use crate::error::{StreamError, StreamResult};
use crate::point::StreamPoint;
use crate::structure::StreamStructure;

/// Material stream: ascending time axis with one [`StreamPoint`] per entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialStream {
    name: String,
    structure: StreamStructure,
    times: Vec<f64>,
    points: Vec<StreamPoint>,
}

impl MaterialStream {
    pub fn new(name: impl Into<String>, structure: StreamStructure) -> Self {
        Self {
            name: name.into(),
            structure,
            times: Vec::new(),
            points: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn structure(&self) -> &StreamStructure {
        &self.structure
    }

    pub fn same_structure(&self, other: &MaterialStream) -> bool {
        self.structure == other.structure
    }

    /// Adopt `other`'s structure. All time points are dropped.
    pub fn setup_structure(&mut self, other: &MaterialStream) {
        self.set_structure(other.structure.clone());
    }

    pub fn set_structure(&mut self, structure: StreamStructure) {
        self.structure = structure;
        self.remove_all_time_points();
    }

    // ---------------------------------------------------------------
    // time axis
    // ---------------------------------------------------------------

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn time_points(&self) -> Vec<f64> {
        self.times.clone()
    }

    /// Time points within the closed interval `[t1, t2]`.
    pub fn time_points_in(&self, t1: f64, t2: f64) -> Vec<f64> {
        if t1 > t2 {
            return Vec::new();
        }
        let (lo, hi) = self.range_closed(t1, t2);
        self.times[lo..hi].to_vec()
    }

    pub fn last_time_point(&self) -> Option<f64> {
        self.times.last().copied()
    }

    pub fn has_time(&self, t: f64) -> bool {
        self.find(t).is_some()
    }

    fn find(&self, t: f64) -> Option<usize> {
        let i = self.times.partition_point(|&v| v < t - TIME_EPS);
        match self.times.get(i) {
            Some(&v) if (v - t).abs() <= TIME_EPS => Some(i),
            _ => None,
        }
    }

    fn range_closed(&self, t1: f64, t2: f64) -> (usize, usize) {
        let lo = self.times.partition_point(|&v| v < t1);
        let hi = self.times.partition_point(|&v| v <= t2);
        (lo, hi.max(lo))
    }

    /// Insert a point holding `point`, replacing an existing one at `t`.
    pub fn set_point(&mut self, t: f64, point: StreamPoint) -> StreamResult<()> {
        if !point.fits(&self.structure) {
            return Err(StreamError::StructureMismatch {
                what: format!("point does not fit stream '{}'", self.name),
            });
        }
        if t < 0.0 {
            return Err(StreamError::InvalidArg {
                what: "time must be non-negative",
            });
        }
        match self.find(t) {
            Some(i) => self.points[i] = point,
            None => {
                let i = self.times.partition_point(|&v| v < t);
                self.times.insert(i, t);
                self.points.insert(i, point);
            }
        }
        Ok(())
    }

    /// Add a time point copying the data of the preceding point, if any.
    ///
    /// Returns the index of the point at `t`.
    pub fn add_time_point(&mut self, t: f64) -> usize {
        if let Some(i) = self.find(t) {
            return i;
        }
        let i = self.times.partition_point(|&v| v < t);
        let point = match i.checked_sub(1) {
            Some(prev) => self.points[prev].clone(),
            None => self
                .points
                .first()
                .cloned()
                .unwrap_or_else(|| StreamPoint::empty(&self.structure)),
        };
        self.times.insert(i, t);
        self.points.insert(i, point);
        i
    }

    /// Remove points in the closed interval `[t1, t2]`.
    pub fn remove_time_points(&mut self, t1: f64, t2: f64) {
        if t1 > t2 {
            return;
        }
        let (lo, hi) = self.range_closed(t1, t2);
        self.times.drain(lo..hi);
        self.points.drain(lo..hi);
    }

    /// Remove every point after `t`; `inclusive` also removes the point at `t`.
    pub fn remove_time_points_after(&mut self, t: f64, inclusive: bool) {
        let lo = if inclusive {
            self.times.partition_point(|&v| v < t)
        } else {
            self.times.partition_point(|&v| v <= t)
        };
        self.times.truncate(lo);
        self.points.truncate(lo);
    }

    pub fn remove_all_time_points(&mut self) {
        self.times.clear();
        self.points.clear();
    }

    /// Replace own data from `t1` on by the source's points in `[t1, t2]`.
    pub fn copy_from(&mut self, src: &MaterialStream, t1: f64, t2: f64) -> StreamResult<()> {
        if !self.same_structure(src) {
            return Err(StreamError::StructureMismatch {
                what: format!("cannot copy '{}' into '{}'", src.name, self.name),
            });
        }
        self.remove_time_points_after(t1, true);
        if t1 > t2 {
            return Ok(());
        }
        let (lo, hi) = src.range_closed(t1, t2);
        self.times.extend_from_slice(&src.times[lo..hi]);
        self.points.extend_from_slice(&src.points[lo..hi]);
        Ok(())
    }

    /// Thin out points in `[t1, t2]` closer than `step` to their kept predecessor.
    ///
    /// The last point of the interval always survives; intervals with three
    /// or fewer points are left untouched.
    pub fn reduce_time_points(&mut self, t1: f64, t2: f64, step: f64) {
        let mut candidates = self.time_points_in(t1, t2);
        if candidates.len() <= 3 {
            return;
        }
        candidates.pop();

        let mut kept = 0;
        let mut next = 1;
        while next < candidates.len() {
            if (candidates[next] - candidates[kept]).abs() < step {
                let t = candidates.remove(next);
                self.remove_time_points(t, t);
            } else {
                kept += 1;
                next += 1;
            }
        }
    }

    // ---------------------------------------------------------------
    // values
    // ---------------------------------------------------------------

    /// Exact point at `t`, if defined.
    pub fn point(&self, t: f64) -> Option<&StreamPoint> {
        self.find(t).map(|i| &self.points[i])
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, &StreamPoint)> + '_ {
        self.times.iter().copied().zip(self.points.iter())
    }

    pub fn points_mut(&mut self) -> impl Iterator<Item = (f64, &mut StreamPoint)> + '_ {
        self.times.iter().copied().zip(self.points.iter_mut())
    }

    /// Value at `t`: linear between points, nearest outside the defined range.
    pub fn sample(&self, t: f64) -> StreamPoint {
        match bracket(&self.times, t) {
            Some((lo, hi, w)) if lo != hi => StreamPoint::blend(&self.points[lo], &self.points[hi], w),
            Some((lo, _, _)) => self.points[lo].clone(),
            None => StreamPoint::empty(&self.structure),
        }
    }

    fn scalar_at(&self, t: f64, get: impl Fn(&StreamPoint) -> f64) -> f64 {
        match bracket(&self.times, t) {
            Some((lo, hi, w)) if lo != hi => {
                get(&self.points[lo]) * (1.0 - w) + get(&self.points[hi]) * w
            }
            Some((lo, _, _)) => get(&self.points[lo]),
            None => get(&StreamPoint::empty(&self.structure)),
        }
    }

    pub(crate) fn point_at_index_mut(&mut self, i: usize) -> &mut StreamPoint {
        &mut self.points[i]
    }

    fn point_mut_at(&mut self, t: f64) -> &mut StreamPoint {
        let i = self.add_time_point(t);
        &mut self.points[i]
    }

    pub fn mass_flow_raw(&self, t: f64) -> f64 {
        self.scalar_at(t, |p| p.mass_flow)
    }

    pub fn mass_flow(&self, t: f64) -> MassRate {
        kgps(self.mass_flow_raw(t))
    }

    pub fn temperature(&self, t: f64) -> Temperature {
        k(self.scalar_at(t, |p| p.temperature))
    }

    pub fn pressure(&self, t: f64) -> Pressure {
        pa(self.scalar_at(t, |p| p.pressure))
    }

    pub fn set_mass_flow(&mut self, t: f64, v: MassRate) {
        self.point_mut_at(t).mass_flow = raw::kgps_of(v);
    }

    pub fn set_temperature(&mut self, t: f64, v: Temperature) {
        self.point_mut_at(t).temperature = raw::k_of(v);
    }

    pub fn set_pressure(&mut self, t: f64, v: Pressure) {
        self.point_mut_at(t).pressure = raw::pa_of(v);
    }

    pub fn phase_fraction(&self, t: f64, phase: usize) -> StreamResult<f64> {
        self.check_phase(phase)?;
        Ok(self.scalar_at(t, |p| p.phase_fractions[phase]))
    }

    pub fn set_phase_fraction(&mut self, t: f64, phase: usize, v: f64) -> StreamResult<()> {
        self.check_phase(phase)?;
        self.point_mut_at(t).phase_fractions[phase] = v;
        Ok(())
    }

    pub fn distribution(&self, t: f64, phase: usize) -> StreamResult<DVector<f64>> {
        self.check_phase(phase)?;
        Ok(self.sample(t).distributions.swap_remove(phase))
    }

    pub fn set_distribution(
        &mut self,
        t: f64,
        phase: usize,
        values: DVector<f64>,
    ) -> StreamResult<()> {
        self.check_phase(phase)?;
        if values.len() != self.structure.distribution_len() {
            return Err(StreamError::StructureMismatch {
                what: format!(
                    "distribution of length {} for stream '{}' expecting {}",
                    values.len(),
                    self.name,
                    self.structure.distribution_len()
                ),
            });
        }
        self.point_mut_at(t).distributions[phase] = values;
        Ok(())
    }

    fn check_phase(&self, phase: usize) -> StreamResult<()> {
        let count = self.structure.phase_count();
        if phase < count {
            Ok(())
        } else {
            Err(StreamError::UnknownPhase {
                index: phase,
                count,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_with(times: &[f64]) -> MaterialStream {
        let mut s = MaterialStream::new("S", StreamStructure::new(["A"], ["liquid"], 1));
        for &t in times {
            s.set_mass_flow(t, kgps(t));
        }
        s
    }

    #[test]
    fn time_points_stay_sorted() {
        let s = stream_with(&[5.0, 0.0, 2.0]);
        assert_eq!(s.time_points(), vec![0.0, 2.0, 5.0]);
        assert_eq!(s.time_points_in(1.0, 5.0), vec![2.0, 5.0]);
        assert!(s.time_points_in(3.0, 1.0).is_empty());
    }

    #[test]
    fn add_time_point_copies_previous() {
        let mut s = stream_with(&[0.0, 4.0]);
        s.add_time_point(3.0);
        assert_eq!(s.point(3.0).unwrap().mass_flow, 0.0);
        s.add_time_point(9.0);
        assert_eq!(s.point(9.0).unwrap().mass_flow, 4.0);
    }

    #[test]
    fn remove_after_respects_inclusive_flag() {
        let mut s = stream_with(&[0.0, 1.0, 2.0, 3.0]);
        s.remove_time_points_after(1.0, false);
        assert_eq!(s.time_points(), vec![0.0, 1.0]);
        s.remove_time_points_after(1.0, true);
        assert_eq!(s.time_points(), vec![0.0]);
    }

    #[test]
    fn copy_from_replaces_tail() {
        let mut dst = stream_with(&[0.0, 1.0, 2.0, 3.0]);
        let mut src = stream_with(&[0.0, 1.5, 2.5, 4.0]);
        src.set_mass_flow(1.5, kgps(100.0));
        dst.copy_from(&src, 1.0, 2.5).unwrap();
        assert_eq!(dst.time_points(), vec![0.0, 1.5, 2.5]);
        assert_eq!(dst.mass_flow_raw(1.5), 100.0);
    }

    #[test]
    fn copy_from_rejects_other_structure() {
        let mut dst = stream_with(&[0.0]);
        let src = MaterialStream::new("X", StreamStructure::new(["B"], ["gas"], 1));
        assert!(matches!(
            dst.copy_from(&src, 0.0, 1.0),
            Err(StreamError::StructureMismatch { .. })
        ));
    }

    #[test]
    fn reduce_keeps_last_and_spaced_points() {
        let mut s = stream_with(&[0.0, 0.1, 0.2, 1.0, 1.05, 2.0, 3.0]);
        s.reduce_time_points(0.0, 3.0, 0.5);
        assert_eq!(s.time_points(), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn reduce_leaves_short_intervals() {
        let mut s = stream_with(&[0.0, 0.1, 0.2]);
        s.reduce_time_points(0.0, 1.0, 10.0);
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn values_interpolate_and_clamp() {
        let s = stream_with(&[1.0, 3.0]);
        assert_eq!(s.mass_flow_raw(2.0), 2.0);
        assert_eq!(s.mass_flow_raw(0.0), 1.0);
        assert_eq!(s.mass_flow_raw(10.0), 3.0);
    }

    #[test]
    fn phase_access_is_checked() {
        let mut s = stream_with(&[0.0]);
        assert!(s.set_phase_fraction(0.0, 0, 1.0).is_ok());
        assert!(matches!(
            s.phase_fraction(0.0, 3),
            Err(StreamError::UnknownPhase { index: 3, count: 1 })
        ));
        assert!(s.set_distribution(0.0, 0, DVector::from_vec(vec![1.0, 2.0])).is_err());
        s.set_distribution(0.0, 0, DVector::from_vec(vec![0.5])).unwrap();
        assert_eq!(s.distribution(0.0, 0).unwrap()[0], 0.5);
    }
}
