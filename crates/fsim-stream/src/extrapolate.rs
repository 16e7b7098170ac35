use fsim_core::numeric::{lerp, spline_extrapolate};

use crate::point::StreamPoint;
use crate::stream::MaterialStream;

impl MaterialStream {
    /// Drop points after `t` and hold the value at `t` up to `t_extra`.
    pub fn extrapolate_nearest(&mut self, t_extra: f64, t: f64) {
        if t >= t_extra {
            return;
        }
        self.remove_time_points_after(t, false);
        let value = self.sample(t);
        self.insert_extrapolated(t_extra, value);
    }

    /// Drop points after `t2` and continue the line through `t1` and `t2` to `t_extra`.
    pub fn extrapolate_linear(&mut self, t_extra: f64, t1: f64, t2: f64) {
        if t1 >= t2 || t2 >= t_extra {
            return;
        }
        self.remove_time_points_after(t2, false);
        let p1 = self.sample(t1);
        let p2 = self.sample(t2);
        let value = StreamPoint::combine3(&p1, &p2, &p2, |y1, y2, _| lerp(t1, t2, y1, y2, t_extra));
        self.insert_extrapolated(t_extra, value);
    }

    /// Drop points after `t3` and continue a natural spline through three anchors.
    pub fn extrapolate_spline(&mut self, t_extra: f64, t1: f64, t2: f64, t3: f64) {
        if t1 >= t2 || t2 >= t3 || t3 >= t_extra {
            return;
        }
        self.remove_time_points_after(t3, false);
        let p1 = self.sample(t1);
        let p2 = self.sample(t2);
        let p3 = self.sample(t3);
        let xs = [t1, t2, t3];
        let value = StreamPoint::combine3(&p1, &p2, &p3, |y1, y2, y3| {
            spline_extrapolate([y1, y2, y3], xs, t_extra)
        });
        self.insert_extrapolated(t_extra, value);
    }

    fn insert_extrapolated(&mut self, t: f64, value: StreamPoint) {
        let i = self.add_time_point(t);
        *self.point_at_index_mut(i) = value;
    }
}

#[cfg(test)]
mod tests {
    use crate::{MaterialStream, StreamStructure};
    use fsim_core::kgps;

    fn linear_stream() -> MaterialStream {
        let mut s = MaterialStream::new("R", StreamStructure::new(["A"], ["liquid"], 1));
        for t in [0.0, 1.0, 2.0, 3.0] {
            s.set_mass_flow(t, kgps(2.0 * t + 1.0));
        }
        s
    }

    #[test]
    fn nearest_holds_constant() {
        let mut s = MaterialStream::new("C", StreamStructure::new(["A"], ["liquid"], 1));
        s.set_mass_flow(0.0, kgps(4.2));
        s.set_mass_flow(1.0, kgps(4.2));
        s.extrapolate_nearest(5.0, 1.0);
        assert_eq!(s.time_points(), vec![0.0, 1.0, 5.0]);
        assert_eq!(s.mass_flow_raw(5.0), 4.2);
    }

    #[test]
    fn linear_continues_line_and_drops_tail() {
        let mut s = linear_stream();
        s.extrapolate_linear(6.0, 1.0, 2.0);
        assert_eq!(s.time_points(), vec![0.0, 1.0, 2.0, 6.0]);
        assert_eq!(s.mass_flow_raw(6.0), 13.0);
    }

    #[test]
    fn spline_continues_line() {
        let mut s = linear_stream();
        s.extrapolate_spline(5.0, 1.0, 2.0, 3.0);
        assert!((s.mass_flow_raw(5.0) - 11.0).abs() < 1e-9);
    }

    #[test]
    fn misordered_anchors_are_ignored() {
        let mut s = linear_stream();
        s.extrapolate_linear(1.0, 2.0, 3.0);
        s.extrapolate_nearest(2.0, 3.0);
        assert_eq!(s.time_points(), vec![0.0, 1.0, 2.0, 3.0]);
    }
}
