//! Ideal mixer of two inlet streams.

use fsim_stream::StreamPoint;

use crate::error::UnitResult;
use crate::traits::{Port, PortStreams, Unit, check_io};

/// Mixer: outlet mass is the sum of inlet masses, every other value is
/// averaged with mass weights.
#[derive(Debug, Clone)]
pub struct Mixer {
    name: String,
    ports: [Port; 3],
}

impl Mixer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ports: [Port::inlet("In1"), Port::inlet("In2"), Port::outlet("Out")],
        }
    }
}

/// Mass-weighted combination of two points.
pub(crate) fn mix(a: &StreamPoint, b: &StreamPoint) -> StreamPoint {
    let total = a.mass_flow + b.mass_flow;
    let w = if total.abs() > f64::EPSILON {
        b.mass_flow / total
    } else {
        0.0
    };
    let mut out = StreamPoint::blend(a, b, w);
    out.mass_flow = total;
    out
}

impl Unit for Mixer {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        "Mixer"
    }

    fn ports(&self) -> &[Port] {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut [Port] {
        &mut self.ports
    }

    fn initialize(&mut self, _t: f64, io: &mut PortStreams<'_>) -> UnitResult<()> {
        check_io(&self.ports, io)
    }

    fn simulate(&mut self, t: f64, io: &mut PortStreams<'_>) -> UnitResult<()> {
        let a = io.input(0)?.sample(t);
        let b = io.input(1)?.sample(t);
        io.output(0)?.set_point(t, mix(&a, &b))?;
        Ok(())
    }
}
