//! Product sink.

use fsim_stream::{MaterialStream, StreamStructure};

use crate::error::UnitResult;
use crate::traits::{Port, PortStreams, Unit, check_io};

/// Product: records everything arriving at its inlet in an internal holdup.
#[derive(Debug, Clone)]
pub struct Product {
    name: String,
    ports: [Port; 1],
    holdup: MaterialStream,
}

impl Product {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            holdup: MaterialStream::new(format!("{name} holdup"), StreamStructure::default()),
            name,
            ports: [Port::inlet("In")],
        }
    }

    /// Material received so far.
    pub fn holdup(&self) -> &MaterialStream {
        &self.holdup
    }
}

impl Unit for Product {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        "Product"
    }

    fn ports(&self) -> &[Port] {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut [Port] {
        &mut self.ports
    }

    fn initialize(&mut self, _t: f64, io: &mut PortStreams<'_>) -> UnitResult<()> {
        check_io(&self.ports, io)?;
        self.holdup.setup_structure(io.input(0)?);
        Ok(())
    }

    fn simulate(&mut self, t: f64, io: &mut PortStreams<'_>) -> UnitResult<()> {
        let value = io.input(0)?.sample(t);
        self.holdup.remove_time_points_after(t, false);
        self.holdup.set_point(t, value)?;
        Ok(())
    }

    fn holdups(&self) -> Vec<&MaterialStream> {
        vec![&self.holdup]
    }

    fn reduce_holdups(&mut self, t1: f64, t2: f64, step: f64) {
        self.holdup.reduce_time_points(t1, t2, step);
    }
}
