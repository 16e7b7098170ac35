//! Fixed-ratio splitter.

use crate::error::{UnitError, UnitResult};
use crate::traits::{Port, PortStreams, Unit, check_io};

/// Splitter: sends `fraction` of the inlet mass to `Out1`, the rest to `Out2`.
#[derive(Debug, Clone)]
pub struct Splitter {
    name: String,
    ports: [Port; 3],
    fraction: f64,
}

impl Splitter {
    pub fn new(name: impl Into<String>, fraction: f64) -> UnitResult<Self> {
        let name = name.into();
        if !(0.0..=1.0).contains(&fraction) {
            return Err(UnitError::InvalidParameter {
                what: format!("split fraction of '{name}' must lie in [0, 1], got {fraction}"),
            });
        }
        Ok(Self {
            name,
            ports: [Port::inlet("In"), Port::outlet("Out1"), Port::outlet("Out2")],
            fraction,
        })
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }
}

impl Unit for Splitter {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        "Splitter"
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
        let inlet = io.input(0)?.sample(t);

        let mut first = inlet.clone();
        first.mass_flow = inlet.mass_flow * self.fraction;
        let mut second = inlet;
        second.mass_flow *= 1.0 - self.fraction;

        io.output(0)?.set_point(t, first)?;
        io.output(1)?.set_point(t, second)?;
        Ok(())
    }
}
