//! Time-dependent source of material.

use fsim_stream::MaterialStream;

use crate::error::{UnitError, UnitResult};
use crate::traits::{Port, PortStreams, Unit, check_io};

/// Feed unit: copies a user-defined stream to its single outlet.
///
/// The feed's own time points are the points of its definition, so steady
/// evaluation visits every point the user entered.
#[derive(Debug, Clone)]
pub struct Feed {
    name: String,
    ports: [Port; 1],
    source: MaterialStream,
}

impl Feed {
    pub fn new(name: impl Into<String>, source: MaterialStream) -> Self {
        Self {
            name: name.into(),
            ports: [Port::outlet("Out")],
            source,
        }
    }

    pub fn source(&self) -> &MaterialStream {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut MaterialStream {
        &mut self.source
    }
}

impl Unit for Feed {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        "Feed"
    }

    fn ports(&self) -> &[Port] {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut [Port] {
        &mut self.ports
    }

    fn validate(&self) -> UnitResult<()> {
        if self.source.is_empty() {
            return Err(UnitError::InvalidParameter {
                what: format!("feed '{}' has no time points defined", self.name),
            });
        }
        Ok(())
    }

    fn initialize(&mut self, _t: f64, io: &mut PortStreams<'_>) -> UnitResult<()> {
        check_io(&self.ports, io)?;
        let out = io.output(0)?;
        if !out.same_structure(&self.source) {
            return Err(UnitError::InvalidParameter {
                what: format!(
                    "feed '{}' definition does not match the structure of stream '{}'",
                    self.name,
                    out.name()
                ),
            });
        }
        Ok(())
    }

    fn simulate(&mut self, t: f64, io: &mut PortStreams<'_>) -> UnitResult<()> {
        let value = self.source.sample(t);
        io.output(0)?.set_point(t, value)?;
        Ok(())
    }

    fn own_time_points(&self, t1: f64, t2: f64) -> Vec<f64> {
        self.source.time_points_in(t1, t2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsim_core::kgps;
    use fsim_stream::StreamStructure;

    fn structure() -> StreamStructure {
        StreamStructure::new(["A"], ["liquid"], 1)
    }

    #[test]
    fn empty_definition_is_invalid() {
        let feed = Feed::new("F", MaterialStream::new("def", structure()));
        assert!(matches!(feed.validate(), Err(UnitError::InvalidParameter { .. })));
    }

    #[test]
    fn copies_definition_to_outlet() {
        let mut def = MaterialStream::new("def", structure());
        def.set_mass_flow(0.0, kgps(1.0));
        def.set_mass_flow(10.0, kgps(3.0));
        let mut feed = Feed::new("F", def);
        assert_eq!(feed.own_time_points(0.0, 5.0), vec![0.0]);

        let mut out = MaterialStream::new("out", structure());
        let mut io = PortStreams::new(vec![], vec![&mut out]);
        feed.initialize(0.0, &mut io).unwrap();
        feed.simulate(5.0, &mut io).unwrap();
        assert_eq!(out.mass_flow_raw(5.0), 2.0);
    }

    #[test]
    fn structure_mismatch_fails_initialization() {
        let mut def = MaterialStream::new("def", structure());
        def.set_mass_flow(0.0, kgps(1.0));
        let mut feed = Feed::new("F", def);
        let mut out = MaterialStream::new("out", StreamStructure::new(["B"], ["gas"], 1));
        let mut io = PortStreams::new(vec![], vec![&mut out]);
        assert!(feed.initialize(0.0, &mut io).is_err());
    }
}
