//! First-order lag on mass flow.

use crate::error::{UnitError, UnitResult};
use crate::traits::{MessageQueue, Port, PortStreams, Unit, UnitMessage, check_io};

#[derive(Debug, Clone, Copy, PartialEq)]
struct LagState {
    time: f64,
    mass_flow: f64,
}

/// Dynamic unit: outlet mass flow follows the inlet with time constant `tau`.
///
/// `y(t + dt) = u + (y(t) - u) * exp(-dt / tau)` with the inlet value `u`
/// taken at the end of each step. Temperature, pressure and composition
/// pass through unchanged.
#[derive(Debug, Clone)]
pub struct Lag {
    name: String,
    ports: [Port; 2],
    tau: f64,
    state: Option<LagState>,
    saved: Option<LagState>,
    messages: MessageQueue,
}

impl Lag {
    pub fn new(name: impl Into<String>, tau: f64) -> UnitResult<Self> {
        let name = name.into();
        if !(tau.is_finite() && tau > 0.0) {
            return Err(UnitError::InvalidParameter {
                what: format!("time constant of '{name}' must be positive, got {tau}"),
            });
        }
        Ok(Self {
            name,
            ports: [Port::inlet("In"), Port::outlet("Out")],
            tau,
            state: None,
            saved: None,
            messages: MessageQueue::default(),
        })
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    fn step(&mut self, t: f64, io: &mut PortStreams<'_>) -> UnitResult<()> {
        let inlet = io.input(0)?.sample(t);
        let u = inlet.mass_flow;
        let y = match self.state {
            Some(s) if t > s.time => u + (s.mass_flow - u) * (-(t - s.time) / self.tau).exp(),
            Some(s) => s.mass_flow,
            None => u,
        };
        self.state = Some(LagState { time: t, mass_flow: y });

        let mut out = inlet;
        out.mass_flow = y;
        io.output(0)?.set_point(t, out)?;
        Ok(())
    }
}

impl Unit for Lag {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        "Lag"
    }

    fn ports(&self) -> &[Port] {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut [Port] {
        &mut self.ports
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn initialize(&mut self, t: f64, io: &mut PortStreams<'_>) -> UnitResult<()> {
        check_io(&self.ports, io)?;
        self.state = None;
        self.step(t, io)?;
        self.saved = self.state;
        Ok(())
    }

    fn simulate(&mut self, t: f64, io: &mut PortStreams<'_>) -> UnitResult<()> {
        self.step(t, io)
    }

    fn simulate_interval(&mut self, t1: f64, t2: f64, io: &mut PortStreams<'_>) -> UnitResult<()> {
        let mut points: Vec<f64> = io
            .input_time_points(t1, t2)
            .into_iter()
            .filter(|&t| t > t1)
            .collect();
        if points.last().is_none_or(|&t| t < t2) {
            points.push(t2);
        }
        if points.len() > 1000 {
            self.messages.warning(format!(
                "{} internal steps in [{t1}, {t2}]",
                points.len()
            ));
        }
        for t in points {
            self.step(t, io)?;
        }
        Ok(())
    }

    fn save_state(&mut self, _t1: f64, _t2: f64) {
        self.saved = self.state;
    }

    fn load_state(&mut self) {
        if let Some(saved) = self.saved {
            self.state = Some(saved);
        }
    }

    fn drain_messages(&mut self) -> Vec<UnitMessage> {
        self.messages.drain()
    }
}
