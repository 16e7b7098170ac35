//! Core traits for unit models.

use fsim_core::StreamId;
use fsim_stream::MaterialStream;

use crate::error::{UnitError, UnitResult};

/// Direction of a unit port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Inlet,
    Outlet,
}

/// A named connection point; `stream` is set when the flowsheet wires it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub direction: PortDirection,
    pub stream: Option<StreamId>,
}

impl Port {
    pub fn inlet(name: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: PortDirection::Inlet,
            stream: None,
        }
    }

    pub fn outlet(name: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: PortDirection::Outlet,
            stream: None,
        }
    }
}

/// Streams attached to a unit's ports, in port order per direction.
///
/// Inlets are read-only; outlets are exclusively borrowed for the duration
/// of one unit call.
pub struct PortStreams<'a> {
    pub inputs: Vec<&'a MaterialStream>,
    pub outputs: Vec<&'a mut MaterialStream>,
}

impl<'a> PortStreams<'a> {
    pub fn new(inputs: Vec<&'a MaterialStream>, outputs: Vec<&'a mut MaterialStream>) -> Self {
        Self { inputs, outputs }
    }

    pub fn input(&self, i: usize) -> UnitResult<&MaterialStream> {
        self.inputs.get(i).copied().ok_or(UnitError::PortCount {
            direction: "inlet",
            expected: i + 1,
            got: self.inputs.len(),
        })
    }

    pub fn output(&mut self, i: usize) -> UnitResult<&mut MaterialStream> {
        let got = self.outputs.len();
        self.outputs
            .get_mut(i)
            .map(|s| &mut **s)
            .ok_or(UnitError::PortCount {
                direction: "outlet",
                expected: i + 1,
                got,
            })
    }

    /// Union of inlet time points within `[t1, t2]`.
    pub fn input_time_points(&self, t1: f64, t2: f64) -> Vec<f64> {
        self.inputs.iter().fold(Vec::new(), |acc, s| {
            fsim_core::union_sorted(&acc, &s.time_points_in(t1, t2))
        })
    }
}

/// Severity of a message raised by a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitMessage {
    pub severity: Severity,
    pub text: String,
}

/// Pending unit messages, drained by the scheduler after every call.
#[derive(Debug, Clone, Default)]
pub struct MessageQueue {
    pending: Vec<UnitMessage>,
}

impl MessageQueue {
    pub fn info(&mut self, text: impl Into<String>) {
        self.push(Severity::Info, text);
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        self.push(Severity::Warning, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push(Severity::Error, text);
    }

    fn push(&mut self, severity: Severity, text: impl Into<String>) {
        self.pending.push(UnitMessage {
            severity,
            text: text.into(),
        });
    }

    pub fn drain(&mut self) -> Vec<UnitMessage> {
        std::mem::take(&mut self.pending)
    }
}

/// A processing unit evaluated by the scheduler.
///
/// Steady units compute outlet values at single time points through
/// [`Unit::simulate`]; dynamic units integrate over an interval through
/// [`Unit::simulate_interval`]. Units that keep internal state across
/// recycle iterations implement [`Unit::save_state`] / [`Unit::load_state`].
pub trait Unit: Send {
    /// Instance name for log messages and error reports.
    fn name(&self) -> &str;

    /// Model name for log messages.
    fn model_name(&self) -> &str;

    fn ports(&self) -> &[Port];

    fn ports_mut(&mut self) -> &mut [Port];

    /// Dynamic units are simulated over whole intervals.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Pre-run consistency check of parameters.
    fn validate(&self) -> UnitResult<()> {
        Ok(())
    }

    /// Called once per run before the first evaluation.
    fn initialize(&mut self, _t: f64, _io: &mut PortStreams<'_>) -> UnitResult<()> {
        Ok(())
    }

    /// Compute outlets at time point `t`.
    fn simulate(&mut self, t: f64, io: &mut PortStreams<'_>) -> UnitResult<()>;

    /// Compute outlets over `[t1, t2]`.
    ///
    /// Default implementation evaluates every inlet time point in the interval
    /// plus `t2`.
    fn simulate_interval(&mut self, t1: f64, t2: f64, io: &mut PortStreams<'_>) -> UnitResult<()> {
        let mut points = io.input_time_points(t1, t2);
        if points.last().is_none_or(|&t| t < t2) {
            points.push(t2);
        }
        for t in points {
            self.simulate(t, io)?;
        }
        Ok(())
    }

    /// Called once per run after the last evaluation.
    fn finalize(&mut self) -> UnitResult<()> {
        Ok(())
    }

    /// Remember internal state after a converged window `[t1, t2]`.
    fn save_state(&mut self, _t1: f64, _t2: f64) {}

    /// Restore the state remembered by the last `save_state`.
    fn load_state(&mut self) {}

    /// Time points the unit itself needs within `[t1, t2]`.
    fn own_time_points(&self, _t1: f64, _t2: f64) -> Vec<f64> {
        Vec::new()
    }

    /// Internally stored time-dependent material, for reporting.
    fn holdups(&self) -> Vec<&MaterialStream> {
        Vec::new()
    }

    /// Thin out internally stored time-dependent data.
    fn reduce_holdups(&mut self, _t1: f64, _t2: f64, _step: f64) {}

    /// Take pending info/warning/error messages.
    fn drain_messages(&mut self) -> Vec<UnitMessage> {
        Vec::new()
    }
}

/// Check that `io` matches the number of ports the unit declares.
pub(crate) fn check_io(ports: &[Port], io: &PortStreams<'_>) -> UnitResult<()> {
    let inlets = ports
        .iter()
        .filter(|p| p.direction == PortDirection::Inlet)
        .count();
    let outlets = ports.len() - inlets;
    if io.inputs.len() != inlets {
        return Err(UnitError::PortCount {
            direction: "inlet",
            expected: inlets,
            got: io.inputs.len(),
        });
    }
    if io.outputs.len() != outlets {
        return Err(UnitError::PortCount {
            direction: "outlet",
            expected: outlets,
            got: io.outputs.len(),
        });
    }
    Ok(())
}
