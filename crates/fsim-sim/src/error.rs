//! Error types for flowsheet simulation.

use thiserror::Error;

/// Errors that end a simulation run or prevent it from starting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("{what} not found")]
    NotFound { what: String },

    /// Pre-run validation failed; the run never started.
    #[error("{message}")]
    Structural { message: String },

    /// Numeric limit hit while solving a recycle partition.
    #[error(
        "{message} (partition {partition}, time window #{window}, iteration #{iteration})"
    )]
    Fatal {
        message: String,
        partition: usize,
        window: usize,
        iteration: usize,
    },

    #[error("Unit '{unit}': {message}")]
    UnitFailure { unit: String, message: String },

    /// Cooperative stop observed at a poll point.
    #[error("Simulation stopped")]
    Stopped,

    #[error("Backend error: {message}")]
    Backend { message: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<fsim_stream::StreamError> for SimError {
    fn from(e: fsim_stream::StreamError) -> Self {
        SimError::Backend {
            message: e.to_string(),
        }
    }
}

impl From<fsim_graph::GraphError> for SimError {
    fn from(e: fsim_graph::GraphError) -> Self {
        match e {
            fsim_graph::GraphError::UnresolvableCycle { .. }
            | fsim_graph::GraphError::SelfLoop { .. } => SimError::Structural {
                message: e.to_string(),
            },
            _ => SimError::Backend {
                message: e.to_string(),
            },
        }
    }
}

impl From<fsim_core::CoreError> for SimError {
    fn from(e: fsim_core::CoreError) -> Self {
        SimError::Backend {
            message: e.to_string(),
        }
    }
}
