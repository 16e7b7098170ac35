//! Error types for unit operations.

use fsim_core::CoreError;
use fsim_stream::StreamError;
use thiserror::Error;

/// Errors that can occur while setting up or evaluating a unit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("Invalid parameter: {what}")]
    InvalidParameter { what: String },

    #[error("Port '{port}' is not connected")]
    NotConnected { port: String },

    #[error("Expected {expected} {direction} streams, got {got}")]
    PortCount {
        direction: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{message}")]
    Failed { message: String },

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}

pub type UnitResult<T> = Result<T, UnitError>;

impl From<UnitError> for CoreError {
    fn from(e: UnitError) -> Self {
        match e {
            UnitError::Stream(inner) => inner.into(),
            _ => CoreError::Invariant {
                what: "unit evaluation failed",
            },
        }
    }
}
