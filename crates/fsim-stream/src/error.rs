//! Error types for stream operations.

use fsim_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    #[error("Stream structure mismatch: {what}")]
    StructureMismatch { what: String },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Phase index {index} out of range ({count} phases)")]
    UnknownPhase { index: usize, count: usize },

    #[error("Corrupt stream data: {what}")]
    Corrupt { what: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type StreamResult<T> = Result<T, StreamError>;

impl From<StreamError> for CoreError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Core(inner) => inner,
            StreamError::InvalidArg { what } => CoreError::InvalidArg { what },
            _ => CoreError::Invariant {
                what: "stream operation failed",
            },
        }
    }
}
