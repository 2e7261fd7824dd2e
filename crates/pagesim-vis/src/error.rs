//! Error types for the simulation client.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a round trip to the simulation service.
///
/// Transport failures, non-2xx responses and an `error` field in the reply
/// body all collapse into this one shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub message: String,
}

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::new(e.to_string())
    }
}

/// Rejected local input. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Frame count is not a positive integer
    #[error("Frame count must be a positive number, got {input:?}")]
    FrameCount { input: String },

    /// Page table size is not a positive integer
    #[error("Page table size must be a positive number, got {input:?}")]
    PageTableSize { input: String },

    /// Page is not a non-negative integer
    #[error("Page must be a non-negative integer, got {input:?}")]
    Page { input: String },

    /// Access sequence had no usable page numbers
    #[error("Access sequence contains no valid page numbers")]
    EmptySequence,

    /// Algorithm name is blank
    #[error("Algorithm must not be empty")]
    Algorithm,
}

/// Errors that can occur in client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid input from a control
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Round trip failed
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// A sequence run owns the session
    #[error("a sequence run is in progress")]
    RunInProgress,

    /// Bad configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
