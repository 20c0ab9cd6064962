//! Error types for device communication and control-state validation.

use thiserror::Error;

/// Error taxonomy for the device link and the control store.
///
/// Poll failures (`Network`, `Parse`) are non-fatal by policy: they are
/// recorded as link-health status and polling continues. `Validation` is
/// returned synchronously to the caller before any state mutation.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Request could not complete (connect failure, timeout, non-success status).
    #[error("network error: {0}")]
    Network(String),

    /// Response payload not in the expected numeric shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Operator input rejected before mutation.
    #[error("validation error: {0}")]
    Validation(String),
}

impl ControlError {
    pub fn network(err: impl std::fmt::Display) -> Self {
        Self::Network(err.to_string())
    }

    pub fn parse(err: impl std::fmt::Display) -> Self {
        Self::Parse(err.to_string())
    }

    pub fn validation(err: impl std::fmt::Display) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for ControlError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Result type alias for device and store operations.
pub type Result<T> = std::result::Result<T, ControlError>;
