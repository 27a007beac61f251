//! Error types for Stepwriter

use thiserror::Error;

/// Errors that can occur while configuring the tracker or talking to the store
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Unknown activity kind: {0}")]
    UnknownActivity(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid body parameters: {0}")]
    InvalidBodyParams(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Step store unavailable: {0}")]
    StoreError(String),

    #[error("Step store rejected the request: {0}")]
    Rejected(String),

    #[error("No authenticated user")]
    Unauthenticated,

    #[error("Tracker has stopped")]
    TrackerStopped,
}

impl TrackerError {
    /// Whether the error came from the remote store rather than local input.
    ///
    /// Transient errors keep the pending delta for the next save attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, TrackerError::StoreError(_) | TrackerError::Rejected(_))
    }
}
