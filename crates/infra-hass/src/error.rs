//! HomeAssistant Error Types

use thiserror::Error;

/// Result type for validators and client construction
pub type Result<T> = std::result::Result<T, HassError>;

/// Configuration problems detected before a run starts
#[derive(Debug, Error)]
pub enum HassError {
    #[error("invalid entity name: {0}")]
    InvalidEntity(String),

    #[error("failed to create HTTP client: {0}")]
    Client(String),

    #[error("validation request failed: {0}")]
    Connection(String),

    #[error("invalid API validation status code ({0} != 200)")]
    Status(u16),

    #[error("failed to unmarshal API validation response: {reason} ({body})")]
    InvalidResponse { reason: String, body: String },

    #[error("HomeAssistant API is not running: {0}")]
    ApiNotRunning(String),
}
