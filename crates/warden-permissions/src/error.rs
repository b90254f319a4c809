//! Error types for validator relay and authorization.

use thiserror::Error;

/// Errors from relaying a tool call to the external validator.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Failed to spawn validator '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Validator '{command}' returned malformed output: {message}")]
    ProtocolDecode {
        command: String,
        message: String,
        output: String,
    },

    #[error("Validator '{command}' timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("Invalid validator matcher '{pattern}': {source}")]
    Matcher {
        pattern: String,
        source: globset::Error,
    },

    #[error("I/O error talking to validator: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize hook request: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that stop a tool call from being authorized at all.
///
/// None of these ever degrade into an allow.
#[derive(Debug, Error)]
pub enum AuthorizeError {
    #[error("Validator failure: {0}")]
    Relay(#[from] RelayError),

    #[error("Strategy '{strategy}' requires a [validator] section")]
    MissingValidator { strategy: String },
}
