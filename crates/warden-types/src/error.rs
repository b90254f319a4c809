//! Error hierarchy for Warden.

use thiserror::Error;

/// Errors raised while talking to an agent session.
///
/// These surface to whoever issued the prompt unmodified: the aggregator
/// never retries and never returns a partial transcript.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to spawn agent process '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Session response stream already consumed")]
    Exhausted,

    #[error("Failed to decode frame: {message} (line: {line})")]
    Decode { message: String, line: String },

    #[error("Tool call authorization failed: {0}")]
    Authorization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}
