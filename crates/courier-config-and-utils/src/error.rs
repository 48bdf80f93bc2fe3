//! Core error types.

use thiserror::Error;

/// Core error type for configuration and filesystem setup.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration error. Fatal at startup: nothing runs on a config
    /// that fails validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path error (e.g., home directory not found)
    #[error("Path error: {0}")]
    Path(String),
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
