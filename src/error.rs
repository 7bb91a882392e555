//! Custom error types for ragdex

use thiserror::Error;

/// Main error type for ragdex operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No supported files found: {0}")]
    NoSupportedFiles(String),

    #[error("No session found: {0}")]
    SessionNotFound(String),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(String),

    #[error("Remote service rejected the request: {0}")]
    RemoteRequest(String),

    #[error("Remote service error: {0}")]
    RemoteTransport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::RemoteTransport(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type alias for ragdex
pub type Result<T> = std::result::Result<T, Error>;
