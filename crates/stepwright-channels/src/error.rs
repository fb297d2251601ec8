//! Error types for stepwright-channels

use thiserror::Error;

/// Intake error type
#[derive(Debug, Error)]
pub enum Error {
    /// NATS connection or subscription error
    #[error("nats error: {0}")]
    Nats(String),

    /// Message parsing error
    #[error("message parsing error: {0}")]
    Parse(String),

    /// JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
