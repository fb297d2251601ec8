//! Error types for stepwright-core

use crate::model::StepStatus;
use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// A step was dispatched with no live page
    #[error("no active page")]
    NoActivePage,

    /// A step status change that the lifecycle does not allow
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: StepStatus,
        /// Requested status
        to: StepStatus,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// LLM provider error
    #[error("llm error: {0}")]
    Llm(#[from] stepwright_llm::Error),

    /// Browser error
    #[error("browser error: {0}")]
    Browser(#[from] stepwright_browser::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
