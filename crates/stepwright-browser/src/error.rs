//! Error types for stepwright-browser

use crate::mcp::McpError;
use crate::script::ParseError;
use thiserror::Error;

/// Browser error type
#[derive(Debug, Error)]
pub enum Error {
    /// MCP transport or protocol failure
    #[error("mcp error: {0}")]
    Mcp(#[from] McpError),

    /// No browser has been launched
    #[error("browser not launched")]
    NotLaunched,

    /// Element action failed; the message is reported as the page produced it
    #[error("{0}")]
    Action(String),

    /// A blocking wait ran out of time
    #[error("{0}")]
    Timeout(String),

    /// Navigation failed
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Page script evaluation failed
    #[error("evaluation failed: {0}")]
    Evaluate(String),

    /// Screenshot capture failed
    #[error("screenshot failed: {0}")]
    Screenshot(String),

    /// URL could not be parsed
    #[error("invalid url '{0}'")]
    InvalidUrl(String),

    /// Action script could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
