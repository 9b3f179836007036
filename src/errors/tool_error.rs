use std::time::Duration;

use thiserror::Error;

/// Result type for tool execution
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors raised while executing a tool.
///
/// None of these ever reach the session: the engine turns each of them into a
/// structured result payload.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolError {
    /// The handler did not finish before its deadline
    #[error("Tool execution timed out after {0:?}")]
    Timeout(Duration),

    /// The handler failed
    #[error("{0}")]
    Failed(String),

    /// No handler is registered under this name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The input payload could not be interpreted
    #[error("Invalid tool input: {0}")]
    InvalidInput(String),

    /// An upstream HTTP lookup failed
    #[error("HTTP request failed: {0}")]
    Http(String),
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        ToolError::Http(err.to_string())
    }
}
