//! Error types shared across the gateway.
//!
//! - `session_error`: failures of the duplex session against the model stream
//!   and the client transport.
//! - `tool_error`: failures raised by tool handlers and the execution engine.

pub mod session_error;
pub mod tool_error;

pub use session_error::{SessionError, SessionResult};
pub use tool_error::{ToolError, ToolResult};
