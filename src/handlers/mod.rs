//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check, tool and session observability endpoints
//! - `session` - Duplex voice session WebSocket

pub mod api;
pub mod session;

pub use session::session_handler;
