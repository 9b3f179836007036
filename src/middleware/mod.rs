pub mod connection_limit;

// Re-export middleware functions
pub use connection_limit::{ConnectionLease, ConnectionSlot, connection_limit_middleware};
