pub mod events;
pub mod remote;
pub mod session;
pub mod tools;
pub mod transport;

// Re-export commonly used types for convenience
pub use events::{InboundEvent, OutboundEvent};
pub use remote::{
    BedrockConnector, ModelStreamConnector, RemoteStream, StreamDriver, WebSocketConnector,
    create_connector,
};
pub use session::{DuplexSession, SessionConfig, SessionHandle, SessionSnapshot, SessionState};
pub use tools::{Tool, ToolEngine, ToolEngineConfig, ToolKind, ToolRegistry};
pub use transport::{ChannelTransport, OutgoingFrame, Transport, TransportRoute};
