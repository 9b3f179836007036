//! Client-facing transport for a duplex session.
//!
//! The session never touches the client socket directly. It emits
//! [`OutgoingFrame`]s through a [`Transport`]; the WebSocket handler owns the
//! socket and drains a channel of [`TransportRoute`]s.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::errors::{SessionError, SessionResult};

/// Frames sent from the gateway to the client.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingFrame {
    /// Transcript text from either speaker
    Text {
        data: String,
        role: String,
        /// Local wall-clock time `HH:MM:SS.mmm`
        timestamp: String,
        unix_timestamp: f64,
        is_speculative: bool,
    },
    /// Base64 PCM16 mono 24 kHz, possibly several model chunks combined
    Audio { data: String },
    /// Seconds from end of user speech to first assistant audio
    Latency { data: f64 },
    /// Background tool progress
    ToolStatus {
        tool_name: String,
        status: String,
        message: String,
        progress: u8,
    },
}

impl OutgoingFrame {
    pub fn tool_status(tool_name: &str, status: &str, message: impl Into<String>, progress: u8) -> Self {
        OutgoingFrame::ToolStatus {
            tool_name: tool_name.to_string(),
            status: status.to_string(),
            message: message.into(),
            progress: progress.min(100),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutgoingFrame::Text { .. } => "text",
            OutgoingFrame::Audio { .. } => "audio",
            OutgoingFrame::Latency { .. } => "latency",
            OutgoingFrame::ToolStatus { .. } => "tool_status",
        }
    }
}

/// Messages consumed by the socket sender task.
#[derive(Debug, Clone)]
pub enum TransportRoute {
    Frame(OutgoingFrame),
    Close,
}

/// Outbound path from a session to its client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one frame. Failure means the client is gone or the frame was dropped.
    async fn send_frame(&self, frame: OutgoingFrame) -> SessionResult<()>;

    /// Whether the client side is still reachable.
    fn is_open(&self) -> bool;
}

/// [`Transport`] backed by the handler's sender channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<TransportRoute>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::Sender<TransportRoute>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send_frame(&self, frame: OutgoingFrame) -> SessionResult<()> {
        self.tx
            .send(TransportRoute::Frame(frame))
            .await
            .map_err(|e| SessionError::Delivery(format!("client channel closed: {e}")))
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}
