//! Connectors for the bidirectional speech-to-speech model stream.
//!
//! A connector opens one stream per session and hands back a [`RemoteStream`]:
//! a sender for serialized outbound events, a receiver for raw inbound
//! events, and the driver task that moves bytes between the two and the
//! remote service. Dropping the sender ends the input side; the driver then
//! drains the output side and exits.
//!
//! # Backends
//!
//! - [`BedrockConnector`]: AWS Bedrock `InvokeModelWithBidirectionalStream`
//! - [`WebSocketConnector`]: any service speaking the same event JSON over text frames

mod bedrock;
mod websocket;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::{RemoteBackend, ServerConfig};
use crate::errors::{SessionError, SessionResult};

pub use bedrock::{BedrockConnector, BedrockSettings};
pub use websocket::WebSocketConnector;

/// Capacity of the outbound event channel.
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the inbound event channel.
pub const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// Opens model streams.
#[async_trait]
pub trait ModelStreamConnector: Send + Sync {
    /// Open a new bidirectional stream.
    async fn connect(&self) -> SessionResult<RemoteStream>;

    /// Backend name used in logs.
    fn name(&self) -> &'static str;
}

/// One open model stream.
pub struct RemoteStream {
    /// Serialized outbound events, one JSON document per message
    pub sender: mpsc::Sender<String>,
    /// Raw inbound events, or the stream error that ended the stream
    pub receiver: mpsc::Receiver<SessionResult<String>>,
    pub driver: StreamDriver,
}

impl RemoteStream {
    pub fn new(
        sender: mpsc::Sender<String>,
        receiver: mpsc::Receiver<SessionResult<String>>,
        driver: StreamDriver,
    ) -> Self {
        Self {
            sender,
            receiver,
            driver,
        }
    }
}

/// Handle to the background task pumping a model stream.
#[derive(Default)]
pub struct StreamDriver {
    handle: Option<JoinHandle<()>>,
}

impl StreamDriver {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Driver with no background task, for in-process streams.
    pub fn detached() -> Self {
        Self { handle: None }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait up to `grace` for the driver to finish, then abort it.
    ///
    /// The outbound sender must already be dropped or the driver will not
    /// see end of input.
    pub async fn shutdown(mut self, grace: Duration) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            warn!("Model stream driver did not stop within {:?}, aborting", grace);
            handle.abort();
        }
    }
}

impl Drop for StreamDriver {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Build the connector selected by the server configuration.
pub fn create_connector(config: &ServerConfig) -> SessionResult<Arc<dyn ModelStreamConnector>> {
    match config.remote_backend {
        RemoteBackend::Bedrock => Ok(Arc::new(BedrockConnector::new(BedrockSettings::from_config(
            config,
        )))),
        RemoteBackend::WebSocket => {
            let url = config.remote_ws_url.clone().ok_or_else(|| {
                SessionError::Initialization(
                    "remote_ws_url is required for the websocket backend".to_string(),
                )
            })?;
            Ok(Arc::new(WebSocketConnector::new(
                url,
                config.remote_connect_timeout,
            )))
        }
    }
}
