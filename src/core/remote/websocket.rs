//! WebSocket model stream connector.
//!
//! Speaks the same `{ "event": ... }` JSON as Bedrock, one event per text
//! frame. Used for self-hosted relays and for local testing.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

use super::{
    INBOUND_CHANNEL_CAPACITY, ModelStreamConnector, OUTBOUND_CHANNEL_CAPACITY, RemoteStream,
    StreamDriver,
};
use crate::errors::{SessionError, SessionResult};

#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ModelStreamConnector for WebSocketConnector {
    async fn connect(&self) -> SessionResult<RemoteStream> {
        let connect = tokio_tungstenite::connect_async(self.url.as_str());
        let (ws_stream, _response) = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| {
                SessionError::Initialization(format!(
                    "Timed out connecting to {} after {:?}",
                    self.url, self.connect_timeout
                ))
            })?
            .map_err(|e| SessionError::Initialization(format!("WebSocket connect failed: {e}")))?;

        info!("Connected to model stream at {}", self.url);

        let (mut ws_sink, mut ws_source) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) =
            mpsc::channel::<SessionResult<String>>(INBOUND_CHANNEL_CAPACITY);

        let handle = tokio::spawn(async move {
            let mut input_open = true;
            loop {
                tokio::select! {
                    event = outbound_rx.recv(), if input_open => {
                        match event {
                            Some(json) => {
                                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                                    error!("Failed to send model event: {}", e);
                                    let _ = inbound_tx
                                        .send(Err(SessionError::Stream(e.to_string())))
                                        .await;
                                    break;
                                }
                            }
                            None => {
                                // End of input; keep reading until the server closes
                                debug!("Outbound channel closed, sending close frame");
                                input_open = false;
                                let _ = ws_sink.send(Message::Close(None)).await;
                            }
                        }
                    }

                    msg = ws_source.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if inbound_tx.send(Ok(text.to_string())).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Binary(data))) => {
                                match String::from_utf8(data.to_vec()) {
                                    Ok(text) => {
                                        if inbound_tx.send(Ok(text)).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => debug!("Dropping non UTF-8 binary frame: {}", e),
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    error!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                info!("Model stream closed by server");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("Model stream error: {}", e);
                                let _ = inbound_tx
                                    .send(Err(SessionError::Stream(e.to_string())))
                                    .await;
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(RemoteStream::new(
            outbound_tx,
            inbound_rx,
            StreamDriver::new(handle),
        ))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}
