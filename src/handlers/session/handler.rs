//! Session WebSocket handler
//!
//! One WebSocket per client id. The handler owns the socket: a sender task
//! drains [`TransportRoute`]s produced by the session, and the receive loop
//! feeds client frames into the [`DuplexSession`].

use std::sync::Arc;

use axum::{
    Extension,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::core::session::DuplexSession;
use crate::core::transport::{ChannelTransport, TransportRoute};
use crate::middleware::{ConnectionLease, ConnectionSlot};
use crate::state::AppState;

use super::messages::IncomingMessage;

/// Channel buffer between the session and the socket sender task
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Time allowed for queued frames to reach the client after the session closes
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Session WebSocket handler
///
/// Upgrades `GET /ws/{client_id}` to a WebSocket bridged to the model stream.
pub async fn session_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<Arc<AppState>>,
    lease: Option<Extension<ConnectionLease>>,
) -> Response {
    info!(client_id = %client_id, "Session WebSocket upgrade requested");

    // Held by the upgrade callback, so the slot is released even if the upgrade never completes
    let slot = lease.and_then(|Extension(lease)| lease.take());

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_session_socket(socket, state, client_id, slot))
}

/// Outcome of processing one client frame
enum Flow {
    Continue,
    /// The model stream was restarted; refresh the stream watch
    Restarted,
    Stop,
}

async fn handle_session_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    client_id: String,
    _slot: Option<ConnectionSlot>,
) {
    info!(client_id = %client_id, "Client connected");

    let (mut sender, mut receiver) = socket.split();
    let (route_tx, mut route_rx) = mpsc::channel::<TransportRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing frames
    let sender_task = tokio::spawn(async move {
        while let Some(route) = route_rx.recv().await {
            let result = match route {
                TransportRoute::Frame(frame) => match serde_json::to_string(&frame) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing frame: {}", e);
                        continue;
                    }
                },
                TransportRoute::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let transport = Arc::new(ChannelTransport::new(route_tx.clone()));
    let mut session = DuplexSession::new(
        client_id.clone(),
        app_state.config.session.clone(),
        app_state.connector.clone(),
        transport,
        app_state.tools.clone(),
        app_state.config.tools.clone(),
    );
    let handle = session.handle();
    app_state.register_session(handle.clone());

    let started = match session.start().await {
        Ok(()) => session.open_audio_input().await,
        Err(e) => Err(e),
    };

    if let Err(e) = started {
        error!(client_id = %client_id, "Failed to start session: {}", e);
    } else {
        let idle_timeout = app_state.config.idle_timeout;
        let mut stream_ended = session.stream_ended();

        loop {
            tokio::select! {
                _ = stream_ended.cancelled() => {
                    info!(client_id = %client_id, "Model stream ended, closing connection");
                    break;
                }
                next = tokio::time::timeout(idle_timeout, receiver.next()) => {
                    let msg = match next {
                        Ok(Some(Ok(msg))) => msg,
                        Ok(Some(Err(e))) => {
                            warn!(client_id = %client_id, "WebSocket error: {}", e);
                            break;
                        }
                        Ok(None) => {
                            info!(client_id = %client_id, "WebSocket disconnected by client");
                            break;
                        }
                        Err(_) => {
                            warn!(
                                client_id = %client_id,
                                "WebSocket idle for {}s, closing stale connection",
                                idle_timeout.as_secs()
                            );
                            break;
                        }
                    };

                    match process_message(msg, &mut session).await {
                        Flow::Continue => {}
                        Flow::Restarted => stream_ended = session.stream_ended(),
                        Flow::Stop => break,
                    }
                }
            }
        }
    }

    // Cleanup
    session.close().await;
    app_state.unregister_session(&handle);
    drop(session);

    let _ = route_tx.send(TransportRoute::Close).await;
    drop(route_tx);
    let mut sender_task = sender_task;
    if tokio::time::timeout(SENDER_DRAIN_TIMEOUT, &mut sender_task)
        .await
        .is_err()
    {
        sender_task.abort();
    }

    info!(client_id = %client_id, "Client connection cleaned up");
}

/// Process one client WebSocket message
async fn process_message(msg: Message, session: &mut DuplexSession) -> Flow {
    match msg {
        Message::Text(text) => {
            let incoming: IncomingMessage = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(client_id = %session.client_id(), "Error decoding client message: {}", e);
                    return Flow::Continue;
                }
            };

            if let Err(e) = incoming.validate_size() {
                warn!(client_id = %session.client_id(), "Message validation failed: {}", e);
                return Flow::Continue;
            }

            handle_incoming(incoming, session).await
        }
        Message::Binary(data) => {
            debug!(client_id = %session.client_id(), "Ignoring binary frame: {} bytes", data.len());
            Flow::Continue
        }
        Message::Ping(_) | Message::Pong(_) => Flow::Continue,
        Message::Close(_) => {
            info!(client_id = %session.client_id(), "WebSocket close received");
            Flow::Stop
        }
    }
}

async fn handle_incoming(incoming: IncomingMessage, session: &mut DuplexSession) -> Flow {
    match incoming {
        IncomingMessage::Audio { data } => {
            if !session.is_active() {
                info!(client_id = %session.client_id(), "Session inactive, closing connection");
                return Flow::Stop;
            }
            match session.submit_user_audio(&data).await {
                Ok(()) => Flow::Continue,
                Err(e) if e.is_fatal() => {
                    error!(client_id = %session.client_id(), "Failed to forward audio: {}", e);
                    Flow::Stop
                }
                Err(e) => {
                    warn!(client_id = %session.client_id(), "Dropped audio chunk: {}", e);
                    Flow::Continue
                }
            }
        }
        IncomingMessage::VoiceChange { voice } => match session.change_voice(&voice).await {
            Ok(true) => Flow::Restarted,
            Ok(false) => Flow::Continue,
            Err(e) => {
                error!(client_id = %session.client_id(), "Voice change failed: {}", e);
                Flow::Stop
            }
        },
        IncomingMessage::End => {
            info!(client_id = %session.client_id(), "Client ending stream");
            Flow::Stop
        }
    }
}
