//! Mock model streams for integration tests
//!
//! - [`ScriptedConnector`]: in-memory streams; tests push inbound events by hand
//!   and inspect every outbound event the session sent
//! - [`websocket`]: a WebSocket model service answering audio with a scripted reply

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod websocket;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use sonic_gateway::core::remote::{ModelStreamConnector, RemoteStream, StreamDriver};
use sonic_gateway::errors::{SessionError, SessionResult};

/// One stream opened through a [`ScriptedConnector`].
#[derive(Clone)]
pub struct MockConnection {
    sent: Arc<Mutex<Vec<Value>>>,
    input_closed: Arc<AtomicBool>,
    inbound: mpsc::Sender<SessionResult<String>>,
}

impl MockConnection {
    /// Outbound events received so far, parsed
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }

    /// Names of the outbound events received so far (`sessionStart`, ...)
    pub fn sent_names(&self) -> Vec<String> {
        self.sent().iter().filter_map(event_name).collect()
    }

    /// Outbound events with the given name
    pub fn sent_named(&self, name: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter_map(|v| v["event"].get(name).cloned())
            .collect()
    }

    /// Whether the session dropped its sender (end of input)
    pub fn input_closed(&self) -> bool {
        self.input_closed.load(Ordering::SeqCst)
    }

    /// Deliver one inbound event to the session
    pub async fn push(&self, event: Value) {
        let _ = self.inbound.send(Ok(event.to_string())).await;
    }

    /// Deliver a stream error to the session
    pub async fn fail(&self, message: &str) {
        let _ = self
            .inbound
            .send(Err(SessionError::Stream(message.to_string())))
            .await;
    }

    /// Wait until an outbound event with the given name has arrived
    pub async fn wait_for(&self, name: &str, timeout: Duration) -> bool {
        wait_until(timeout, || self.sent_names().iter().any(|n| n == name)).await
    }
}

/// Connector returning in-memory streams.
#[derive(Default)]
pub struct ScriptedConnector {
    connections: Mutex<Vec<MockConnection>>,
    refuse: AtomicBool,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every following `connect` fail
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// The `index`-th opened stream
    pub fn connection(&self, index: usize) -> MockConnection {
        self.connections.lock()[index].clone()
    }

    pub fn last_connection(&self) -> MockConnection {
        let connections = self.connections.lock();
        connections[connections.len() - 1].clone()
    }
}

#[async_trait]
impl ModelStreamConnector for ScriptedConnector {
    async fn connect(&self) -> SessionResult<RemoteStream> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(SessionError::Initialization("connection refused".to_string()));
        }

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(256);
        let (inbound_tx, inbound_rx) = mpsc::channel::<SessionResult<String>>(256);

        let connection = MockConnection {
            sent: Arc::new(Mutex::new(Vec::new())),
            input_closed: Arc::new(AtomicBool::new(false)),
            inbound: inbound_tx,
        };

        let sent = connection.sent.clone();
        let input_closed = connection.input_closed.clone();
        let driver = tokio::spawn(async move {
            while let Some(raw) = outbound_rx.recv().await {
                if let Ok(value) = serde_json::from_str::<Value>(&raw) {
                    sent.lock().push(value);
                }
            }
            input_closed.store(true, Ordering::SeqCst);
        });

        self.connections.lock().push(connection);
        Ok(RemoteStream::new(
            outbound_tx,
            inbound_rx,
            StreamDriver::new(driver),
        ))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Name of the single key under `event`
pub fn event_name(value: &Value) -> Option<String> {
    value["event"]
        .as_object()
        .and_then(|event| event.keys().next().cloned())
}

/// Poll `condition` every 5 ms until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// =============================================================================
// Inbound Event Builders
// =============================================================================

pub fn content_start(role: &str, stage: Option<&str>) -> Value {
    let mut body = json!({ "role": role, "type": "TEXT" });
    if let Some(stage) = stage {
        body["additionalModelFields"] =
            Value::String(json!({ "generationStage": stage }).to_string());
    }
    json!({ "event": { "contentStart": body } })
}

pub fn text_output(role: &str, content: &str) -> Value {
    json!({ "event": { "textOutput": { "role": role, "content": content } } })
}

pub fn audio_output(content: &str) -> Value {
    json!({ "event": { "audioOutput": { "content": content } } })
}

pub fn tool_use(tool_name: &str, tool_use_id: &str, content: Value) -> Value {
    json!({
        "event": {
            "toolUse": {
                "toolName": tool_name,
                "toolUseId": tool_use_id,
                "content": content.to_string(),
            }
        }
    })
}

pub fn tool_content_end() -> Value {
    json!({ "event": { "contentEnd": { "type": "TOOL", "stopReason": "TOOL_USE" } } })
}

pub fn completion_end() -> Value {
    json!({ "event": { "completionEnd": { "stopReason": "END_TURN" } } })
}
