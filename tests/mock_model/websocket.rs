//! WebSocket mock model service
//!
//! Speaks the `{ "event": ... }` JSON protocol. The first non-empty
//! `audioInput` of each connection triggers a scripted assistant turn.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};

use super::{audio_output, content_start, event_name, text_output, tool_content_end, tool_use};

/// Scripted reply of the mock service
#[derive(Clone, Debug)]
pub struct MockModelBehavior {
    pub reply_text: String,
    /// PCM bytes returned as assistant audio
    pub reply_audio: Vec<u8>,
    /// Tool requested after the reply, if any
    pub call_tool: Option<String>,
}

impl Default for MockModelBehavior {
    fn default() -> Self {
        Self {
            reply_text: "Hello from the model".to_string(),
            reply_audio: vec![1, 0, 2, 0, 3, 0, 4, 0],
            call_tool: None,
        }
    }
}

/// Shared state of the mock service
#[derive(Default)]
pub struct MockModelState {
    pub connection_count: AtomicU64,
    received: Mutex<Vec<(u64, Value)>>,
    behavior: MockModelBehavior,
}

impl MockModelState {
    /// Events received on connection `conn` (1-based)
    pub fn received_names(&self, conn: u64) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .filter(|(c, _)| *c == conn)
            .filter_map(|(_, v)| event_name(v))
            .collect()
    }

    /// Bodies of events named `name` across every connection
    pub fn received_named(&self, name: &str) -> Vec<Value> {
        self.received
            .lock()
            .iter()
            .filter_map(|(_, v)| v["event"].get(name).cloned())
            .collect()
    }
}

/// Start the mock service on an ephemeral port
pub async fn start_mock_model(behavior: MockModelBehavior) -> (String, Arc<MockModelState>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock model listener");
    let addr: SocketAddr = listener.local_addr().expect("mock model address");
    let state = Arc::new(MockModelState {
        behavior,
        ..Default::default()
    });

    let server_state = state.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let state = server_state.clone();
            tokio::spawn(async move {
                let _ = handle_connection(stream, state).await;
            });
        }
    });

    (format!("ws://{addr}/model"), state)
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<MockModelState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();
    let conn_id = state.connection_count.fetch_add(1, Ordering::SeqCst) + 1;
    let mut replied = false;

    while let Some(msg) = read.next().await {
        let text = match msg? {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        let Ok(value) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let name = event_name(&value);
        state.received.lock().push((conn_id, value.clone()));

        match name.as_deref() {
            Some("audioInput") if !replied => {
                let content = value["event"]["audioInput"]["content"]
                    .as_str()
                    .unwrap_or_default();
                if content.is_empty() {
                    continue;
                }
                replied = true;

                let behavior = &state.behavior;
                let audio = base64::engine::general_purpose::STANDARD.encode(&behavior.reply_audio);
                let mut script = vec![
                    content_start("ASSISTANT", Some("SPECULATIVE")),
                    text_output("ASSISTANT", &behavior.reply_text),
                    audio_output(&audio),
                ];
                if let Some(tool) = &behavior.call_tool {
                    script.push(tool_use(tool, "mock-tool-use-1", serde_json::json!({})));
                    script.push(tool_content_end());
                }
                for event in script {
                    write.send(Message::Text(event.to_string().into())).await?;
                }
            }
            Some("sessionEnd") => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            _ => {}
        }
    }
    Ok(())
}
