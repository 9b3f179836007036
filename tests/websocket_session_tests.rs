//! WebSocket Session Tests
//!
//! End-to-end: a real axum server with the session route, a WebSocket client
//! playing the browser, and the WebSocket mock model service behind it.

mod mock_model;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message,
};

use mock_model::wait_until;
use mock_model::websocket::{MockModelBehavior, MockModelState, start_mock_model};
use sonic_gateway::config::RemoteBackend;
use sonic_gateway::middleware::connection_limit_middleware;
use sonic_gateway::{AppState, ServerConfig, WebSocketConnector, routes};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn test_config(model_url: &str) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.remote_backend = RemoteBackend::WebSocket;
    config.remote_ws_url = Some(model_url.to_string());
    config.session.bootstrap_pacing = Duration::from_millis(1);
    config.session.teardown_pacing = Duration::from_millis(1);
    config
}

async fn start_gateway(config: ServerConfig) -> (SocketAddr, Arc<AppState>) {
    let url = config.remote_ws_url.clone().unwrap_or_default();
    let connector = Arc::new(WebSocketConnector::new(url, Duration::from_secs(2)));
    let state = AppState::with_connector(config, connector);

    let session_routes = routes::session::create_session_router().layer(
        middleware::from_fn_with_state(state.clone(), connection_limit_middleware),
    );
    let app = Router::new()
        .merge(routes::api::create_public_router())
        .merge(routes::api::create_api_router())
        .merge(session_routes)
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    (addr, state)
}

async fn setup(behavior: MockModelBehavior) -> (SocketAddr, Arc<AppState>, Arc<MockModelState>) {
    let (model_url, model) = start_mock_model(behavior).await;
    let (addr, state) = start_gateway(test_config(&model_url)).await;
    (addr, state, model)
}

async fn connect(addr: SocketAddr, client_id: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws/{client_id}"))
        .await
        .expect("client should connect");
    client
}

async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Read frames until one with `type == kind` arrives
async fn next_frame_of(client: &mut Client, kind: &str) -> Option<Value> {
    let read = async {
        while let Some(Ok(msg)) = client.next().await {
            if let Message::Text(text) = msg {
                let value: Value = serde_json::from_str(&text).ok()?;
                if value["type"] == kind {
                    return Some(value);
                }
            }
        }
        None
    };
    tokio::time::timeout(WAIT, read).await.ok().flatten()
}

/// Read until the server closes the socket
async fn expect_closed(client: &mut Client) -> bool {
    let read = async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return true,
                Some(Ok(_)) => continue,
            }
        }
    };
    tokio::time::timeout(WAIT, read).await.unwrap_or(false)
}

#[tokio::test]
async fn test_audio_round_trip_through_model() {
    let (addr, state, model) = setup(MockModelBehavior::default()).await;
    let mut client = connect(addr, "alice").await;

    send_json(&mut client, json!({"type": "audio", "data": "AAECAw=="})).await;

    let text = next_frame_of(&mut client, "text").await.expect("text frame");
    assert_eq!(text["data"], "Hello from the model");
    assert_eq!(text["role"], "ASSISTANT");
    assert_eq!(text["is_speculative"], true);
    assert!(text["timestamp"].as_str().unwrap().contains(':'));
    assert!(text["unix_timestamp"].as_f64().unwrap() > 0.0);

    let audio = next_frame_of(&mut client, "audio").await.expect("audio frame");
    assert_eq!(audio["data"], "AQACAAMABAA=");

    let names = model.received_names(1);
    assert_eq!(
        &names[..6],
        &[
            "sessionStart",
            "promptStart",
            "contentStart",
            "textInput",
            "contentEnd",
            "contentStart"
        ]
    );
    assert!(names.contains(&"audioInput".to_string()));
    assert_eq!(state.session_count(), 1);
}

#[tokio::test]
async fn test_end_message_tears_down_session() {
    let (addr, state, model) = setup(MockModelBehavior::default()).await;
    let mut client = connect(addr, "bob").await;
    assert!(wait_until(WAIT, || state.session_count() == 1).await);
    assert_eq!(state.ws_connection_count(), 1);

    send_json(&mut client, json!({"type": "end"})).await;
    assert!(expect_closed(&mut client).await);

    assert!(wait_until(WAIT, || model.received_names(1).contains(&"sessionEnd".to_string())).await);
    let names = model.received_names(1);
    let tail: Vec<&str> = names.iter().rev().take(3).rev().map(String::as_str).collect();
    assert_eq!(tail, vec!["contentEnd", "promptEnd", "sessionEnd"]);

    assert!(wait_until(WAIT, || state.session_count() == 0).await);
    assert!(wait_until(WAIT, || state.ws_connection_count() == 0).await);
}

#[tokio::test]
async fn test_client_disconnect_cleans_up() {
    let (addr, state, model) = setup(MockModelBehavior::default()).await;
    let client = connect(addr, "carol").await;
    assert!(wait_until(WAIT, || state.session_count() == 1).await);

    drop(client);

    assert!(wait_until(WAIT, || state.session_count() == 0).await);
    assert!(wait_until(WAIT, || state.ws_connection_count() == 0).await);
    assert!(wait_until(WAIT, || model.received_names(1).contains(&"sessionEnd".to_string())).await);
}

#[tokio::test]
async fn test_voice_change_restarts_model_stream() {
    let (addr, state, model) = setup(MockModelBehavior::default()).await;
    let mut client = connect(addr, "dave").await;
    assert!(wait_until(WAIT, || state.session_count() == 1).await);

    send_json(&mut client, json!({"type": "voice_change", "voice": "matthew"})).await;

    assert!(wait_until(WAIT, || model.received_names(2).len() >= 6).await);
    let prompts = model.received_named("promptStart");
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0]["audioOutputConfiguration"]["voiceId"], "tiffany");
    assert_eq!(prompts[1]["audioOutputConfiguration"]["voiceId"], "matthew");
    assert!(model.received_names(1).contains(&"sessionEnd".to_string()));

    // The session keeps working on the new stream
    send_json(&mut client, json!({"type": "audio", "data": "AAECAw=="})).await;
    let text = next_frame_of(&mut client, "text").await.expect("text frame");
    assert_eq!(text["data"], "Hello from the model");

    let snapshot = state.session("dave").unwrap().snapshot();
    assert_eq!(snapshot.voice, "matthew");
}

#[tokio::test]
async fn test_unknown_voice_is_ignored() {
    let (addr, state, model) = setup(MockModelBehavior::default()).await;
    let mut client = connect(addr, "erin").await;
    assert!(wait_until(WAIT, || state.session_count() == 1).await);

    send_json(&mut client, json!({"type": "voice_change", "voice": "nobody"})).await;
    send_json(&mut client, json!({"type": "audio", "data": "AAECAw=="})).await;

    assert!(next_frame_of(&mut client, "text").await.is_some());
    assert_eq!(model.received_named("promptStart").len(), 1);
}

#[tokio::test]
async fn test_malformed_messages_are_skipped() {
    let (addr, _state, _model) = setup(MockModelBehavior::default()).await;
    let mut client = connect(addr, "frank").await;

    client
        .send(Message::Text("not json".to_string().into()))
        .await
        .unwrap();
    send_json(&mut client, json!({"type": "unknown_kind"})).await;
    client
        .send(Message::Binary(vec![1, 2, 3].into()))
        .await
        .unwrap();
    send_json(&mut client, json!({"type": "audio", "data": "AAECAw=="})).await;

    let text = next_frame_of(&mut client, "text").await;
    assert!(text.is_some(), "session should survive malformed input");
}

#[tokio::test]
async fn test_tool_call_reports_status_to_client() {
    let behavior = MockModelBehavior {
        call_tool: Some("getDateAndTimeTool".to_string()),
        ..Default::default()
    };
    let (addr, state, model) = setup(behavior).await;
    let mut client = connect(addr, "grace").await;

    send_json(&mut client, json!({"type": "audio", "data": "AAECAw=="})).await;

    let status = next_frame_of(&mut client, "tool_status")
        .await
        .expect("tool status frame");
    assert_eq!(status["tool_name"], "getDateAndTimeTool");
    assert_eq!(status["status"], "completed");
    assert_eq!(status["progress"], 100);

    assert!(wait_until(WAIT, || !model.received_named("toolResult").is_empty()).await);
    let tool_start = model
        .received_named("contentStart")
        .into_iter()
        .find(|s| s["type"] == "TOOL")
        .expect("tool content start");
    assert_eq!(
        tool_start["toolResultInputConfiguration"]["toolUseId"],
        "mock-tool-use-1"
    );

    let logs = state.tools.logs();
    assert_eq!(logs.last().map(|e| e.tool.as_str()), Some("getDateAndTimeTool"));
}

#[tokio::test]
async fn test_model_unreachable_closes_client() {
    // Nothing listens on port 9
    let (addr, state) = start_gateway(test_config("ws://127.0.0.1:9/model")).await;
    let mut client = connect(addr, "heidi").await;

    assert!(expect_closed(&mut client).await);
    assert!(wait_until(WAIT, || state.session_count() == 0).await);
    assert!(wait_until(WAIT, || state.ws_connection_count() == 0).await);
}

#[tokio::test]
async fn test_per_ip_connection_limit() {
    let (model_url, _model) = start_mock_model(MockModelBehavior::default()).await;
    let mut config = test_config(&model_url);
    config.max_connections_per_ip = 1;
    let (addr, state) = start_gateway(config).await;

    let _first = connect(addr, "ivan").await;
    assert!(wait_until(WAIT, || state.ws_connection_count() == 1).await);

    let second = connect_async(format!("ws://{addr}/ws/ivan-2")).await;
    match second {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 429);
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("second connection should be refused"),
    }
    assert_eq!(state.ws_connection_count(), 1);
}

#[tokio::test]
async fn test_rejected_upgrade_releases_connection_slot() {
    let (model_url, _model) = start_mock_model(MockModelBehavior::default()).await;
    let mut config = test_config(&model_url);
    config.max_connections_per_ip = 1;
    let (addr, state) = start_gateway(config).await;

    // Upgrade headers without Sec-WebSocket-Key: the upgrade extractor rejects it
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            format!(
                "GET /ws/broken HTTP/1.1\r\nHost: {addr}\r\nConnection: upgrade\r\nUpgrade: websocket\r\n\r\n"
            )
            .as_bytes(),
        )
        .await
        .unwrap();
    let mut buf = vec![0u8; 1024];
    let n = stream.read(&mut buf).await.unwrap();
    let response = String::from_utf8_lossy(&buf[..n]);
    assert!(response.starts_with("HTTP/1.1 4"), "unexpected response: {response}");
    assert!(!response.starts_with("HTTP/1.1 429"));
    drop(stream);

    assert!(wait_until(WAIT, || state.ws_connection_count() == 0).await);
    assert_eq!(state.ip_connection_count(&addr.ip()), 0);

    // The same IP can still open a session
    let _client = connect(addr, "after-bad-upgrade").await;
    assert!(wait_until(WAIT, || state.ws_connection_count() == 1).await);
}

#[tokio::test]
async fn test_duplicate_client_id_keeps_newest_entry() {
    let (addr, state, _model) = setup(MockModelBehavior::default()).await;

    let mut first = connect(addr, "judy").await;
    assert!(wait_until(WAIT, || state.session_count() == 1).await);
    let mut second = connect(addr, "judy").await;
    assert!(wait_until(WAIT, || state.ws_connection_count() == 2).await);

    send_json(&mut first, json!({"type": "end"})).await;
    assert!(expect_closed(&mut first).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The second connection still owns the registry entry
    assert_eq!(state.session_count(), 1);
    send_json(&mut second, json!({"type": "audio", "data": "AAECAw=="})).await;
    assert!(next_frame_of(&mut second, "text").await.is_some());
}

#[tokio::test]
async fn test_sessions_endpoint_lists_live_session() {
    let (addr, state, _model) = setup(MockModelBehavior::default()).await;
    let _client = connect(addr, "ken").await;
    assert!(wait_until(WAIT, || state.session_count() == 1).await);

    let body: Value = reqwest::get(format!("http://{addr}/sessions"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["sessions"][0]["client_id"], "ken");
    assert_eq!(body["sessions"][0]["voice"], "tiffany");
    assert_eq!(body["websocket_connections"], 1);
}
