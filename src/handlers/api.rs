//! REST handlers: health check and observability endpoints.

use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde::Serialize;
use serde_json::{Value, json};

use crate::core::events::ToolSpecification;
use crate::core::session::SessionSnapshot;
use crate::core::tools::ToolLogEntry;
use crate::state::AppState;

/// Health check handler
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub count: usize,
    pub tools: Vec<ToolSpecification>,
}

/// `GET /tools`: specifications sent with every prompt start.
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<ToolsResponse> {
    let tools = state.tools.tool_specs();
    Json(ToolsResponse {
        count: tools.len(),
        tools,
    })
}

/// `GET /tools/logs`: recent invocations, oldest first.
pub async fn tool_logs(State(state): State<Arc<AppState>>) -> Json<Vec<ToolLogEntry>> {
    Json(state.tools.logs())
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub count: usize,
    pub websocket_connections: usize,
    pub sessions: Vec<SessionSnapshot>,
}

/// `GET /sessions`: live sessions with their tool activity.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionsResponse> {
    let sessions = state.session_snapshots();
    Json(SessionsResponse {
        count: sessions.len(),
        websocket_connections: state.ws_connection_count(),
        sessions,
    })
}
