//! Duplex session WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::session::session_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the session WebSocket router
///
/// # Endpoint
///
/// `GET /ws/{client_id}` - WebSocket upgrade for one duplex voice session
///
/// # Example
///
/// ```json
/// // Client streams microphone audio
/// {"type": "audio", "data": "<base64 PCM16>"}
///
/// // Server streams transcripts and assistant audio
/// {"type": "text", "data": "Hello!", "role": "ASSISTANT", "is_speculative": true, ...}
/// {"type": "audio", "data": "<base64 PCM16>"}
/// ```
///
/// The connection limit middleware is applied in `main.rs` once state is available.
pub fn create_session_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/{client_id}", get(session_handler))
        .layer(TraceLayer::new_for_http())
}
