use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST router for tool and session observability
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tools", get(api::list_tools))
        .route("/tools/logs", get(api::tool_logs))
        .route("/sessions", get(api::list_sessions))
        .layer(TraceLayer::new_for_http())
}

/// Create the public router (health check)
pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(api::health_check))
}
