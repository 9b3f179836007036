//! Connection limits for session WebSockets.
//!
//! Upgrade requests reserve a slot (global and per-IP) before reaching the
//! handler. The slot lives in a [`ConnectionSlot`] guard: the session handler
//! takes it over through the [`ConnectionLease`] extension and holds it for the
//! lifetime of the socket. When no handler takes it (the upgrade extractor
//! rejected the request, or the route failed), the guard is dropped with the
//! request and the slot is freed.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use sonic_gateway::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/ws/{client_id}", get(session_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::state::{AppState, ConnectionLimitError};

/// A reserved connection slot, released on drop.
pub struct ConnectionSlot {
    state: Arc<AppState>,
    ip: IpAddr,
}

impl ConnectionSlot {
    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.state.release_connection(self.ip);
    }
}

/// Request extension carrying the slot reserved for an upgrade request.
#[derive(Clone)]
pub struct ConnectionLease(Arc<Mutex<Option<ConnectionSlot>>>);

impl ConnectionLease {
    fn new(slot: ConnectionSlot) -> Self {
        Self(Arc::new(Mutex::new(Some(slot))))
    }

    /// Take ownership of the slot. Returns `None` if it was already taken.
    pub fn take(&self) -> Option<ConnectionSlot> {
        self.0.lock().take()
    }
}

/// Enforces the global and per-IP WebSocket limits.
///
/// Returns 503 when the global limit is reached and 429 when the per-IP limit
/// is reached. Requests without `Upgrade: websocket` pass through unchecked.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    let client_ip = addr.ip();

    match state.try_acquire_connection(client_ip) {
        Ok(()) => {
            let lease = ConnectionLease::new(ConnectionSlot {
                state: state.clone(),
                ip: client_ip,
            });
            request.extensions_mut().insert(lease.clone());
            let response = next.run(request).await;
            if lease.take().is_some() {
                tracing::debug!(
                    ip = %client_ip,
                    status = %response.status(),
                    "Upgrade not taken by a session, released connection slot"
                );
            }
            response
        }
        Err(ConnectionLimitError::GlobalLimitReached) => {
            tracing::warn!(
                ip = %client_ip,
                "Rejecting connection: global limit reached"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
        Err(ConnectionLimitError::PerIpLimitReached) => {
            tracing::warn!(
                ip = %client_ip,
                "Rejecting connection: per-IP limit reached"
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many connections from your IP address.",
            )
                .into_response()
        }
    }
}
