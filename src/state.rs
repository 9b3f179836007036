//! Application state shared by every route.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::core::remote::{ModelStreamConnector, create_connector};
use crate::core::session::{SessionHandle, SessionSnapshot};
use crate::core::tools::ToolRegistry;
use crate::errors::SessionResult;

/// Reason a WebSocket connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
    PerIpLimitReached,
}

pub struct AppState {
    pub config: ServerConfig,
    /// Opens one model stream per session
    pub connector: Arc<dyn ModelStreamConnector>,
    pub tools: Arc<ToolRegistry>,
    /// Live sessions keyed by client id
    sessions: DashMap<String, SessionHandle>,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, u32>,
}

impl AppState {
    /// Build the state with the connector selected by `config` and the built-in tools.
    pub async fn new(config: ServerConfig) -> SessionResult<Arc<Self>> {
        let connector = create_connector(&config)?;
        info!(backend = connector.name(), model_id = %config.model_id, "Model connector ready");
        Ok(Self::with_connector(config, connector))
    }

    /// Build the state around an existing connector, with the built-in tools.
    pub fn with_connector(
        config: ServerConfig,
        connector: Arc<dyn ModelStreamConnector>,
    ) -> Arc<Self> {
        let tools = Arc::new(ToolRegistry::with_builtin_tools(
            config.builtin_tool_settings(),
        ));
        Self::with_components(config, connector, tools)
    }

    pub fn with_components(
        config: ServerConfig,
        connector: Arc<dyn ModelStreamConnector>,
        tools: Arc<ToolRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            connector,
            tools,
            sessions: DashMap::new(),
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    // =========================================================================
    // Session registry
    // =========================================================================

    /// Register a live session, replacing any entry with the same client id.
    pub fn register_session(&self, handle: SessionHandle) -> Option<SessionHandle> {
        let client_id = handle.client_id().to_string();
        let previous = self.sessions.insert(client_id.clone(), handle);
        if previous.is_some() {
            info!(client_id = %client_id, "Replacing existing session for client id");
        }
        previous
    }

    /// Remove `handle` from the registry if it is still the registered entry.
    pub fn unregister_session(&self, handle: &SessionHandle) -> bool {
        let removed = self
            .sessions
            .remove_if(handle.client_id(), |_, current| current.same_session(handle))
            .is_some();
        if removed {
            debug!(client_id = %handle.client_id(), "Session unregistered");
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session(&self, client_id: &str) -> Option<SessionHandle> {
        self.sessions.get(client_id).map(|entry| entry.value().clone())
    }

    /// Snapshots of every live session, ordered by client id
    pub fn session_snapshots(&self) -> Vec<SessionSnapshot> {
        let mut snapshots: Vec<SessionSnapshot> = self
            .sessions
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        snapshots
    }

    // =========================================================================
    // Connection accounting
    // =========================================================================

    /// Reserve a WebSocket slot for `ip`, respecting the global and per-IP limits.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        if let Some(max) = self.config.max_websocket_connections {
            let reserved = self
                .ws_connections
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                    (current < max).then_some(current + 1)
                });
            if reserved.is_err() {
                return Err(ConnectionLimitError::GlobalLimitReached);
            }
        } else {
            self.ws_connections.fetch_add(1, Ordering::SeqCst);
        }

        let per_ip_limit = self.config.max_connections_per_ip;
        let mut entry = self.ip_connections.entry(ip).or_insert(0);
        if *entry >= per_ip_limit {
            drop(entry);
            self.ws_connections.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *entry += 1;
        Ok(())
    }

    /// Release a slot reserved by [`try_acquire_connection`](Self::try_acquire_connection).
    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(1)
            });
        self.ip_connections.remove_if_mut(&ip, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::SeqCst)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.get(ip).map(|count| *count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_new_uses_configured_backend() {
        let state = AppState::new(ServerConfig::default()).await.unwrap();
        assert_eq!(state.connector.name(), "bedrock");
        assert!(state.tools.contains("getDateAndTimeTool"));
        assert_eq!(state.session_count(), 0);
    }

    #[tokio::test]
    async fn test_release_removes_idle_ip_entry() {
        let state = AppState::new(ServerConfig::default()).await.unwrap();
        let ip: IpAddr = Ipv4Addr::new(10, 0, 0, 1).into();

        state.try_acquire_connection(ip).unwrap();
        assert_eq!(state.ip_connection_count(&ip), 1);
        state.release_connection(ip);
        assert_eq!(state.ip_connection_count(&ip), 0);
        assert_eq!(state.ws_connection_count(), 0);

        // Releasing again never underflows
        state.release_connection(ip);
        assert_eq!(state.ws_connection_count(), 0);
    }
}
