//! State shared between a duplex session, its background tasks, and its tool engine.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::debug;
use uuid::Uuid;

use super::speech::SpeechTimer;
use super::state::SessionState;
use crate::core::events::OutboundEvent;
use crate::core::tools::ToolResultSink;
use crate::errors::{SessionError, SessionResult};

/// Correlation identifiers for the current model stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentIds {
    pub prompt_name: String,
    pub text_content_name: String,
    pub audio_content_name: String,
}

impl ContentIds {
    pub fn generate() -> Self {
        Self {
            prompt_name: Uuid::new_v4().to_string(),
            text_content_name: Uuid::new_v4().to_string(),
            audio_content_name: Uuid::new_v4().to_string(),
        }
    }
}

pub struct SessionShared {
    client_id: String,
    state: RwLock<SessionState>,
    ids: RwLock<ContentIds>,
    voice: RwLock<String>,
    /// Held for the duration of a send so multi-event sequences are not interleaved
    outbound: AsyncMutex<Option<mpsc::Sender<String>>>,
    pub(crate) speech: Mutex<SpeechTimer>,
}

impl SessionShared {
    pub fn new(client_id: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            state: RwLock::new(SessionState::Uninitialized),
            ids: RwLock::new(ContentIds::generate()),
            voice: RwLock::new(voice.into()),
            outbound: AsyncMutex::new(None),
            speech: Mutex::new(SpeechTimer::new()),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn set_state(&self, state: SessionState) {
        let mut current = self.state.write();
        if *current != state {
            debug!(client_id = %self.client_id, from = %*current, to = %state, "Session state change");
            *current = state;
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn ids(&self) -> ContentIds {
        self.ids.read().clone()
    }

    pub fn renew_content_ids(&self) -> ContentIds {
        let ids = ContentIds::generate();
        *self.ids.write() = ids.clone();
        ids
    }

    pub fn voice(&self) -> String {
        self.voice.read().clone()
    }

    pub fn set_voice(&self, voice: impl Into<String>) {
        *self.voice.write() = voice.into();
    }

    pub async fn install_sender(&self, sender: mpsc::Sender<String>) {
        *self.outbound.lock().await = Some(sender);
    }

    /// Dropping the returned sender ends the model input stream.
    pub async fn take_sender(&self) -> Option<mpsc::Sender<String>> {
        self.outbound.lock().await.take()
    }

    pub async fn send_event(&self, event: OutboundEvent) -> SessionResult<()> {
        self.send_events(std::slice::from_ref(&event)).await
    }

    /// Send events back to back with no other event in between.
    pub async fn send_events(&self, events: &[OutboundEvent]) -> SessionResult<()> {
        if !self.state().accepts_events() {
            return Err(SessionError::NotActive);
        }
        let guard = self.outbound.lock().await;
        let sender = guard.as_ref().ok_or(SessionError::NotActive)?;
        for event in events {
            let payload = event.to_json()?;
            sender
                .send(payload)
                .await
                .map_err(|_| SessionError::Forwarding(format!("{} rejected: stream closed", event.name())))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ToolResultSink for SessionShared {
    async fn send_tool_result(
        &self,
        content_name: &str,
        tool_use_id: &str,
        result: &Value,
    ) -> SessionResult<()> {
        if !self.is_active() {
            return Err(SessionError::NotActive);
        }
        let prompt_name = self.ids.read().prompt_name.clone();
        self.send_events(&[
            OutboundEvent::tool_content_start(&prompt_name, content_name, tool_use_id),
            OutboundEvent::tool_result(&prompt_name, content_name, result),
            OutboundEvent::content_end(&prompt_name, content_name),
        ])
        .await
    }

    fn is_active(&self) -> bool {
        SessionShared::is_active(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_send_requires_accepting_state() {
        let shared = SessionShared::new("c1", "tiffany");
        let (tx, mut rx) = mpsc::channel(8);
        shared.install_sender(tx).await;

        let err = shared.send_event(OutboundEvent::session_end()).await.unwrap_err();
        assert_eq!(err, SessionError::NotActive);

        shared.set_state(SessionState::Closing);
        shared.send_event(OutboundEvent::session_end()).await.unwrap();
        assert!(rx.recv().await.unwrap().contains("sessionEnd"));
    }

    #[tokio::test]
    async fn test_closed_stream_is_forwarding_error() {
        let shared = SessionShared::new("c1", "tiffany");
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        shared.install_sender(tx).await;
        shared.set_state(SessionState::Active);

        let err = shared.send_event(OutboundEvent::session_end()).await.unwrap_err();
        assert!(matches!(err, SessionError::Forwarding(_)));
    }

    #[tokio::test]
    async fn test_tool_result_sequence() {
        let shared = SessionShared::new("c1", "tiffany");
        let (tx, mut rx) = mpsc::channel(8);
        shared.install_sender(tx).await;
        shared.set_state(SessionState::Active);

        shared
            .send_tool_result("tool-content", "use-1", &json!({"ok": true}))
            .await
            .unwrap();

        let names: Vec<String> = (0..3)
            .map(|_| {
                let raw = rx.try_recv().unwrap();
                let value: Value = serde_json::from_str(&raw).unwrap();
                assert_eq!(value["event"].as_object().unwrap().values().next().unwrap()["contentName"], "tool-content");
                value["event"].as_object().unwrap().keys().next().unwrap().clone()
            })
            .collect();
        assert_eq!(names, vec!["contentStart", "toolResult", "contentEnd"]);
    }

    #[tokio::test]
    async fn test_tool_result_rejected_while_closing() {
        let shared = SessionShared::new("c1", "tiffany");
        let (tx, _rx) = mpsc::channel(8);
        shared.install_sender(tx).await;
        shared.set_state(SessionState::Closing);

        let err = shared
            .send_tool_result("c", "u", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::NotActive);
    }
}
