//! One conversation bridged between a client transport and a model stream.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::audio_output::spawn_audio_output;
use super::config::SessionConfig;
use super::dedup::TextDedupCache;
use super::response::ResponseProcessor;
use super::shared::SessionShared;
use super::speech::is_silent_chunk;
use super::state::SessionState;
use crate::core::events::{OutboundEvent, Role};
use crate::core::remote::{ModelStreamConnector, StreamDriver};
use crate::core::tools::{
    ActiveToolInfo, EngineStatsSnapshot, ToolEngine, ToolEngineConfig, ToolRegistry,
};
use crate::core::transport::Transport;
use crate::errors::{SessionError, SessionResult};

type EngineSlot = Arc<RwLock<Option<Arc<ToolEngine>>>>;

/// Tasks and handles that live exactly as long as one model stream.
struct StreamRuntime {
    driver: StreamDriver,
    engine: Arc<ToolEngine>,
    audio_task: JoinHandle<()>,
    audio_cancel: CancellationToken,
    response_task: JoinHandle<()>,
    response_cancel: CancellationToken,
}

/// Duplex session between one client and the model service.
///
/// Lifecycle: [`start`](Self::start) opens the model stream and sends the
/// bootstrap sequence, [`open_audio_input`](Self::open_audio_input) opens the
/// user audio content, [`submit_user_audio`](Self::submit_user_audio) forwards
/// audio, and [`close`](Self::close) tears everything down in order.
/// [`change_voice`](Self::change_voice) restarts the stream with a new voice.
pub struct DuplexSession {
    shared: Arc<SessionShared>,
    config: SessionConfig,
    connector: Arc<dyn ModelStreamConnector>,
    transport: Arc<dyn Transport>,
    registry: Arc<ToolRegistry>,
    engine_config: ToolEngineConfig,
    engine: EngineSlot,
    stream_ended: CancellationToken,
    runtime: Option<StreamRuntime>,
}

impl DuplexSession {
    pub fn new(
        client_id: impl Into<String>,
        config: SessionConfig,
        connector: Arc<dyn ModelStreamConnector>,
        transport: Arc<dyn Transport>,
        registry: Arc<ToolRegistry>,
        engine_config: ToolEngineConfig,
    ) -> Self {
        let shared = Arc::new(SessionShared::new(client_id, config.voice.clone()));
        Self {
            shared,
            config,
            connector,
            transport,
            registry,
            engine_config,
            engine: Arc::new(RwLock::new(None)),
            stream_ended: CancellationToken::new(),
            runtime: None,
        }
    }

    pub fn client_id(&self) -> &str {
        self.shared.client_id()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    pub fn voice(&self) -> String {
        self.shared.voice()
    }

    /// Read-only view for the session registry.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: self.shared.clone(),
            engine: self.engine.clone(),
        }
    }

    /// Fires when the current model stream stops delivering events.
    ///
    /// A new token is issued on every start, so fetch it again after a voice change.
    pub fn stream_ended(&self) -> CancellationToken {
        self.stream_ended.clone()
    }

    /// Open the model stream, send the bootstrap sequence, and launch the
    /// response and audio output tasks.
    pub async fn start(&mut self) -> SessionResult<()> {
        match self.shared.state() {
            SessionState::Closed => {
                return Err(SessionError::InvalidState("session is closed".to_string()));
            }
            SessionState::Active | SessionState::Closing => {
                return Err(SessionError::InvalidState("session already started".to_string()));
            }
            SessionState::Uninitialized => {}
        }

        let client_id = self.shared.client_id().to_string();
        let stream = self.connector.connect().await.map_err(|e| match e {
            SessionError::Initialization(_) => e,
            other => SessionError::Initialization(other.to_string()),
        })?;
        debug!(client_id = %client_id, backend = self.connector.name(), "Model stream opened");

        self.shared.install_sender(stream.sender).await;
        self.shared.set_state(SessionState::Active);

        if let Err(e) = self.send_bootstrap().await {
            warn!(client_id = %client_id, "Session bootstrap failed: {}", e);
            self.shared.set_state(SessionState::Uninitialized);
            self.shared.take_sender().await;
            stream.driver.shutdown(self.config.teardown_pacing).await;
            return Err(match e {
                SessionError::Initialization(_) => e,
                other => SessionError::Initialization(other.to_string()),
            });
        }

        let audio_cancel = CancellationToken::new();
        let (audio, audio_task) = spawn_audio_output(
            self.transport.clone(),
            self.config.audio_flush_threshold,
            self.config.audio_flush_timeout,
            audio_cancel.clone(),
        );

        let engine = ToolEngine::new(
            self.registry.clone(),
            self.shared.clone(),
            self.transport.clone(),
            self.engine_config.clone(),
        );
        *self.engine.write() = Some(engine.clone());

        let processor = ResponseProcessor::new(
            self.shared.clone(),
            self.transport.clone(),
            audio,
            engine.clone(),
            TextDedupCache::new(self.config.dedup_cooldown),
        );
        let response_cancel = CancellationToken::new();
        let stream_ended = CancellationToken::new();
        self.stream_ended = stream_ended.clone();
        let receiver = stream.receiver;
        let cancel = response_cancel.clone();
        let response_task = tokio::spawn(async move {
            processor.run(receiver, cancel).await;
            stream_ended.cancel();
        });

        self.runtime = Some(StreamRuntime {
            driver: stream.driver,
            engine,
            audio_task,
            audio_cancel,
            response_task,
            response_cancel,
        });

        info!(client_id = %client_id, voice = %self.shared.voice(), "Session started");
        Ok(())
    }

    async fn send_bootstrap(&self) -> SessionResult<()> {
        let ids = self.shared.ids();
        let voice = self.shared.voice();
        let pacing = self.config.bootstrap_pacing;

        let sequence = [
            OutboundEvent::session_start(self.config.inference.clone()),
            OutboundEvent::prompt_start(&ids.prompt_name, &voice, self.registry.tool_specs()),
            OutboundEvent::text_content_start(&ids.prompt_name, &ids.text_content_name, Role::System),
            OutboundEvent::text_input(
                &ids.prompt_name,
                &ids.text_content_name,
                &self.config.system_prompt,
            ),
            OutboundEvent::content_end(&ids.prompt_name, &ids.text_content_name),
        ];
        for event in sequence {
            self.shared.send_event(event).await?;
            tokio::time::sleep(pacing).await;
        }
        Ok(())
    }

    /// Open the user audio content stream.
    pub async fn open_audio_input(&self) -> SessionResult<()> {
        if !self.shared.is_active() {
            return Err(SessionError::NotActive);
        }
        let ids = self.shared.ids();
        self.shared
            .send_event(OutboundEvent::audio_content_start(
                &ids.prompt_name,
                &ids.audio_content_name,
            ))
            .await
    }

    /// Run silence detection on a user chunk and forward it to the model.
    ///
    /// A `Forwarding` error means the model stream is gone and the session
    /// must be closed.
    pub async fn submit_user_audio(&self, audio_base64: &str) -> SessionResult<()> {
        if !self.shared.is_active() {
            return Err(SessionError::NotActive);
        }

        let silent = is_silent_chunk(audio_base64, self.config.silence_rms_threshold);
        self.shared
            .speech
            .lock()
            .observe(silent, self.config.silence_threshold, Instant::now());

        let ids = self.shared.ids();
        self.shared
            .send_event(OutboundEvent::audio_input(
                &ids.prompt_name,
                &ids.audio_content_name,
                audio_base64,
            ))
            .await
    }

    /// Restart the model stream with another voice.
    ///
    /// Returns `Ok(false)` without touching the stream when the voice is not
    /// available or already selected.
    pub async fn change_voice(&mut self, voice: &str) -> SessionResult<bool> {
        if !self.config.is_available_voice(voice) {
            warn!(client_id = %self.shared.client_id(), voice = %voice, "Ignoring unknown voice");
            return Ok(false);
        }
        if self.shared.voice() == voice {
            return Ok(false);
        }
        if self.shared.state() != SessionState::Active {
            return Err(SessionError::NotActive);
        }

        info!(client_id = %self.shared.client_id(), voice = %voice, "Changing voice");
        self.teardown(false).await;
        self.shared.set_voice(voice);
        self.shared.renew_content_ids();
        self.start().await?;
        self.open_audio_input().await?;
        Ok(true)
    }

    /// Tear the session down. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.shared.state() == SessionState::Closed {
            return;
        }
        self.teardown(true).await;
        info!(client_id = %self.shared.client_id(), "Session closed");
    }

    async fn teardown(&mut self, terminal: bool) {
        let client_id = self.shared.client_id().to_string();
        let final_state = if terminal {
            SessionState::Closed
        } else {
            SessionState::Uninitialized
        };

        let Some(runtime) = self.runtime.take() else {
            self.shared.take_sender().await;
            self.shared.set_state(final_state);
            return;
        };

        let was_active = self.shared.state() == SessionState::Active;
        self.shared.set_state(SessionState::Closing);

        runtime.audio_cancel.cancel();
        if let Err(e) = runtime.audio_task.await {
            debug!(client_id = %client_id, "Audio output task ended abnormally: {}", e);
        }

        runtime.engine.shutdown().await;
        *self.engine.write() = None;

        if was_active {
            self.send_teardown_events().await;
        }

        self.shared.set_state(final_state);
        self.shared.take_sender().await;
        runtime.driver.shutdown(self.config.teardown_pacing * 2).await;

        runtime.response_cancel.cancel();
        if let Err(e) = runtime.response_task.await {
            debug!(client_id = %client_id, "Response task ended abnormally: {}", e);
        }

        self.shared.speech.lock().reset();
    }

    async fn send_teardown_events(&self) {
        let ids = self.shared.ids();
        let pacing = self.config.teardown_pacing;
        let sequence = [
            (
                OutboundEvent::content_end(&ids.prompt_name, &ids.audio_content_name),
                pacing,
            ),
            (OutboundEvent::prompt_end(&ids.prompt_name), pacing),
            (OutboundEvent::session_end(), pacing * 2),
        ];
        for (event, pause) in sequence {
            let name = event.name();
            if let Err(e) = self.shared.send_event(event).await {
                warn!(client_id = %self.shared.client_id(), "Failed to send {}: {}", name, e);
                return;
            }
            tokio::time::sleep(pause).await;
        }
    }
}

impl Drop for DuplexSession {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.audio_cancel.cancel();
            runtime.response_cancel.cancel();
            runtime.audio_task.abort();
            runtime.response_task.abort();
        }
    }
}

// =============================================================================
// Observability
// =============================================================================

/// Shared, read-only view of a live session.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
    engine: EngineSlot,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub client_id: String,
    pub state: SessionState,
    pub voice: String,
    pub active_tool_count: usize,
    pub active_tools: Vec<ActiveToolInfo>,
    pub stats: Option<EngineStatsSnapshot>,
}

impl SessionHandle {
    pub fn client_id(&self) -> &str {
        self.shared.client_id()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let engine = self.engine.read().clone();
        let (active_tools, stats) = match engine {
            Some(engine) => (engine.active_tools(), Some(engine.stats())),
            None => (Vec::new(), None),
        };
        SessionSnapshot {
            client_id: self.shared.client_id().to_string(),
            state: self.shared.state(),
            voice: self.shared.voice(),
            active_tool_count: active_tools.len(),
            active_tools,
            stats,
        }
    }

    /// Whether both handles refer to the same session.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}
