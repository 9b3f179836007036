//! Processing of events received from the model stream.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::audio_output::AudioOutputHandle;
use super::dedup::TextDedupCache;
use super::shared::SessionShared;
use super::state::SessionState;
use crate::core::events::{
    AudioOutputEvent, ContentEndEvent, ContentStartEvent, InboundEvent, TextOutputEvent,
    ToolUseEvent,
};
use crate::core::tools::{ToolEngine, parse_tool_input};
use crate::core::transport::{OutgoingFrame, Transport};
use crate::errors::SessionResult;

/// Marker the model embeds in text output when the user barges in.
static BARGE_IN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{\s*"interrupted"\s*:\s*true\s*\}"#).expect("barge-in pattern must compile")
});

const SPECULATIVE_STAGE: &str = "SPECULATIVE";

pub struct ResponseProcessor {
    shared: Arc<SessionShared>,
    transport: Arc<dyn Transport>,
    audio: AudioOutputHandle,
    engine: Arc<ToolEngine>,
    dedup: TextDedupCache,
    role: String,
    display_assistant_text: bool,
    pending_tool_use: Option<ToolUseEvent>,
}

impl ResponseProcessor {
    pub fn new(
        shared: Arc<SessionShared>,
        transport: Arc<dyn Transport>,
        audio: AudioOutputHandle,
        engine: Arc<ToolEngine>,
        dedup: TextDedupCache,
    ) -> Self {
        Self {
            shared,
            transport,
            audio,
            engine,
            dedup,
            role: String::new(),
            display_assistant_text: false,
            pending_tool_use: None,
        }
    }

    /// Read the model stream until it ends, fails, or `cancel` fires.
    pub async fn run(
        mut self,
        mut receiver: mpsc::Receiver<SessionResult<String>>,
        cancel: CancellationToken,
    ) {
        let client_id = self.shared.client_id().to_string();

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = receiver.recv() => message,
            };

            let raw = match message {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => {
                    if self.shared.is_active() {
                        warn!(client_id = %client_id, "Model stream error: {}", e);
                    }
                    break;
                }
                None => {
                    debug!(client_id = %client_id, "Model stream ended");
                    break;
                }
            };

            let event = match InboundEvent::decode(&raw) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    warn!(client_id = %client_id, "Failed to decode model event: {}", e);
                    continue;
                }
            };

            if matches!(event, InboundEvent::CompletionEnd) && !self.shared.is_active() {
                break;
            }
            if self.shared.state() != SessionState::Active {
                continue;
            }
            self.handle(event).await;
        }

        info!(client_id = %client_id, "Response processing stopped");
    }

    async fn handle(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::ContentStart(start) => self.on_content_start(start),
            InboundEvent::TextOutput(text) => self.on_text_output(text).await,
            InboundEvent::AudioOutput(audio) => self.on_audio_output(audio).await,
            InboundEvent::ToolUse(tool_use) => {
                debug!(
                    client_id = %self.shared.client_id(),
                    tool_name = %tool_use.tool_name,
                    "Tool use requested"
                );
                self.pending_tool_use = Some(tool_use);
            }
            InboundEvent::ContentEnd(end) => self.on_content_end(end),
            InboundEvent::CompletionStart
            | InboundEvent::CompletionEnd
            | InboundEvent::UsageEvent
            | InboundEvent::Other(_) => {}
        }
    }

    fn on_content_start(&mut self, start: ContentStartEvent) {
        if let Some(role) = start.role.as_deref() {
            self.role = role.to_string();
        }
        if start.additional_model_fields.is_none() {
            return;
        }
        match start.generation_stage() {
            Ok(stage) => {
                let speculative = stage.as_deref() == Some(SPECULATIVE_STAGE);
                if speculative != self.display_assistant_text {
                    self.display_assistant_text = speculative;
                    self.dedup.clear();
                    debug!(
                        client_id = %self.shared.client_id(),
                        "Switching to {} generation",
                        if speculative { "speculative" } else { "final" }
                    );
                }
            }
            Err(e) => warn!(
                client_id = %self.shared.client_id(),
                "Error parsing additionalModelFields: {}", e
            ),
        }
    }

    async fn on_text_output(&mut self, text: TextOutputEvent) {
        if BARGE_IN_PATTERN.is_match(&text.content) {
            info!(client_id = %self.shared.client_id(), "Barge-in detected");
            self.audio.interrupt();
            return;
        }
        if text.content.trim().is_empty() {
            return;
        }
        if !self.dedup.should_emit(&self.role, &text.content) {
            debug!(client_id = %self.shared.client_id(), "Skipping duplicate message");
            return;
        }
        if !self.display_assistant_text && self.role == "ASSISTANT" {
            return;
        }

        let now = chrono::Local::now();
        let frame = OutgoingFrame::Text {
            data: text.content,
            role: self.role.clone(),
            timestamp: now.format("%H:%M:%S%.3f").to_string(),
            unix_timestamp: now.timestamp_millis() as f64 / 1000.0,
            is_speculative: self.display_assistant_text,
        };
        if let Err(e) = self.transport.send_frame(frame).await {
            warn!(client_id = %self.shared.client_id(), "Failed to send text to client: {}", e);
        }
    }

    async fn on_audio_output(&mut self, audio: AudioOutputEvent) {
        if !self.audio.enqueue(audio.content) {
            debug!(client_id = %self.shared.client_id(), "Audio output task stopped, dropping chunk");
        }

        let latency = self.shared.speech.lock().mark_first_response(Instant::now());
        if let Some(latency) = latency {
            let seconds = (latency.as_secs_f64() * 1000.0).round() / 1000.0;
            info!(
                client_id = %self.shared.client_id(),
                "Latency between user finish and assistant start: {:.3} seconds", seconds
            );
            if let Err(e) = self
                .transport
                .send_frame(OutgoingFrame::Latency { data: seconds })
                .await
            {
                warn!(client_id = %self.shared.client_id(), "Failed to send latency to client: {}", e);
            }
        }
    }

    fn on_content_end(&mut self, end: ContentEndEvent) {
        if !end.is_tool() {
            return;
        }
        let Some(tool_use) = self.pending_tool_use.take() else {
            warn!(client_id = %self.shared.client_id(), "Tool content ended without a pending tool use");
            return;
        };
        let input = parse_tool_input(&tool_use.content);
        let content_name = self
            .engine
            .submit(&tool_use.tool_name, input, &tool_use.tool_use_id);
        debug!(
            client_id = %self.shared.client_id(),
            tool_name = %tool_use.tool_name,
            content_name = %content_name,
            "Tool submitted"
        );
    }
}
