use serde::Deserialize;
use serde_json::Value;

use crate::errors::{SessionError, SessionResult};

// =============================================================================
// Event Bodies
// =============================================================================

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentStartEvent {
    pub role: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub content_id: Option<String>,
    /// JSON-in-a-string carrying `generationStage` and similar hints
    pub additional_model_fields: Option<String>,
}

impl ContentStartEvent {
    /// Generation stage hint (`SPECULATIVE` or `FINAL`).
    ///
    /// Returns `Ok(None)` when no hints are attached and an error when the
    /// hints are present but malformed.
    pub fn generation_stage(&self) -> Result<Option<String>, serde_json::Error> {
        let Some(raw) = self.additional_model_fields.as_deref() else {
            return Ok(None);
        };
        let fields: Value = serde_json::from_str(raw)?;
        Ok(fields
            .get("generationStage")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TextOutputEvent {
    pub content: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioOutputEvent {
    /// Base64 encoded PCM16 mono at 24 kHz
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolUseEvent {
    pub tool_name: String,
    pub tool_use_id: String,
    /// Tool input as a JSON string
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentEndEvent {
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub stop_reason: Option<String>,
}

impl ContentEndEvent {
    pub fn is_tool(&self) -> bool {
        self.content_type.as_deref() == Some("TOOL")
    }
}

// =============================================================================
// Inbound Events
// =============================================================================

/// Events received from the model stream.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    ContentStart(ContentStartEvent),
    TextOutput(TextOutputEvent),
    AudioOutput(AudioOutputEvent),
    ToolUse(ToolUseEvent),
    ContentEnd(ContentEndEvent),
    CompletionStart,
    CompletionEnd,
    UsageEvent,
    /// Event name the gateway does not act on
    Other(String),
}

impl InboundEvent {
    /// Decode one raw message from the model stream.
    ///
    /// Returns `Ok(None)` for well-formed JSON without an `event` object.
    /// Only the first key under `event` is considered.
    pub fn decode(raw: &str) -> SessionResult<Option<Self>> {
        let value: Value = serde_json::from_str(raw)?;
        let Some(event) = value.get("event").and_then(Value::as_object) else {
            return Ok(None);
        };
        let Some((name, body)) = event.iter().next() else {
            return Ok(None);
        };

        let decoded = match name.as_str() {
            "contentStart" => InboundEvent::ContentStart(parse_body(name, body)?),
            "textOutput" => InboundEvent::TextOutput(parse_body(name, body)?),
            "audioOutput" => InboundEvent::AudioOutput(parse_body(name, body)?),
            "toolUse" => InboundEvent::ToolUse(parse_body(name, body)?),
            "contentEnd" => InboundEvent::ContentEnd(parse_body(name, body)?),
            "completionStart" => InboundEvent::CompletionStart,
            "completionEnd" => InboundEvent::CompletionEnd,
            "usageEvent" => InboundEvent::UsageEvent,
            other => InboundEvent::Other(other.to_string()),
        };
        Ok(Some(decoded))
    }

    pub fn name(&self) -> &str {
        match self {
            InboundEvent::ContentStart(_) => "contentStart",
            InboundEvent::TextOutput(_) => "textOutput",
            InboundEvent::AudioOutput(_) => "audioOutput",
            InboundEvent::ToolUse(_) => "toolUse",
            InboundEvent::ContentEnd(_) => "contentEnd",
            InboundEvent::CompletionStart => "completionStart",
            InboundEvent::CompletionEnd => "completionEnd",
            InboundEvent::UsageEvent => "usageEvent",
            InboundEvent::Other(name) => name,
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(name: &str, body: &Value) -> SessionResult<T> {
    T::deserialize(body)
        .map_err(|e| SessionError::Protocol(format!("Malformed {name} event: {e}")))
}
