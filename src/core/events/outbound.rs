use serde::Serialize;

use super::{CHANNEL_COUNT, INPUT_SAMPLE_RATE_HZ, OUTPUT_SAMPLE_RATE_HZ, SAMPLE_SIZE_BITS};

// =============================================================================
// Shared Configuration Blocks
// =============================================================================

/// Inference parameters sent with `sessionStart`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfiguration {
    pub max_tokens: u32,
    pub top_p: f32,
    pub temperature: f32,
}

impl Default for InferenceConfiguration {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            top_p: 0.9,
            temperature: 0.7,
        }
    }
}

/// Media type wrapper used by text and tool configurations.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaConfiguration {
    pub media_type: String,
}

impl MediaConfiguration {
    pub fn text_plain() -> Self {
        Self {
            media_type: "text/plain".to_string(),
        }
    }

    pub fn json() -> Self {
        Self {
            media_type: "application/json".to_string(),
        }
    }
}

/// LPCM audio configuration, used for both input and output audio.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfiguration {
    pub media_type: String,
    pub sample_rate_hertz: u32,
    pub sample_size_bits: u32,
    pub channel_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    pub encoding: String,
    pub audio_type: String,
}

impl AudioConfiguration {
    /// Configuration for user speech sent to the model.
    pub fn input() -> Self {
        Self::lpcm(INPUT_SAMPLE_RATE_HZ, None)
    }

    /// Configuration for assistant speech produced with `voice`.
    pub fn output(voice: &str) -> Self {
        Self::lpcm(OUTPUT_SAMPLE_RATE_HZ, Some(voice.to_string()))
    }

    fn lpcm(sample_rate_hertz: u32, voice_id: Option<String>) -> Self {
        Self {
            media_type: "audio/lpcm".to_string(),
            sample_rate_hertz,
            sample_size_bits: SAMPLE_SIZE_BITS,
            channel_count: CHANNEL_COUNT,
            voice_id,
            encoding: "base64".to_string(),
            audio_type: "SPEECH".to_string(),
        }
    }
}

// =============================================================================
// Tool Specifications
// =============================================================================

/// Input schema of a tool; the schema itself travels as a JSON string.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolInputSchema {
    pub json: String,
}

/// Tool description advertised at prompt start.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// `{ "toolSpec": { ... } }` entry of the tool configuration.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpecification {
    pub tool_spec: ToolSpec,
}

impl ToolSpecification {
    pub fn new(name: &str, description: &str, schema: &serde_json::Value) -> Self {
        Self {
            tool_spec: ToolSpec {
                name: name.to_string(),
                description: description.to_string(),
                input_schema: ToolInputSchema {
                    json: schema.to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct ToolConfiguration {
    pub tools: Vec<ToolSpecification>,
}

// =============================================================================
// Event Bodies
// =============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub inference_configuration: InferenceConfiguration,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptStart {
    pub prompt_name: String,
    pub text_output_configuration: MediaConfiguration,
    pub audio_output_configuration: AudioConfiguration,
    pub tool_use_output_configuration: MediaConfiguration,
    pub tool_configuration: ToolConfiguration,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
    Text,
    Audio,
    Tool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Tool result binding for a `contentStart` of type `TOOL`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultInputConfiguration {
    pub tool_use_id: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub text_input_configuration: MediaConfiguration,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentStart {
    pub prompt_name: String,
    pub content_name: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub interactive: bool,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_input_configuration: Option<MediaConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_input_configuration: Option<AudioConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result_input_configuration: Option<ToolResultInputConfiguration>,
}

/// Payload event bound to a content stream (`textInput`, `audioInput`, `toolResult`).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentInput {
    pub prompt_name: String,
    pub content_name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    pub prompt_name: String,
    pub content_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptRef {
    pub prompt_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct SessionEnd {}

// =============================================================================
// Outbound Events
// =============================================================================

/// Events sent from the gateway to the model stream.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum OutboundEvent {
    SessionStart(SessionStart),
    PromptStart(PromptStart),
    ContentStart(ContentStart),
    TextInput(ContentInput),
    AudioInput(ContentInput),
    ToolResult(ContentInput),
    ContentEnd(ContentRef),
    PromptEnd(PromptRef),
    SessionEnd(SessionEnd),
}

#[derive(Serialize)]
struct Envelope<'a> {
    event: &'a OutboundEvent,
}

impl OutboundEvent {
    pub fn session_start(inference: InferenceConfiguration) -> Self {
        OutboundEvent::SessionStart(SessionStart {
            inference_configuration: inference,
        })
    }

    pub fn prompt_start(prompt_name: &str, voice: &str, tools: Vec<ToolSpecification>) -> Self {
        OutboundEvent::PromptStart(PromptStart {
            prompt_name: prompt_name.to_string(),
            text_output_configuration: MediaConfiguration::text_plain(),
            audio_output_configuration: AudioConfiguration::output(voice),
            tool_use_output_configuration: MediaConfiguration::json(),
            tool_configuration: ToolConfiguration { tools },
        })
    }

    /// Opens an interactive text content stream spoken by `role`.
    pub fn text_content_start(prompt_name: &str, content_name: &str, role: Role) -> Self {
        OutboundEvent::ContentStart(ContentStart {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
            content_type: ContentType::Text,
            interactive: true,
            role,
            text_input_configuration: Some(MediaConfiguration::text_plain()),
            audio_input_configuration: None,
            tool_result_input_configuration: None,
        })
    }

    pub fn text_input(prompt_name: &str, content_name: &str, text: &str) -> Self {
        OutboundEvent::TextInput(ContentInput {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
            content: text.to_string(),
        })
    }

    /// Opens the user's audio content stream.
    pub fn audio_content_start(prompt_name: &str, content_name: &str) -> Self {
        OutboundEvent::ContentStart(ContentStart {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
            content_type: ContentType::Audio,
            interactive: true,
            role: Role::User,
            text_input_configuration: None,
            audio_input_configuration: Some(AudioConfiguration::input()),
            tool_result_input_configuration: None,
        })
    }

    pub fn audio_input(prompt_name: &str, content_name: &str, audio_base64: &str) -> Self {
        OutboundEvent::AudioInput(ContentInput {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
            content: audio_base64.to_string(),
        })
    }

    /// Opens a non-interactive tool result content stream for `tool_use_id`.
    pub fn tool_content_start(prompt_name: &str, content_name: &str, tool_use_id: &str) -> Self {
        OutboundEvent::ContentStart(ContentStart {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
            content_type: ContentType::Tool,
            interactive: false,
            role: Role::Tool,
            text_input_configuration: None,
            audio_input_configuration: None,
            tool_result_input_configuration: Some(ToolResultInputConfiguration {
                tool_use_id: tool_use_id.to_string(),
                content_type: ContentType::Text,
                text_input_configuration: MediaConfiguration::text_plain(),
            }),
        })
    }

    /// Tool result; `result` is embedded as a JSON string.
    pub fn tool_result(prompt_name: &str, content_name: &str, result: &serde_json::Value) -> Self {
        OutboundEvent::ToolResult(ContentInput {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
            content: result.to_string(),
        })
    }

    pub fn content_end(prompt_name: &str, content_name: &str) -> Self {
        OutboundEvent::ContentEnd(ContentRef {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
        })
    }

    pub fn prompt_end(prompt_name: &str) -> Self {
        OutboundEvent::PromptEnd(PromptRef {
            prompt_name: prompt_name.to_string(),
        })
    }

    pub fn session_end() -> Self {
        OutboundEvent::SessionEnd(SessionEnd {})
    }

    /// Wire name of the event, as it appears under `event`.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::SessionStart(_) => "sessionStart",
            OutboundEvent::PromptStart(_) => "promptStart",
            OutboundEvent::ContentStart(_) => "contentStart",
            OutboundEvent::TextInput(_) => "textInput",
            OutboundEvent::AudioInput(_) => "audioInput",
            OutboundEvent::ToolResult(_) => "toolResult",
            OutboundEvent::ContentEnd(_) => "contentEnd",
            OutboundEvent::PromptEnd(_) => "promptEnd",
            OutboundEvent::SessionEnd(_) => "sessionEnd",
        }
    }

    /// Content identifier this event is bound to, if any.
    pub fn content_name(&self) -> Option<&str> {
        match self {
            OutboundEvent::ContentStart(c) => Some(&c.content_name),
            OutboundEvent::TextInput(c)
            | OutboundEvent::AudioInput(c)
            | OutboundEvent::ToolResult(c) => Some(&c.content_name),
            OutboundEvent::ContentEnd(c) => Some(&c.content_name),
            _ => None,
        }
    }

    /// Serialize into the `{ "event": { ... } }` envelope.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Envelope { event: self })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn encode(event: &OutboundEvent) -> Value {
        serde_json::from_str(&event.to_json().unwrap()).unwrap()
    }

    #[test]
    fn test_session_start_envelope() {
        let value = encode(&OutboundEvent::session_start(InferenceConfiguration::default()));
        assert_eq!(value["event"]["sessionStart"]["inferenceConfiguration"]["maxTokens"], 1024);
        let top_p = value["event"]["sessionStart"]["inferenceConfiguration"]["topP"]
            .as_f64()
            .unwrap();
        assert!((top_p - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_prompt_start_carries_voice_and_tools() {
        let schema = json!({"type": "object", "properties": {}, "required": []});
        let tools = vec![ToolSpecification::new("getDateAndTimeTool", "Date", &schema)];
        let value = encode(&OutboundEvent::prompt_start("p-1", "matthew", tools));
        let prompt = &value["event"]["promptStart"];

        assert_eq!(prompt["promptName"], "p-1");
        assert_eq!(prompt["audioOutputConfiguration"]["voiceId"], "matthew");
        assert_eq!(prompt["audioOutputConfiguration"]["sampleRateHertz"], 24000);
        assert_eq!(prompt["toolUseOutputConfiguration"]["mediaType"], "application/json");

        let spec = &prompt["toolConfiguration"]["tools"][0]["toolSpec"];
        assert_eq!(spec["name"], "getDateAndTimeTool");
        // The schema travels as a string, not as nested JSON
        assert!(spec["inputSchema"]["json"].is_string());
    }

    #[test]
    fn test_audio_content_start() {
        let value = encode(&OutboundEvent::audio_content_start("p", "a"));
        let start = &value["event"]["contentStart"];
        assert_eq!(start["type"], "AUDIO");
        assert_eq!(start["role"], "USER");
        assert_eq!(start["interactive"], true);
        assert_eq!(start["audioInputConfiguration"]["sampleRateHertz"], 16000);
        assert!(start["audioInputConfiguration"].get("voiceId").is_none());
        assert!(start.get("textInputConfiguration").is_none());
    }

    #[test]
    fn test_tool_content_start() {
        let value = encode(&OutboundEvent::tool_content_start("p", "c", "tool-use-1"));
        let start = &value["event"]["contentStart"];
        assert_eq!(start["type"], "TOOL");
        assert_eq!(start["role"], "TOOL");
        assert_eq!(start["interactive"], false);
        assert_eq!(start["toolResultInputConfiguration"]["toolUseId"], "tool-use-1");
        assert_eq!(start["toolResultInputConfiguration"]["type"], "TEXT");
        assert_eq!(
            start["toolResultInputConfiguration"]["textInputConfiguration"]["mediaType"],
            "text/plain"
        );
    }

    #[test]
    fn test_tool_result_content_is_json_string() {
        let result = json!({"status": "success", "temperature": 21});
        let value = encode(&OutboundEvent::tool_result("p", "c", &result));
        let content = value["event"]["toolResult"]["content"].as_str().unwrap();
        let decoded: Value = serde_json::from_str(content).unwrap();
        assert_eq!(decoded, result);
    }

    #[test]
    fn test_text_input_escapes_quotes() {
        // Typed events cannot produce malformed JSON from user text
        let event = OutboundEvent::text_input("p", "t", r#"say "hi" \ bye"#);
        let value = encode(&event);
        assert_eq!(value["event"]["textInput"]["content"], r#"say "hi" \ bye"#);
    }

    #[test]
    fn test_session_end_is_empty_object() {
        assert_eq!(
            OutboundEvent::session_end().to_json().unwrap(),
            r#"{"event":{"sessionEnd":{}}}"#
        );
    }

    #[test]
    fn test_event_names_and_content_names() {
        assert_eq!(OutboundEvent::prompt_end("p").name(), "promptEnd");
        assert_eq!(OutboundEvent::content_end("p", "c").content_name(), Some("c"));
        assert_eq!(OutboundEvent::session_end().content_name(), None);
    }
}
