use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::progress::ProgressReporter;
use crate::errors::ToolResult;

/// How a tool participates in progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Returns almost immediately; receives a detached progress reporter
    Fast,
    /// Long running; may report progress while it works
    Slow,
}

/// A capability the model can invoke mid-conversation.
///
/// Implementations return a structured result or an error. A result whose
/// payload encodes a logical failure is still a successful invocation; set a
/// `status` field to have it passed through to the client notification.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name advertised to the model (e.g. `getWeatherTool`)
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the input object
    fn input_schema(&self) -> Value;

    fn kind(&self) -> ToolKind {
        ToolKind::Slow
    }

    async fn execute(&self, input: Value, progress: ProgressReporter) -> ToolResult<Value>;
}

/// Parse the `content` string of a tool use into a JSON value.
///
/// Content that is not valid JSON is passed through as a JSON string.
pub fn parse_tool_input(content: &str) -> Value {
    if content.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(content).unwrap_or_else(|_| Value::String(content.to_string()))
}

/// Read a string field from a tool input object.
pub fn input_str<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input.get(key).and_then(Value::as_str)
}

/// Empty-object schema for tools that take no input.
pub fn empty_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}
