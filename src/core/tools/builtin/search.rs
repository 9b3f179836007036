use async_trait::async_trait;
use serde_json::{Value, json};

use crate::core::tools::base::{Tool, input_str};
use crate::core::tools::progress::ProgressReporter;
use crate::errors::{ToolError, ToolResult};

/// Internet search through the Exa answer API.
///
/// Failures are reported as structured results with `status: "failed"`, so
/// the model can tell the user the search did not work.
pub struct SearchTool {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SearchTool {
    pub fn new(http: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    async fn answer(&self, api_key: &str, query: &str) -> ToolResult<Value> {
        let url = format!("{}/answer", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .header("x-api-key", api_key)
            .json(&json!({ "query": query, "text": true }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Http(format!("Exa returned status {status}")));
        }
        let body: Value = response.json().await?;
        Ok(format_answer(&body))
    }
}

fn query_from(input: &Value) -> Option<String> {
    let query = match input {
        Value::String(raw) => raw.as_str(),
        other => input_str(other, "query").unwrap_or_default(),
    };
    let query = query.trim();
    (!query.is_empty()).then(|| query.to_string())
}

fn format_answer(body: &Value) -> Value {
    let citations: Vec<Value> = body
        .get("citations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|c| {
                    json!({
                        "title": c.get("title").and_then(Value::as_str).unwrap_or("Unknown Title"),
                        "url": c.get("url").and_then(Value::as_str).unwrap_or_default(),
                        "publishedDate": c.get("publishedDate").and_then(Value::as_str).unwrap_or_default(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    json!({
        "answer": body.get("answer").and_then(Value::as_str).unwrap_or("No answer found"),
        "citations": citations,
        "costInfo": body.get("costDollars").cloned().unwrap_or_else(|| json!({})),
        "status": "success",
    })
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "searchTool"
    }

    fn description(&self) -> &str {
        "Search the internet for real-time information and answers to questions"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to find information on the internet"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value, progress: ProgressReporter) -> ToolResult<Value> {
        let Some(query) = query_from(&input) else {
            return Ok(json!({ "error": "No search query provided", "status": "failed" }));
        };
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(json!({ "error": "Search is not configured", "status": "failed" }));
        };

        progress
            .report("searching", &format!("Searching for \"{query}\""), 10)
            .await;
        match self.answer(api_key, &query).await {
            Ok(result) => Ok(result),
            Err(e) => Ok(json!({ "error": e.to_string(), "status": "failed" })),
        }
    }
}
