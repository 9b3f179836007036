use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, TimeZone};
use serde_json::{Value, json};

use crate::core::tools::base::{Tool, ToolKind, empty_schema};
use crate::core::tools::progress::ProgressReporter;
use crate::errors::ToolResult;

/// Current local date and time.
pub struct DateTimeTool;

fn describe<Tz: TimeZone>(now: &DateTime<Tz>) -> Value
where
    Tz::Offset: std::fmt::Display,
{
    json!({
        "formattedTime": now.format("%I:%M %p").to_string(),
        "date": now.format("%Y-%m-%d").to_string(),
        "year": now.year(),
        "month": now.month(),
        "day": now.day(),
        "dayOfWeek": now.format("%A").to_string().to_uppercase(),
        "timezone": now.offset().to_string(),
    })
}

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "getDateAndTimeTool"
    }

    fn description(&self) -> &str {
        "Get information about the current date and time"
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Fast
    }

    async fn execute(&self, _input: Value, _progress: ProgressReporter) -> ToolResult<Value> {
        Ok(describe(&Local::now()))
    }
}
