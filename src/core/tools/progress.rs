//! Progress reporting from running tools to the client.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::debug;

use super::engine::ToolResultSink;
use crate::core::transport::{OutgoingFrame, Transport};

/// Shared, per-engine progress path with a per-tool-name debounce.
pub struct ProgressChannel {
    transport: Arc<dyn Transport>,
    sink: Arc<dyn ToolResultSink>,
    last_progress: DashMap<String, Instant>,
    min_interval: Duration,
}

impl ProgressChannel {
    pub fn new(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ToolResultSink>,
        min_interval: Duration,
    ) -> Self {
        Self {
            transport,
            sink,
            last_progress: DashMap::new(),
            min_interval,
        }
    }

    /// Whether an update for `tool_name` at `progress` passes the debounce.
    ///
    /// Updates below 100 are dropped when the last forwarded update for the
    /// same tool name is younger than the minimum interval. A 100 update
    /// always passes.
    fn admit(&self, tool_name: &str, progress: u8) -> bool {
        let now = Instant::now();
        match self.last_progress.entry(tool_name.to_string()) {
            Entry::Occupied(mut last) => {
                if progress < 100 && now.duration_since(*last.get()) < self.min_interval {
                    return false;
                }
                last.insert(now);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    async fn forward(&self, tool_name: &str, stage: &str, message: &str, progress: u8) {
        if !self.admit(tool_name, progress) {
            return;
        }
        if !self.sink.is_active() {
            return;
        }
        let frame = OutgoingFrame::tool_status(tool_name, stage, message, progress);
        if let Err(e) = self.transport.send_frame(frame).await {
            debug!(tool_name = %tool_name, "Progress update dropped: {}", e);
        }
    }
}

/// Progress callback handed to a single tool execution.
#[derive(Clone)]
pub struct ProgressReporter {
    tool_name: String,
    channel: Option<Arc<ProgressChannel>>,
}

impl ProgressReporter {
    pub fn new(tool_name: impl Into<String>, channel: Arc<ProgressChannel>) -> Self {
        Self {
            tool_name: tool_name.into(),
            channel: Some(channel),
        }
    }

    /// Reporter that discards every update.
    pub fn detached(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            channel: None,
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn is_detached(&self) -> bool {
        self.channel.is_none()
    }

    /// Report `progress` percent at `stage`. Never fails.
    pub async fn report(&self, stage: &str, message: &str, progress: u8) {
        if let Some(channel) = &self.channel {
            channel
                .forward(&self.tool_name, stage, message, progress.min(100))
                .await;
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("tool_name", &self.tool_name)
            .field("detached", &self.is_detached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tools::testing::{RecordingSink, RecordingTransport};

    fn channel(transport: Arc<RecordingTransport>, sink: Arc<RecordingSink>) -> Arc<ProgressChannel> {
        Arc::new(ProgressChannel::new(
            transport,
            sink,
            Duration::from_millis(200),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_drops_fast_updates() {
        let transport = Arc::new(RecordingTransport::default());
        let sink = Arc::new(RecordingSink::default());
        let reporter = ProgressReporter::new("travelPlanningTool", channel(transport.clone(), sink));

        reporter.report("weather_start", "Checking weather", 10).await;
        reporter.report("weather_done", "Weather ready", 30).await;
        tokio::time::advance(Duration::from_millis(250)).await;
        reporter.report("attractions_start", "Finding attractions", 50).await;

        let statuses = transport.tool_statuses();
        assert_eq!(statuses, vec![
            ("weather_start".to_string(), 10),
            ("attractions_start".to_string(), 50),
        ]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_update_always_passes() {
        let transport = Arc::new(RecordingTransport::default());
        let sink = Arc::new(RecordingSink::default());
        let reporter = ProgressReporter::new("searchTool", channel(transport.clone(), sink));

        reporter.report("start", "Searching", 10).await;
        reporter.report("done", "Done", 100).await;

        assert_eq!(transport.tool_statuses().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_is_per_tool_name() {
        let transport = Arc::new(RecordingTransport::default());
        let sink = Arc::new(RecordingSink::default());
        let shared = channel(transport.clone(), sink);
        let a = ProgressReporter::new("a", shared.clone());
        let b = ProgressReporter::new("b", shared);

        a.report("s", "m", 10).await;
        b.report("s", "m", 10).await;

        assert_eq!(transport.tool_statuses().len(), 2);
    }

    #[tokio::test]
    async fn test_inactive_session_suppresses_updates() {
        let transport = Arc::new(RecordingTransport::default());
        let sink = Arc::new(RecordingSink::default());
        sink.set_active(false);
        let reporter = ProgressReporter::new("t", channel(transport.clone(), sink));

        reporter.report("s", "m", 100).await;
        assert!(transport.tool_statuses().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_swallowed() {
        let transport = Arc::new(RecordingTransport::default());
        transport.set_failing(true);
        let sink = Arc::new(RecordingSink::default());
        let reporter = ProgressReporter::new("t", channel(transport.clone(), sink));

        reporter.report("s", "m", 50).await;
    }

    #[tokio::test]
    async fn test_detached_reporter() {
        let reporter = ProgressReporter::detached("getDateAndTimeTool");
        assert!(reporter.is_detached());
        reporter.report("s", "m", 50).await;
    }
}
