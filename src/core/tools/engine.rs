//! Background tool execution.
//!
//! [`ToolEngine::submit`] returns as soon as the task is registered. Each task
//! runs the tool under a deadline, then pushes exactly one result sequence
//! through the [`ToolResultSink`] and exactly one terminal `tool_status` frame
//! through the [`Transport`]. A supervisor task receives a completion message
//! per task and removes it from the active set.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::progress::{ProgressChannel, ProgressReporter};
use super::registry::ToolRegistry;
use crate::core::transport::{OutgoingFrame, Transport};
use crate::errors::SessionResult;

/// Grace period for tasks to observe cancellation during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ToolEngineConfig {
    /// Deadline for one tool execution
    pub timeout: Duration,
    /// Minimum spacing between non-terminal progress updates per tool name
    pub progress_interval: Duration,
    /// Deadline for each sub-lookup of a fan-out tool
    pub fan_out_timeout: Duration,
}

impl Default for ToolEngineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            progress_interval: Duration::from_millis(200),
            fan_out_timeout: Duration::from_secs(15),
        }
    }
}

// =============================================================================
// Result Sink
// =============================================================================

/// Destination of tool result sequences (the owning duplex session).
#[async_trait]
pub trait ToolResultSink: Send + Sync {
    /// Send `contentStart` (TOOL) / `toolResult` / `contentEnd` for `content_name`.
    async fn send_tool_result(
        &self,
        content_name: &str,
        tool_use_id: &str,
        result: &Value,
    ) -> SessionResult<()>;

    /// Whether the owning session still accepts events.
    fn is_active(&self) -> bool;
}

// =============================================================================
// Task Bookkeeping
// =============================================================================

/// Terminal state of a tool task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed,
    TimedOut,
    Failed(String),
    Cancelled,
}

impl TaskOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Completed => "completed",
            TaskOutcome::TimedOut => "timeout",
            TaskOutcome::Failed(_) => "failed",
            TaskOutcome::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug)]
struct TaskCompletion {
    content_name: String,
    tool_name: String,
    outcome: TaskOutcome,
    elapsed: Duration,
}

struct ActiveTask {
    tool_name: String,
    tool_use_id: String,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    started_at: Instant,
}

/// Snapshot of one in-flight task.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveToolInfo {
    pub content_name: String,
    pub tool_name: String,
    pub tool_use_id: String,
    pub running_ms: u64,
}

#[derive(Debug, Default)]
struct EngineStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    timed_out: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

impl EngineStats {
    fn record(&self, outcome: &TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Completed => &self.completed,
            TaskOutcome::TimedOut => &self.timed_out,
            TaskOutcome::Failed(_) => &self.failed,
            TaskOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct EngineStatsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub timed_out: u64,
    pub failed: u64,
    pub cancelled: u64,
}

// =============================================================================
// Engine
// =============================================================================

/// Runs model-requested tools without blocking the session's event loop.
pub struct ToolEngine {
    registry: Arc<ToolRegistry>,
    sink: Arc<dyn ToolResultSink>,
    transport: Arc<dyn Transport>,
    progress: Arc<ProgressChannel>,
    active: Arc<DashMap<String, ActiveTask>>,
    completion_tx: mpsc::UnboundedSender<TaskCompletion>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<EngineStats>,
    config: ToolEngineConfig,
}

impl ToolEngine {
    pub fn new(
        registry: Arc<ToolRegistry>,
        sink: Arc<dyn ToolResultSink>,
        transport: Arc<dyn Transport>,
        config: ToolEngineConfig,
    ) -> Arc<Self> {
        let progress = Arc::new(ProgressChannel::new(
            transport.clone(),
            sink.clone(),
            config.progress_interval,
        ));
        let active: Arc<DashMap<String, ActiveTask>> = Arc::new(DashMap::new());
        let stats = Arc::new(EngineStats::default());
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let supervisor = tokio::spawn(Self::supervise(
            completion_rx,
            active.clone(),
            stats.clone(),
        ));

        Arc::new(Self {
            registry,
            sink,
            transport,
            progress,
            active,
            completion_tx,
            supervisor: Mutex::new(Some(supervisor)),
            stats,
            config,
        })
    }

    /// Receives one completion per task and retires it from the active set.
    async fn supervise(
        mut completion_rx: mpsc::UnboundedReceiver<TaskCompletion>,
        active: Arc<DashMap<String, ActiveTask>>,
        stats: Arc<EngineStats>,
    ) {
        while let Some(done) = completion_rx.recv().await {
            active.remove(&done.content_name);
            stats.record(&done.outcome);
            match &done.outcome {
                TaskOutcome::Failed(reason) => error!(
                    tool_name = %done.tool_name,
                    content_name = %done.content_name,
                    "Tool task failed after {:?}: {}",
                    done.elapsed,
                    reason
                ),
                outcome => debug!(
                    tool_name = %done.tool_name,
                    content_name = %done.content_name,
                    "Tool task {} after {:?}",
                    outcome.label(),
                    done.elapsed
                ),
            }
        }
    }

    /// Launch `tool_name` in the background and return its content identifier.
    pub fn submit(&self, tool_name: &str, input: Value, tool_use_id: &str) -> String {
        let content_name = uuid::Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();

        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        // Registered before spawning so the completion always finds its entry
        self.active.insert(
            content_name.clone(),
            ActiveTask {
                tool_name: tool_name.to_string(),
                tool_use_id: tool_use_id.to_string(),
                cancel: cancel.clone(),
                handle: None,
                started_at: Instant::now(),
            },
        );

        let task = ToolTask {
            registry: self.registry.clone(),
            sink: self.sink.clone(),
            transport: self.transport.clone(),
            reporter: ProgressReporter::new(tool_name, self.progress.clone()),
            completion_tx: self.completion_tx.clone(),
            tool_name: tool_name.to_string(),
            tool_use_id: tool_use_id.to_string(),
            content_name: content_name.clone(),
            timeout: self.config.timeout,
        };
        let handle = tokio::spawn(task.run(input, cancel));

        if let Some(mut entry) = self.active.get_mut(&content_name) {
            entry.handle = Some(handle);
        }

        info!(tool_name = %tool_name, content_name = %content_name, "Tool task created");
        content_name
    }

    pub fn active_task_count(&self) -> usize {
        self.active.len()
    }

    /// Content identifiers of in-flight tasks.
    pub fn active_task_names(&self) -> Vec<String> {
        self.active.iter().map(|e| e.key().clone()).collect()
    }

    pub fn active_tools(&self) -> Vec<ActiveToolInfo> {
        self.active
            .iter()
            .map(|e| ActiveToolInfo {
                content_name: e.key().clone(),
                tool_name: e.tool_name.clone(),
                tool_use_id: e.tool_use_id.clone(),
                running_ms: e.started_at.elapsed().as_millis() as u64,
            })
            .collect()
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            submitted: self.stats.submitted.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            timed_out: self.stats.timed_out.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            cancelled: self.stats.cancelled.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &ToolEngineConfig {
        &self.config
    }

    /// Cancel every in-flight task and wait for them to unwind.
    pub async fn shutdown(&self) {
        let handles: Vec<(String, JoinHandle<()>)> = self
            .active
            .iter_mut()
            .filter_map(|mut entry| {
                entry.cancel.cancel();
                let key = entry.key().clone();
                entry.handle.take().map(|h| (key, h))
            })
            .collect();

        if !handles.is_empty() {
            info!("Cancelling {} in-flight tool task(s)", handles.len());
        }

        for (content_name, mut handle) in handles {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                warn!(content_name = %content_name, "Tool task ignored cancellation, aborting");
                handle.abort();
                self.active.remove(&content_name);
            }
        }
    }
}

impl Drop for ToolEngine {
    fn drop(&mut self) {
        for entry in self.active.iter() {
            entry.cancel.cancel();
        }
        if let Some(handle) = self.supervisor.lock().take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Task Execution
// =============================================================================

struct ToolTask {
    registry: Arc<ToolRegistry>,
    sink: Arc<dyn ToolResultSink>,
    transport: Arc<dyn Transport>,
    reporter: ProgressReporter,
    completion_tx: mpsc::UnboundedSender<TaskCompletion>,
    tool_name: String,
    tool_use_id: String,
    content_name: String,
    timeout: Duration,
}

/// What the tool produced before any result is sent.
enum Execution {
    Returned(Value),
    TimedOut,
    Failed(String),
    Cancelled,
}

impl ToolTask {
    async fn run(self, input: Value, cancel: CancellationToken) {
        let started = Instant::now();
        debug!(tool_name = %self.tool_name, "Starting tool execution");

        let execution = tokio::select! {
            _ = cancel.cancelled() => Execution::Cancelled,
            execution = self.execute(input.clone()) => execution,
        };

        let outcome = match execution {
            Execution::Returned(result) => match self.send_result(&result).await {
                Ok(()) => {
                    let status = match result.get("status").and_then(Value::as_str) {
                        Some("success") | None => "completed",
                        Some(other) => other,
                    };
                    self.notify(status, "Tool execution completed").await;
                    TaskOutcome::Completed
                }
                Err(e) => {
                    // Result never reached the model
                    self.notify("error", "Tool result could not be delivered")
                        .await;
                    TaskOutcome::Failed(format!("result not delivered: {e}"))
                }
            },
            Execution::TimedOut => {
                warn!(tool_name = %self.tool_name, "Tool execution timed out after {:?}", self.timeout);
                let result = json!({
                    "error": "Tool execution timed out",
                    "status": "timeout",
                    "tool_name": self.tool_name,
                });
                self.registry
                    .record(&self.tool_name, input, result.clone(), "timeout");
                let _ = self.send_result(&result).await;
                self.notify("timeout", "Tool execution timed out").await;
                TaskOutcome::TimedOut
            }
            Execution::Failed(reason) => {
                let result = json!({
                    "error": reason,
                    "status": "failed",
                    "tool_name": self.tool_name,
                });
                let _ = self.send_result(&result).await;
                self.notify("error", &format!("Tool execution failed: {reason}"))
                    .await;
                TaskOutcome::Failed(reason)
            }
            Execution::Cancelled => TaskOutcome::Cancelled,
        };

        let _ = self.completion_tx.send(TaskCompletion {
            content_name: self.content_name.clone(),
            tool_name: self.tool_name.clone(),
            outcome,
            elapsed: started.elapsed(),
        });
    }

    async fn execute(&self, input: Value) -> Execution {
        let call = AssertUnwindSafe(self.registry.execute(
            &self.tool_name,
            input.clone(),
            self.reporter.clone(),
        ))
        .catch_unwind();

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(Ok(result))) => Execution::Returned(result),
            // Already logged by the registry
            Ok(Ok(Err(e))) => Execution::Failed(e.to_string()),
            Ok(Err(panic)) => {
                let reason = panic_message(panic.as_ref());
                self.registry.record(
                    &self.tool_name,
                    input,
                    json!({ "error": reason }),
                    "error",
                );
                Execution::Failed(reason)
            }
            Err(_) => Execution::TimedOut,
        }
    }

    async fn send_result(&self, result: &Value) -> SessionResult<()> {
        let sent = self
            .sink
            .send_tool_result(&self.content_name, &self.tool_use_id, result)
            .await;
        if let Err(e) = &sent {
            error!(
                tool_name = %self.tool_name,
                content_name = %self.content_name,
                "Failed to send tool result sequence: {}",
                e
            );
        }
        sent
    }

    async fn notify(&self, status: &str, message: &str) {
        let frame = OutgoingFrame::tool_status(&self.tool_name, status, message, 100);
        if let Err(e) = self.transport.send_frame(frame).await {
            debug!(tool_name = %self.tool_name, "Completion notification dropped: {}", e);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("tool panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("tool panicked: {s}")
    } else {
        "tool panicked".to_string()
    }
}
