//! Tool Engine Tests
//!
//! Background tool execution through the public engine API: concurrency,
//! failure containment, cancellation, and the built-in tools.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use sonic_gateway::core::tools::{
    BuiltinToolSettings, FanOut, ProgressReporter, ToolResultSink,
};
use sonic_gateway::errors::{SessionResult, ToolError, ToolResult};
use sonic_gateway::{
    OutgoingFrame, Tool, ToolEngine, ToolEngineConfig, ToolKind, ToolRegistry, Transport,
};

// =============================================================================
// Collaborators
// =============================================================================

#[derive(Default)]
struct Sink {
    results: Mutex<Vec<(String, String, Value)>>,
    inactive: AtomicBool,
}

impl Sink {
    fn results(&self) -> Vec<(String, String, Value)> {
        self.results.lock().clone()
    }
}

#[async_trait]
impl ToolResultSink for Sink {
    async fn send_tool_result(
        &self,
        content_name: &str,
        tool_use_id: &str,
        result: &Value,
    ) -> SessionResult<()> {
        self.results
            .lock()
            .push((content_name.to_string(), tool_use_id.to_string(), result.clone()));
        Ok(())
    }

    fn is_active(&self) -> bool {
        !self.inactive.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Frames(Mutex<Vec<OutgoingFrame>>);

impl Frames {
    fn statuses(&self, tool: &str) -> Vec<(String, u8)> {
        self.0
            .lock()
            .iter()
            .filter_map(|f| match f {
                OutgoingFrame::ToolStatus {
                    tool_name,
                    status,
                    progress,
                    ..
                } if tool_name == tool => Some((status.clone(), *progress)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for Frames {
    async fn send_frame(&self, frame: OutgoingFrame) -> SessionResult<()> {
        self.0.lock().push(frame);
        Ok(())
    }

    fn is_open(&self) -> bool {
        true
    }
}

struct Sleeper {
    name: &'static str,
    delay: Duration,
}

#[async_trait]
impl Tool for Sleeper {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Sleeps, then echoes its input"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, input: Value, progress: ProgressReporter) -> ToolResult<Value> {
        progress.report("sleeping", "Sleeping", 20).await;
        tokio::time::sleep(self.delay).await;
        Ok(json!({ "echo": input, "status": "success" }))
    }
}

struct Panicker;

#[async_trait]
impl Tool for Panicker {
    fn name(&self) -> &str {
        "panicTool"
    }

    fn description(&self) -> &str {
        "Always panics"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Fast
    }

    async fn execute(&self, _input: Value, _progress: ProgressReporter) -> ToolResult<Value> {
        panic!("handler exploded");
    }
}

fn engine(
    registry: ToolRegistry,
    config: ToolEngineConfig,
) -> (Arc<ToolEngine>, Arc<Sink>, Arc<Frames>, Arc<ToolRegistry>) {
    let registry = Arc::new(registry);
    let sink = Arc::new(Sink::default());
    let frames = Arc::new(Frames::default());
    let engine = ToolEngine::new(registry.clone(), sink.clone(), frames.clone(), config);
    (engine, sink, frames, registry)
}

async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

// =============================================================================
// Engine
// =============================================================================

#[tokio::test]
async fn test_submit_returns_immediately_and_tasks_run_concurrently() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(Sleeper {
        name: "slowA",
        delay: Duration::from_millis(200),
    }));
    registry.register(Arc::new(Sleeper {
        name: "slowB",
        delay: Duration::from_millis(200),
    }));
    let (engine, sink, _frames, _registry) = engine(registry, ToolEngineConfig::default());

    let started = std::time::Instant::now();
    let a = engine.submit("slowA", json!({"n": 1}), "use-a");
    let b = engine.submit("slowB", json!({"n": 2}), "use-b");
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_ne!(a, b);
    assert_eq!(engine.active_task_count(), 2);

    assert!(wait_until(Duration::from_secs(2), || sink.results().len() == 2).await);
    // Sequential execution would need at least 400 ms
    assert!(started.elapsed() < Duration::from_millis(390));

    let results = sink.results();
    let by_use: Vec<&str> = results.iter().map(|(_, id, _)| id.as_str()).collect();
    assert!(by_use.contains(&"use-a") && by_use.contains(&"use-b"));
    for (content_name, tool_use_id, value) in &results {
        let expected = if tool_use_id == "use-a" { &a } else { &b };
        assert_eq!(content_name, expected);
        assert_eq!(value["status"], "success");
    }

    assert!(wait_until(Duration::from_secs(1), || engine.active_task_count() == 0).await);
    assert_eq!(engine.stats().completed, 2);
}

#[tokio::test]
async fn test_panicking_tool_yields_failed_result() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(Panicker));
    let (engine, sink, frames, _registry) = engine(registry, ToolEngineConfig::default());

    engine.submit("panicTool", json!({}), "use-p");

    assert!(wait_until(Duration::from_secs(2), || sink.results().len() == 1).await);
    let (_, _, result) = &sink.results()[0];
    assert_eq!(result["status"], "failed");
    assert!(result["error"].as_str().unwrap().contains("handler exploded"));

    assert!(wait_until(Duration::from_secs(1), || engine.stats().failed == 1).await);
    assert_eq!(frames.statuses("panicTool").last().map(|s| s.1), Some(100));
}

#[tokio::test]
async fn test_timeout_result() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(Sleeper {
        name: "stuckTool",
        delay: Duration::from_secs(60),
    }));
    let config = ToolEngineConfig {
        timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let (engine, sink, frames, registry) = engine(registry, config);

    engine.submit("stuckTool", json!({}), "use-t");

    assert!(wait_until(Duration::from_secs(2), || sink.results().len() == 1).await);
    assert_eq!(sink.results()[0].2["status"], "timeout");
    assert!(wait_until(Duration::from_secs(1), || {
        frames.statuses("stuckTool").last().map(|s| s.0.clone()) == Some("timeout".to_string())
    })
    .await);
    assert_eq!(registry.logs().last().map(|e| e.status.clone()), Some("timeout".to_string()));
}

#[tokio::test]
async fn test_shutdown_cancels_without_result() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(Sleeper {
        name: "longTool",
        delay: Duration::from_secs(60),
    }));
    let (engine, sink, frames, _registry) = engine(registry, ToolEngineConfig::default());

    engine.submit("longTool", json!({}), "use-l");
    tokio::time::sleep(Duration::from_millis(20)).await;
    engine.shutdown().await;

    assert!(wait_until(Duration::from_secs(1), || engine.active_task_count() == 0).await);
    assert!(sink.results().is_empty());
    assert!(frames.statuses("longTool").iter().all(|(_, p)| *p < 100));
    assert_eq!(engine.stats().cancelled, 1);
}

#[tokio::test]
async fn test_active_tools_snapshot() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(Sleeper {
        name: "slowTool",
        delay: Duration::from_millis(300),
    }));
    let (engine, _sink, _frames, _registry) = engine(registry, ToolEngineConfig::default());

    let content_name = engine.submit("slowTool", json!({}), "use-s");
    let active = engine.active_tools();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].tool_name, "slowTool");
    assert_eq!(active[0].tool_use_id, "use-s");
    assert_eq!(engine.active_task_names(), vec![content_name]);
}

// =============================================================================
// Built-in Tools
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_travel_planning_through_engine() {
    let registry = ToolRegistry::with_builtin_tools(BuiltinToolSettings::default());
    let config = ToolEngineConfig {
        progress_interval: Duration::from_millis(0),
        ..Default::default()
    };
    let (engine, sink, frames, registry) = engine(registry, config);

    engine.submit(
        "travelPlanningTool",
        json!({"destination": "Lisbon", "days": 2, "interests": ["food"]}),
        "use-travel",
    );

    assert!(wait_until(Duration::from_secs(5), || sink.results().len() == 1).await);
    let (_, tool_use_id, result) = &sink.results()[0];
    assert_eq!(tool_use_id, "use-travel");
    assert_eq!(result["status"], "success");
    assert_eq!(result["destination"], "Lisbon");
    assert_eq!(result["itinerary"].as_array().map(Vec::len), Some(2));

    assert!(wait_until(Duration::from_secs(1), || {
        frames.statuses("travelPlanningTool").last().map(|s| s.1) == Some(100)
    })
    .await);
    let stages: Vec<String> = frames
        .statuses("travelPlanningTool")
        .into_iter()
        .map(|(stage, _)| stage)
        .collect();
    assert_eq!(stages.first().map(String::as_str), Some("planning_start"));
    for stage in ["weather_complete", "attractions_complete", "recommendations_complete"] {
        assert!(stages.iter().any(|s| s == stage), "{stage} missing from {stages:?}");
    }

    let log = registry.logs();
    assert_eq!(log.last().map(|e| e.tool.as_str()), Some("travelPlanningTool"));
}

#[tokio::test]
async fn test_fast_tools_report_no_progress() {
    let registry = ToolRegistry::with_builtin_tools(BuiltinToolSettings::default());
    let (engine, sink, frames, _registry) = engine(registry, ToolEngineConfig::default());

    engine.submit("getDateAndTimeTool", json!({}), "use-dt");

    assert!(wait_until(Duration::from_secs(2), || sink.results().len() == 1).await);
    assert!(sink.results()[0].2.get("formattedTime").is_some());
    assert!(wait_until(Duration::from_secs(1), || !frames.statuses("getDateAndTimeTool").is_empty()).await);
    // Only the completion notification
    assert_eq!(
        frames.statuses("getDateAndTimeTool"),
        vec![("completed".to_string(), 100)]
    );
}

#[tokio::test]
async fn test_search_without_key_is_structured_failure() {
    let registry = ToolRegistry::with_builtin_tools(BuiltinToolSettings::default());
    let (engine, sink, frames, _registry) = engine(registry, ToolEngineConfig::default());

    engine.submit("searchTool", json!({"query": "rust async"}), "use-search");

    assert!(wait_until(Duration::from_secs(2), || sink.results().len() == 1).await);
    assert_eq!(sink.results()[0].2["status"], "failed");
    assert!(wait_until(Duration::from_secs(1), || {
        frames.statuses("searchTool").last().map(|s| s.0.clone()) == Some("failed".to_string())
    })
    .await);
}

// =============================================================================
// Fan-out
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_fan_out_tolerates_slow_and_failing_lookups() {
    let mut results = FanOut::new(Duration::from_secs(15))
        .lookup("fast", async { Ok(1) })
        .lookup("broken", async {
            Err(ToolError::Failed("upstream down".to_string()))
        })
        .lookup("slow", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(3)
        })
        .join()
        .await;

    assert_eq!(results.succeeded(), 1);
    assert_eq!(results.take("fast"), Some(1));
    assert!(results.failed("broken"));
    assert!(results.failed("slow"));
    assert!(matches!(
        results.failures().iter().find(|(n, _)| n == "slow"),
        Some((_, ToolError::Timeout(_)))
    ));
}
