use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::base::{Tool, ToolKind};
use super::builtin::{self, BuiltinToolSettings};
use super::progress::ProgressReporter;
use crate::core::events::ToolSpecification;
use crate::errors::ToolResult;

/// Default number of invocations kept in the log.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// One recorded tool invocation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolLogEntry {
    pub timestamp: String,
    pub tool: String,
    pub input: Value,
    pub output: Value,
    pub status: String,
}

/// Registry of tool instances, in registration order.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
    log: Mutex<VecDeque<ToolLogEntry>>,
    log_capacity: usize,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }

    pub fn with_log_capacity(log_capacity: usize) -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            log: Mutex::new(VecDeque::new()),
            log_capacity,
        }
    }

    /// Registry preloaded with the built-in tools.
    pub fn with_builtin_tools(settings: BuiltinToolSettings) -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry, settings);
        registry
    }

    /// Register a tool. A tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if let Some(&position) = self.index.get(&name) {
            warn!(tool_name = %name, "Replacing already registered tool");
            self.tools[position] = tool;
        } else {
            self.index.insert(name, self.tools.len());
            self.tools.push(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| self.tools[i].clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool configuration advertised at prompt start.
    pub fn tool_specs(&self) -> Vec<ToolSpecification> {
        self.tools
            .iter()
            .map(|t| ToolSpecification::new(t.name(), t.description(), &t.input_schema()))
            .collect()
    }

    /// Execute `name` with `input`.
    ///
    /// An unknown tool yields `Ok({"error": "Unknown tool: <name>"})`. Fast
    /// tools receive a detached reporter.
    pub async fn execute(
        &self,
        name: &str,
        input: Value,
        progress: ProgressReporter,
    ) -> ToolResult<Value> {
        let Some(tool) = self.get(name) else {
            warn!(tool_name = %name, "Model requested unknown tool");
            let output = json!({ "error": format!("Unknown tool: {name}") });
            self.record(name, input, output.clone(), "error");
            return Ok(output);
        };

        let reporter = match tool.kind() {
            ToolKind::Fast => ProgressReporter::detached(name),
            ToolKind::Slow => progress,
        };

        debug!(tool_name = %name, "Executing tool");
        let result = tool.execute(input.clone(), reporter).await;
        match &result {
            Ok(output) => self.record(name, input, output.clone(), "success"),
            Err(e) => self.record(name, input, json!({ "error": e.to_string() }), "error"),
        }
        result
    }

    /// Append an entry to the invocation log, evicting the oldest past capacity.
    pub fn record(&self, tool: &str, input: Value, output: Value, status: &str) {
        let entry = ToolLogEntry {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            tool: tool.to_string(),
            input,
            output,
            status: status.to_string(),
        };
        let mut log = self.log.lock();
        log.push_back(entry);
        while log.len() > self.log_capacity {
            log.pop_front();
        }
    }

    pub fn logs(&self) -> Vec<ToolLogEntry> {
        self.log.lock().iter().cloned().collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
