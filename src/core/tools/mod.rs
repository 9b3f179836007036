//! Tool execution for duplex sessions.
//!
//! - [`Tool`]: capability interface (name, description, input schema, execute)
//! - [`ToolRegistry`]: tool instances plus a bounded invocation log
//! - [`ToolEngine`]: background execution with deadlines, progress, and cancellation
//! - [`FanOut`]: concurrent sub-lookups with partial-failure tolerance

pub mod aggregator;
pub mod base;
pub mod builtin;
pub mod engine;
pub mod progress;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{Aggregated, FanOut};
pub use base::{Tool, ToolKind, parse_tool_input};
pub use builtin::BuiltinToolSettings;
pub use engine::{
    ActiveToolInfo, EngineStatsSnapshot, TaskOutcome, ToolEngine, ToolEngineConfig,
    ToolResultSink,
};
pub use progress::{ProgressChannel, ProgressReporter};
pub use registry::{ToolLogEntry, ToolRegistry};
