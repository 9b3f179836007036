//! In-memory collaborators for tool and session unit tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::engine::ToolResultSink;
use crate::core::transport::{OutgoingFrame, Transport};
use crate::errors::{SessionError, SessionResult};

/// Transport that records every frame.
#[derive(Default)]
pub struct RecordingTransport {
    frames: Mutex<Vec<OutgoingFrame>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn frames(&self) -> Vec<OutgoingFrame> {
        self.frames.lock().clone()
    }

    /// `(status, progress)` of every tool status frame, in order
    pub fn tool_statuses(&self) -> Vec<(String, u8)> {
        self.frames
            .lock()
            .iter()
            .filter_map(|frame| match frame {
                OutgoingFrame::ToolStatus {
                    status, progress, ..
                } => Some((status.clone(), *progress)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_frame(&self, frame: OutgoingFrame) -> SessionResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SessionError::Delivery("transport failing".to_string()));
        }
        self.frames.lock().push(frame);
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }
}

/// Result sink that records every tool result sequence.
pub struct RecordingSink {
    results: Mutex<Vec<(String, String, Value)>>,
    active: AtomicBool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            active: AtomicBool::new(true),
        }
    }
}

impl RecordingSink {
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// `(content_name, tool_use_id, result)` of every sequence sent
    pub fn results(&self) -> Vec<(String, String, Value)> {
        self.results.lock().clone()
    }
}

#[async_trait]
impl ToolResultSink for RecordingSink {
    async fn send_tool_result(
        &self,
        content_name: &str,
        tool_use_id: &str,
        result: &Value,
    ) -> SessionResult<()> {
        if !self.is_active() {
            return Err(SessionError::NotActive);
        }
        self.results.lock().push((
            content_name.to_string(),
            tool_use_id.to_string(),
            result.clone(),
        ));
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
