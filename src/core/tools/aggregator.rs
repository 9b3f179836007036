//! Fan-out/fan-in over independent sub-lookups.
//!
//! ```rust,ignore
//! let results = FanOut::new(Duration::from_secs(15))
//!     .lookup("weather", source.weather(&city))
//!     .lookup("attractions", source.attractions(&city))
//!     .join()
//!     .await;
//! let weather = results.get("weather");
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::future::{BoxFuture, join_all};
use tracing::warn;

use crate::errors::{ToolError, ToolResult};

/// Builder for a set of concurrent lookups sharing one per-lookup deadline.
pub struct FanOut<'a, T> {
    deadline: Duration,
    lookups: Vec<(String, BoxFuture<'a, ToolResult<T>>)>,
}

impl<'a, T: Send + 'a> FanOut<'a, T> {
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            lookups: Vec::new(),
        }
    }

    pub fn lookup<F>(mut self, name: impl Into<String>, lookup: F) -> Self
    where
        F: Future<Output = ToolResult<T>> + Send + 'a,
    {
        self.lookups.push((name.into(), Box::pin(lookup)));
        self
    }

    /// Run every lookup to a terminal state. Never short-circuits.
    pub async fn join(self) -> Aggregated<T> {
        let deadline = self.deadline;
        let outcomes = join_all(self.lookups.into_iter().map(|(name, lookup)| async move {
            let outcome = match tokio::time::timeout(deadline, lookup).await {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout(deadline)),
            };
            (name, outcome)
        }))
        .await;

        let mut aggregated = Aggregated {
            results: HashMap::new(),
            failures: Vec::new(),
        };
        for (name, outcome) in outcomes {
            match outcome {
                Ok(value) => {
                    aggregated.results.insert(name, value);
                }
                Err(e) => {
                    warn!(lookup = %name, "Sub-lookup failed: {}", e);
                    aggregated.failures.push((name, e));
                }
            }
        }
        aggregated
    }
}

/// Results of a [`FanOut`], keyed by lookup name.
#[derive(Debug)]
pub struct Aggregated<T> {
    results: HashMap<String, T>,
    failures: Vec<(String, ToolError)>,
}

impl<T> Aggregated<T> {
    pub fn get(&self, name: &str) -> Option<&T> {
        self.results.get(name)
    }

    pub fn take(&mut self, name: &str) -> Option<T> {
        self.results.remove(name)
    }

    pub fn failures(&self) -> &[(String, ToolError)] {
        &self.failures
    }

    pub fn failed(&self, name: &str) -> bool {
        self.failures.iter().any(|(n, _)| n == name)
    }

    pub fn succeeded(&self) -> usize {
        self.results.len()
    }
}
