//! Task specs and per-task results.

use std::fmt;

use forge_engine::JsonMap;
use serde::{Deserialize, Serialize};

/// One unit of work: which engine to call and with what configuration.
///
/// Names are optional for builders; test runners and validation rely on
/// them to tell siblings apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(default)]
    pub name: String,

    /// Engine reference (`go://...` or `alias://...`).
    #[serde(rename = "engine")]
    pub engine_reference: String,

    /// Opaque engine-specific configuration.
    #[serde(default)]
    pub spec: JsonMap,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, engine_reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine_reference: engine_reference.into(),
            spec: JsonMap::new(),
        }
    }

    pub fn with_spec(mut self, spec: JsonMap) -> Self {
        self.spec = spec;
        self
    }

    /// Name for messages; unnamed tasks are labelled by position and engine.
    pub fn label(&self, index: usize) -> String {
        if self.name.is_empty() {
            format!("#{index} ({})", self.engine_reference)
        } else {
            self.name.clone()
        }
    }
}

/// A task that did not produce a usable result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub name: String,
    pub reason: String,
}

impl TaskFailure {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.reason)
    }
}

/// Outcome of one task, produced once by its worker and consumed once by
/// the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult<T> {
    pub name: String,
    pub engine: String,
    pub outcome: Result<T, TaskFailure>,
}

impl<T> TaskResult<T> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        self.outcome.as_ref().err()
    }
}

/// Semicolon-joined `name: reason` list.
pub fn join_failures(failures: &[TaskFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
