//! Error types for orchestration.

use forge_engine::EngineError;

use crate::domain::task::{join_failures, TaskFailure};

/// Errors produced by the parallel builder and test runner.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    /// Empty task list
    #[error("no {kind} specified")]
    NoTasks { kind: String },

    /// One or more tasks did not produce a result
    #[error("{} task(s) failed: {}", .failures.len(), join_failures(.failures))]
    PartialFailure { failures: Vec<TaskFailure> },

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

impl OrchestrationError {
    pub fn failures(&self) -> &[TaskFailure] {
        match self {
            OrchestrationError::PartialFailure { failures } => failures,
            _ => &[],
        }
    }
}

/// Result type for orchestration operations.
pub type OrchestrationResult<T> = std::result::Result<T, OrchestrationError>;
