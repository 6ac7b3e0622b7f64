//! Domain models for forge orchestration.
//!
//! - `TaskSpec` / `TaskResult`: one dispatched unit of work and its outcome
//! - `Artifact` / `AggregateArtifact`: build outputs and their fold
//! - `TestReport` / `AggregateTestReport`: test outputs and their fold
//! - `CompositeSpec`: the `builders` / `runners` spec shape
//! - `ValidationError` / `ConfigValidateOutput`: `config-validate` payloads

pub mod artifact;
pub mod composite;
pub mod report;
pub mod task;
pub mod validation;

pub use artifact::{AggregateArtifact, Artifact};
pub use composite::{CompositeShape, CompositeSpec, PARALLEL_BUILDER, PARALLEL_TEST_RUNNER};
pub use report::{
    AggregateTestReport, BatchHeader, Coverage, RunnerOutcome, TestReport, TestStats, TestStatus,
};
pub use task::{join_failures, TaskFailure, TaskResult, TaskSpec};
pub use validation::{
    merge_results, ChildContext, ConfigValidateInput, ConfigValidateOutput, ValidationError,
    ValidationResult, ValidationWarning,
};
