//! forge-core: parallel build/test orchestration and recursive validation
//!
//! Composite engines fan work out to child engines through a
//! [`Dispatcher`] and fold what comes back:
//!
//! - [`ParallelBuilder`]: one `build` call per task, folded into an
//!   [`AggregateArtifact`]
//! - [`ParallelTestRunner`]: one `run` call per task, folded into an
//!   [`AggregateTestReport`]
//! - [`RecursiveValidator`]: structural and semantic checks on a composite
//!   spec, then `config-validate` on every child
//!
//! Engines are reached through [`forge_engine::EngineCaller`]; [`fakes`]
//! provides an in-process implementation for tests.

pub mod builder;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod fakes;
pub mod obs;
pub mod telemetry;
pub mod test_runner;
pub mod validator;

pub use builder::{BuildOutput, BuildRequest, ParallelBuilder};
pub use dispatch::{CallOutcome, Dispatcher, PendingCall};
pub use domain::{
    AggregateArtifact, AggregateTestReport, Artifact, ChildContext, CompositeShape, CompositeSpec,
    ConfigValidateInput, ConfigValidateOutput, Coverage, TaskFailure, TaskResult, TaskSpec,
    TestReport, TestStats, TestStatus, ValidationError, ValidationResult, ValidationWarning,
    PARALLEL_BUILDER, PARALLEL_TEST_RUNNER,
};
pub use error::{OrchestrationError, OrchestrationResult};
pub use test_runner::{ParallelTestRunner, RunContext, TestRunRequest};
pub use validator::RecursiveValidator;
