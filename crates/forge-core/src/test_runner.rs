//! Parallel test runner: one `run` call per task, folded into one report.

use std::time::Instant;

use chrono::Utc;
use forge_engine::{EngineResult, JsonMap, ToolInvocation, TOOL_RUN};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::dispatch::{CallOutcome, Dispatcher, PendingCall};
use crate::domain::composite::{CompositeSpec, PARALLEL_TEST_RUNNER};
use crate::domain::report::{AggregateTestReport, BatchHeader, TestReport, TestStatus};
use crate::domain::task::{TaskFailure, TaskResult, TaskSpec};
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::obs;

/// Directories forwarded to every runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmp_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TestRunRequest {
    pub stage: String,
    /// Name of the aggregate report; defaults to the stage.
    pub name: String,
    pub tasks: Vec<TaskSpec>,
    pub primary_coverage_runner: Option<String>,
    pub context: RunContext,
}

impl TestRunRequest {
    pub fn new(stage: impl Into<String>, tasks: Vec<TaskSpec>) -> Self {
        let stage = stage.into();
        Self {
            name: stage.clone(),
            stage,
            tasks,
            ..Default::default()
        }
    }

    /// Build a request from a `runners` composite spec.
    pub fn from_composite(stage: impl Into<String>, spec: &CompositeSpec) -> Self {
        Self::new(stage, spec.children.clone()).with_primary(spec.primary.clone())
    }

    pub fn with_primary(mut self, primary: Option<String>) -> Self {
        self.primary_coverage_runner = primary;
        self
    }

    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunArgs<'a> {
    stage: &'a str,
    name: &'a str,
    engine: &'a str,
    spec: &'a JsonMap,
    #[serde(flatten)]
    context: &'a RunContext,
}

#[derive(Debug, Clone)]
pub struct ParallelTestRunner {
    dispatcher: Dispatcher,
}

impl ParallelTestRunner {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Run every task concurrently and fold the reports.
    ///
    /// Execution failures do not abort the batch; they mark the aggregate
    /// `failed` and are listed in its `error_message`.
    #[instrument(skip(self, request), fields(stage = %request.stage, tasks = request.tasks.len()))]
    pub async fn run(&self, request: TestRunRequest) -> OrchestrationResult<AggregateTestReport> {
        if request.tasks.is_empty() {
            return Err(OrchestrationError::NoTasks {
                kind: PARALLEL_TEST_RUNNER.list_field.to_string(),
            });
        }
        let start_time = Utc::now();
        let started = Instant::now();

        let mut outcomes = Vec::with_capacity(request.tasks.len());
        let mut calls = Vec::with_capacity(request.tasks.len());
        for (index, task) in request.tasks.iter().enumerate() {
            let label = task.label(index);
            match run_invocation(&request, task) {
                Ok(invocation) => {
                    obs::emit_task_dispatched(&request.name, &label, &task.engine_reference, TOOL_RUN);
                    calls.push(PendingCall {
                        index,
                        name: label,
                        engine: task.engine_reference.clone(),
                        invocation,
                    });
                }
                Err(err) => outcomes.push(CallOutcome {
                    index,
                    name: label,
                    engine: task.engine_reference.clone(),
                    result: Err(err),
                }),
            }
        }
        outcomes.extend(self.dispatcher.fan_out(calls).await);
        outcomes.sort_by_key(|o| o.index);

        let results: Vec<TaskResult<TestReport>> = outcomes
            .into_iter()
            .map(|outcome| report_result(outcome, &request.stage))
            .collect();
        for r in &results {
            let reason = r.failure().map(|f| f.reason.as_str());
            obs::emit_task_finished(&request.name, &r.name, &r.engine, reason);
        }

        let elapsed = started.elapsed();
        let header = BatchHeader {
            id: Uuid::new_v4().to_string(),
            name: request.name.clone(),
            stage: request.stage.clone(),
            start_time,
            duration: elapsed.as_secs_f64(),
        };
        let report = AggregateTestReport::fold(header, &results, request.primary_coverage_runner.as_deref());

        let failed = results
            .iter()
            .filter(|r| !matches!(&r.outcome, Ok(report) if report.status.is_passed()))
            .count();
        obs::emit_batch_finished(&request.name, "test", results.len(), failed, elapsed.as_millis() as u64);

        Ok(report)
    }
}

fn run_invocation(request: &TestRunRequest, task: &TaskSpec) -> EngineResult<ToolInvocation> {
    let args = RunArgs {
        stage: &request.stage,
        name: &task.name,
        engine: &task.engine_reference,
        spec: &task.spec,
        context: &request.context,
    };
    ToolInvocation::from_args(TOOL_RUN, &args)
}

/// A report sent alongside `isError` is kept and forced to `failed`; an
/// error with no report is an execution failure.
fn report_result(outcome: CallOutcome, stage: &str) -> TaskResult<TestReport> {
    let CallOutcome {
        name, engine, result, ..
    } = outcome;

    let outcome = match result {
        Err(err) => Err(TaskFailure::new(&name, err.to_string())),
        Ok(tool) => match tool.decode::<TestReport>(&engine, "test report") {
            Ok(Some(mut report)) => {
                if tool.is_error {
                    report.status = TestStatus::Failed;
                    if report.error_message.is_empty() {
                        report.error_message = tool.text_summary.clone();
                    }
                }
                Ok(report)
            }
            Ok(None) if tool.is_error => Err(TaskFailure::new(&name, tool.text_summary.clone())),
            Ok(None) => Ok(TestReport::stand_in(&name, stage)),
            Err(err) if tool.is_error => Err(TaskFailure::new(&name, format!("{}; {err}", tool.text_summary))),
            Err(err) => Err(TaskFailure::new(&name, err.to_string())),
        },
    };

    TaskResult {
        name,
        engine,
        outcome,
    }
}
