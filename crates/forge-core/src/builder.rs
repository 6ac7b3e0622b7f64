//! Parallel builder: one `build` call per task, folded into one artifact.

use std::time::Instant;

use chrono::Utc;
use forge_engine::{EngineResult, JsonMap, ToolInvocation, TOOL_BUILD};
use serde::Serialize;
use tracing::instrument;

use crate::dispatch::{CallOutcome, Dispatcher, PendingCall};
use crate::domain::artifact::{AggregateArtifact, Artifact};
use crate::domain::composite::{CompositeSpec, PARALLEL_BUILDER};
use crate::domain::task::{TaskFailure, TaskResult, TaskSpec};
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::obs;

/// A batch of builds sharing one source and destination.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// Name of the aggregate artifact.
    pub name: String,
    pub src: Option<String>,
    pub dest: Option<String>,
    pub tasks: Vec<TaskSpec>,
}

impl BuildRequest {
    pub fn new(name: impl Into<String>, tasks: Vec<TaskSpec>) -> Self {
        Self {
            name: name.into(),
            tasks,
            ..Default::default()
        }
    }

    /// Build a request from a `builders` composite spec.
    pub fn from_composite(name: impl Into<String>, spec: &CompositeSpec) -> Self {
        Self::new(name, spec.children.clone())
    }

    pub fn with_dirs(mut self, src: Option<String>, dest: Option<String>) -> Self {
        self.src = src;
        self.dest = dest;
        self
    }
}

/// Arguments of one `build` call.
#[derive(Debug, Serialize)]
struct BuildArgs<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    src: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dest: Option<&'a str>,
    engine: &'a str,
    spec: &'a JsonMap,
}

/// Aggregate artifact plus the per-task results it was folded from.
///
/// `error` is set when any task failed; the artifact is still the best
/// effort over the tasks that succeeded.
#[derive(Debug)]
pub struct BuildOutput {
    pub artifact: AggregateArtifact,
    pub results: Vec<TaskResult<Artifact>>,
    pub error: Option<OrchestrationError>,
}

impl BuildOutput {
    pub fn into_result(self) -> OrchestrationResult<AggregateArtifact> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.artifact),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParallelBuilder {
    dispatcher: Dispatcher,
}

impl ParallelBuilder {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Build every task concurrently and fold the artifacts.
    ///
    /// Only an empty task list is an error; per-task failures are reported
    /// in [`BuildOutput::error`].
    #[instrument(skip(self, request), fields(batch = %request.name, tasks = request.tasks.len()))]
    pub async fn run(&self, request: BuildRequest) -> OrchestrationResult<BuildOutput> {
        if request.tasks.is_empty() {
            return Err(OrchestrationError::NoTasks {
                kind: PARALLEL_BUILDER.list_field.to_string(),
            });
        }
        let started = Instant::now();

        let mut calls = Vec::with_capacity(request.tasks.len());
        let mut setup_failures = Vec::new();
        for (index, task) in request.tasks.iter().enumerate() {
            let label = task.label(index);
            match build_invocation(&request, task) {
                Ok(invocation) => {
                    obs::emit_task_dispatched(&request.name, &label, &task.engine_reference, TOOL_BUILD);
                    calls.push(PendingCall {
                        index,
                        name: label,
                        engine: task.engine_reference.clone(),
                        invocation,
                    });
                }
                Err(err) => setup_failures.push((index, label, task.engine_reference.clone(), err)),
            }
        }

        let mut outcomes = self.dispatcher.fan_out(calls).await;
        outcomes.extend(setup_failures.into_iter().map(|(index, name, engine, err)| CallOutcome {
            index,
            name,
            engine,
            result: Err(err),
        }));
        outcomes.sort_by_key(|o| o.index);

        let results: Vec<TaskResult<Artifact>> = outcomes.into_iter().map(artifact_result).collect();
        for r in &results {
            let reason = r.failure().map(|f| f.reason.as_str());
            obs::emit_task_finished(&request.name, &r.name, &r.engine, reason);
        }

        let artifacts = results
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok().cloned())
            .collect();
        let artifact = AggregateArtifact::fold(request.name.clone(), artifacts, Utc::now());

        let failures: Vec<TaskFailure> = results.iter().filter_map(|r| r.failure().cloned()).collect();
        obs::emit_batch_finished(
            &request.name,
            "build",
            results.len(),
            failures.len(),
            started.elapsed().as_millis() as u64,
        );

        let error = (!failures.is_empty()).then_some(OrchestrationError::PartialFailure { failures });
        Ok(BuildOutput {
            artifact,
            results,
            error,
        })
    }
}

fn build_invocation(request: &BuildRequest, task: &TaskSpec) -> EngineResult<ToolInvocation> {
    let args = BuildArgs {
        name: &task.name,
        src: request.src.as_deref(),
        dest: request.dest.as_deref(),
        engine: &task.engine_reference,
        spec: &task.spec,
    };
    ToolInvocation::from_args(TOOL_BUILD, &args)
}

fn artifact_result(outcome: CallOutcome) -> TaskResult<Artifact> {
    let CallOutcome {
        name, engine, result, ..
    } = outcome;

    let outcome = match result {
        Err(err) => Err(TaskFailure::new(&name, err.to_string())),
        Ok(tool) if tool.is_error => Err(TaskFailure::new(&name, non_empty(tool.text_summary, "build failed"))),
        Ok(tool) => match tool.decode::<Artifact>(&engine, "artifact") {
            Ok(Some(artifact)) => Ok(artifact),
            Ok(None) => Ok(Artifact::placeholder(&name)),
            Err(err) => Err(TaskFailure::new(&name, err.to_string())),
        },
    };

    TaskResult {
        name,
        engine,
        outcome,
    }
}

fn non_empty(text: String, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_args_skip_missing_dirs() {
        let request = BuildRequest::new("all", vec![]);
        let task = TaskSpec::new("api", "go://go-build");
        let inv = build_invocation(&request, &task).unwrap();
        assert_eq!(inv.tool_name, "build");
        assert_eq!(inv.arguments.get("name"), Some(&json!("api")));
        assert_eq!(inv.arguments.get("engine"), Some(&json!("go://go-build")));
        assert!(inv.arguments.get("src").is_none());
    }

    #[test]
    fn test_build_args_carry_dirs() {
        let request = BuildRequest::new("all", vec![])
            .with_dirs(Some("./cmd".to_string()), Some("./build/bin".to_string()));
        let task = TaskSpec::new("api", "go://go-build");
        let inv = build_invocation(&request, &task).unwrap();
        assert_eq!(inv.arguments.get("src"), Some(&json!("./cmd")));
        assert_eq!(inv.arguments.get("dest"), Some(&json!("./build/bin")));
    }

    #[test]
    fn test_tool_error_uses_text_summary() {
        let outcome = CallOutcome {
            index: 0,
            name: "api".to_string(),
            engine: "go://go-build".to_string(),
            result: Ok(forge_engine::ToolResult::failure("undefined: Foo", None)),
        };
        let result = artifact_result(outcome);
        assert_eq!(result.failure().unwrap().reason, "undefined: Foo");
    }

    #[test]
    fn test_missing_payload_yields_placeholder() {
        let outcome = CallOutcome {
            index: 0,
            name: "gen".to_string(),
            engine: "go://go-gen".to_string(),
            result: Ok(forge_engine::ToolResult::success("done", None)),
        };
        let artifact = artifact_result(outcome).outcome.unwrap();
        assert!(!artifact.is_produced());
        assert_eq!(artifact.name, "gen");
    }
}
