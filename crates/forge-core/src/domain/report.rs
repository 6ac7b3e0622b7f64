//! Test reports and the parallel-test fold.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::{join_failures, TaskResult};

/// Test status as reported by test engines.
///
/// A report that omits `status` is `Unknown`; only an explicit `passed`
/// counts as passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    /// Missing, or any status string this orchestrator does not recognise.
    #[default]
    #[serde(other)]
    Unknown,
}

impl TestStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, TestStatus::Passed)
    }
}

/// Test counters. Summation is field-wise and commutative; it saturates
/// at `u64::MAX`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestStats {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl Add for TestStats {
    type Output = TestStats;

    fn add(self, rhs: TestStats) -> TestStats {
        TestStats {
            total: self.total.saturating_add(rhs.total),
            passed: self.passed.saturating_add(rhs.passed),
            failed: self.failed.saturating_add(rhs.failed),
            skipped: self.skipped.saturating_add(rhs.skipped),
        }
    }
}

impl AddAssign for TestStats {
    fn add_assign(&mut self, rhs: TestStats) {
        *self = *self + rhs;
    }
}

impl Sum for TestStats {
    fn sum<I: Iterator<Item = TestStats>>(iter: I) -> Self {
        iter.fold(TestStats::default(), Add::add)
    }
}

/// Coverage summary. The zero value means "not collected".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Coverage {
    pub enabled: bool,
    pub percentage: f64,
    pub file_path: String,
}

/// Report returned by a `run` tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestReport {
    pub id: String,
    pub name: String,
    pub stage: String,
    pub status: TestStatus,
    pub start_time: Option<DateTime<Utc>>,
    /// Seconds.
    pub duration: f64,
    pub test_stats: TestStats,
    pub coverage: Coverage,
    pub error_message: String,
}

impl TestReport {
    /// Stand-in for a successful run whose engine returned no payload:
    /// passed, zero counters, coverage disabled.
    pub fn stand_in(name: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: stage.into(),
            status: TestStatus::Passed,
            ..Default::default()
        }
    }
}

/// Per-task entry kept on the aggregate report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerOutcome {
    pub name: String,
    pub engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TestStatus>,
    #[serde(default)]
    pub test_stats: TestStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Combined report of a parallel test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateTestReport {
    pub id: String,
    pub name: String,
    pub stage: String,
    pub status: TestStatus,
    pub start_time: DateTime<Utc>,
    /// Wall-clock seconds across the whole batch.
    pub duration: f64,
    pub test_stats: TestStats,
    pub coverage: Coverage,
    #[serde(default)]
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_reports: Vec<RunnerOutcome>,
}

/// Identity and timing of a test batch.
#[derive(Debug, Clone)]
pub struct BatchHeader {
    pub id: String,
    pub name: String,
    pub stage: String,
    pub start_time: DateTime<Utc>,
    pub duration: f64,
}

impl AggregateTestReport {
    /// Fold per-task results.
    ///
    /// Status is `failed` when any report is not `passed` or any task failed
    /// to execute. Coverage is copied from the task named
    /// `primary_coverage_runner`, if it completed.
    pub fn fold(
        header: BatchHeader,
        results: &[TaskResult<TestReport>],
        primary_coverage_runner: Option<&str>,
    ) -> Self {
        let test_stats: TestStats = results
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok())
            .map(|report| report.test_stats)
            .sum();

        let coverage = primary_coverage_runner
            .filter(|name| !name.is_empty())
            .and_then(|primary| {
                results
                    .iter()
                    .find(|r| r.name == primary)
                    .and_then(|r| r.outcome.as_ref().ok())
            })
            .map(|report| report.coverage.clone())
            .unwrap_or_default();

        let failures: Vec<_> = results.iter().filter_map(|r| r.failure().cloned()).collect();
        let failed_reports: Vec<&str> = results
            .iter()
            .filter(|r| matches!(&r.outcome, Ok(report) if !report.status.is_passed()))
            .map(|r| r.name.as_str())
            .collect();

        let status = if failures.is_empty() && failed_reports.is_empty() {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        };

        let mut messages = Vec::new();
        if !failures.is_empty() {
            messages.push(format!("execution failed: {}", join_failures(&failures)));
        }
        if !failed_reports.is_empty() {
            messages.push(format!("tests failed in: {}", failed_reports.join(", ")));
        }

        let sub_reports = results
            .iter()
            .map(|r| match &r.outcome {
                Ok(report) => RunnerOutcome {
                    name: r.name.clone(),
                    engine: r.engine.clone(),
                    status: Some(report.status),
                    test_stats: report.test_stats,
                    error: None,
                },
                Err(failure) => RunnerOutcome {
                    name: r.name.clone(),
                    engine: r.engine.clone(),
                    status: None,
                    test_stats: TestStats::default(),
                    error: Some(failure.reason.clone()),
                },
            })
            .collect();

        Self {
            id: header.id,
            name: header.name,
            stage: header.stage,
            status,
            start_time: header.start_time,
            duration: header.duration,
            test_stats,
            coverage,
            error_message: messages.join("; "),
            sub_reports,
        }
    }
}
