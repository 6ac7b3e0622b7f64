//! Structured lifecycle events for batches and validation.
//!
//! Events are emitted at `info!` with an `event` field, so they can be
//! filtered with `RUST_LOG` and shipped as JSON with `--log-json`.

use tracing::{info, warn};

/// Emit event: a task was handed to its engine.
pub fn emit_task_dispatched(batch: &str, task: &str, engine: &str, tool: &str) {
    info!(
        event = "task.dispatched",
        batch = %batch,
        task = %task,
        engine = %engine,
        tool = %tool,
    );
}

/// Emit event: a task finished. Failures are logged at warn level.
pub fn emit_task_finished(batch: &str, task: &str, engine: &str, error: Option<&str>) {
    match error {
        None => info!(event = "task.finished", batch = %batch, task = %task, engine = %engine, success = true),
        Some(error) => warn!(
            event = "task.finished",
            batch = %batch,
            task = %task,
            engine = %engine,
            success = false,
            error = %error,
        ),
    }
}

/// Emit event: every task in the batch has reported back.
pub fn emit_batch_finished(batch: &str, kind: &str, total: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "batch.finished",
        batch = %batch,
        kind = %kind,
        total = total,
        failed = failed,
        duration_ms = duration_ms,
    );
}

/// Emit event: a composite spec was validated.
pub fn emit_validation_finished(spec_name: &str, valid: bool, errors: usize, warnings: usize) {
    info!(
        event = "validation.finished",
        spec_name = %spec_name,
        valid = valid,
        errors = errors,
        warnings = warnings,
    );
}
