//! Concurrent fan-out of tool calls to engines.
//!
//! One worker per task, no cap. Each worker sends exactly one outcome on a
//! channel; the dispatcher waits on every worker handle before reading the
//! channel, so nothing is read while a send might still be in flight.

use std::sync::Arc;

use forge_engine::{
    AliasTable, EngineCaller, EngineError, EngineResolver, EngineResult, ToolInvocation, ToolResult,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A call waiting to be dispatched.
#[derive(Debug, Clone)]
pub struct PendingCall {
    /// Position in the caller's task list; outcomes are returned in this order.
    pub index: usize,
    pub name: String,
    pub engine: String,
    pub invocation: ToolInvocation,
}

/// What came back for one [`PendingCall`].
#[derive(Debug)]
pub struct CallOutcome {
    pub index: usize,
    pub name: String,
    pub engine: String,
    pub result: EngineResult<ToolResult>,
}

/// Resolves engine references and performs tool calls.
#[derive(Clone)]
pub struct Dispatcher {
    resolver: Arc<EngineResolver>,
    caller: Arc<dyn EngineCaller>,
}

impl Dispatcher {
    pub fn new(resolver: EngineResolver, caller: Arc<dyn EngineCaller>) -> Self {
        Self {
            resolver: Arc::new(resolver),
            caller,
        }
    }

    pub fn resolver(&self) -> &EngineResolver {
        &self.resolver
    }

    /// Same dispatcher with an alias table attached to its resolver.
    pub fn with_aliases(&self, aliases: AliasTable) -> Self {
        Self {
            resolver: Arc::new(self.resolver.with_aliases(aliases)),
            caller: Arc::clone(&self.caller),
        }
    }

    /// Resolve `engine` and perform one tool call against it.
    pub async fn call_one(&self, engine: &str, invocation: &ToolInvocation) -> EngineResult<ToolResult> {
        let target = self.resolver.resolve_target(engine)?;
        debug!(engine = %engine, command = %target.command, tool = %invocation.tool_name, "calling engine");
        self.caller.call_tool(&target, invocation).await
    }

    /// Run every call concurrently and return one outcome per call, ordered
    /// by `index`.
    pub async fn fan_out(&self, calls: Vec<PendingCall>) -> Vec<CallOutcome> {
        let (tx, mut rx) = mpsc::unbounded_channel::<CallOutcome>();
        let mut handles = Vec::with_capacity(calls.len());
        let mut identities = Vec::with_capacity(calls.len());

        for call in calls {
            identities.push((call.index, call.name.clone(), call.engine.clone(), call.invocation.tool_name.clone()));
            let dispatcher = self.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let result = dispatcher.call_one(&call.engine, &call.invocation).await;
                let _ = tx.send(CallOutcome {
                    index: call.index,
                    name: call.name,
                    engine: call.engine,
                    result,
                });
            }));
        }
        drop(tx);

        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "engine call task did not complete");
            }
        }

        let mut outcomes = Vec::with_capacity(identities.len());
        while let Ok(outcome) = rx.try_recv() {
            outcomes.push(outcome);
        }

        // A worker that panicked never sent; report it as a failed call.
        for (index, name, engine, tool) in identities {
            if !outcomes.iter().any(|o| o.index == index) {
                outcomes.push(CallOutcome {
                    index,
                    name,
                    engine: engine.clone(),
                    result: Err(EngineError::Transport {
                        engine,
                        tool,
                        message: "worker terminated before reporting".to_string(),
                    }),
                });
            }
        }

        outcomes.sort_by_key(|o| o.index);
        outcomes
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
