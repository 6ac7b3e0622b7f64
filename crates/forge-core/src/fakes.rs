//! In-process fake engine (testing only)
//!
//! `FakeEngine` satisfies [`EngineCaller`] without spawning anything.
//! Replies are scripted per concrete engine reference (after alias
//! expansion), optionally per tool, and every call is recorded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use forge_engine::{EngineCaller, EngineError, EngineResult, EngineTarget, JsonMap, ToolInvocation, ToolResult};
use serde_json::Value;

/// What the fake does when called.
#[derive(Debug, Clone)]
pub enum FakeReply {
    /// The tool ran; `is_error` may still be set.
    Result(ToolResult),
    /// The tools/call exchange failed.
    TransportError(String),
    /// The engine never completed the handshake.
    ConnectionError(String),
}

impl FakeReply {
    pub fn payload(payload: Value) -> Self {
        FakeReply::Result(ToolResult::success("ok", Some(payload)))
    }

    pub fn empty() -> Self {
        FakeReply::Result(ToolResult::success("ok", None))
    }

    pub fn tool_error(text: impl Into<String>, payload: Option<Value>) -> Self {
        FakeReply::Result(ToolResult::failure(text, payload))
    }
}

/// One call as seen by the fake.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Reference as written by the caller.
    pub uri: String,
    /// Concrete engine after alias expansion.
    pub engine: String,
    pub tool: String,
    pub arguments: JsonMap,
}

#[derive(Debug, Default)]
pub struct FakeEngine {
    replies: HashMap<String, FakeReply>,
    tool_replies: HashMap<(String, String), FakeReply>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply for every tool on `engine`.
    pub fn with_reply(mut self, engine: impl Into<String>, reply: FakeReply) -> Self {
        self.replies.insert(engine.into(), reply);
        self
    }

    /// Reply for one tool on `engine`; wins over [`FakeEngine::with_reply`].
    pub fn with_tool_reply(
        mut self,
        engine: impl Into<String>,
        tool: impl Into<String>,
        reply: FakeReply,
    ) -> Self {
        self.tool_replies.insert((engine.into(), tool.into()), reply);
        self
    }

    /// Sleep before answering calls to `engine`.
    pub fn with_delay(mut self, engine: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(engine.into(), delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn calls_to(&self, engine: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.engine == engine)
            .count()
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn reply_for(&self, engine: &str, tool: &str) -> Option<&FakeReply> {
        self.tool_replies
            .get(&(engine.to_string(), tool.to_string()))
            .or_else(|| self.replies.get(engine))
    }
}

#[async_trait]
impl EngineCaller for FakeEngine {
    async fn call_tool(&self, target: &EngineTarget, invocation: &ToolInvocation) -> EngineResult<ToolResult> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                uri: target.uri.clone(),
                engine: target.engine.clone(),
                tool: invocation.tool_name.clone(),
                arguments: invocation.arguments.clone(),
            });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&target.engine) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.reply_for(&target.engine, &invocation.tool_name) {
            Some(FakeReply::Result(result)) => Ok(result.clone()),
            Some(FakeReply::TransportError(message)) => Err(EngineError::Transport {
                engine: target.uri.clone(),
                tool: invocation.tool_name.clone(),
                message: message.clone(),
            }),
            Some(FakeReply::ConnectionError(message)) => Err(EngineError::Connection {
                engine: target.uri.clone(),
                message: message.clone(),
            }),
            None => Err(EngineError::Connection {
                engine: target.uri.clone(),
                message: "no reply scripted for this engine".to_string(),
            }),
        }
    }
}
