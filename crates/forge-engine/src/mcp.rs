//! MCP stdio transport for engines.
//!
//! Each call walks the same lifecycle:
//!
//! ```text
//! Resolved -> Spawned -> Connected -> Invoked -> Completed | Failed -> Closed
//! ```
//!
//! The engine is launched with `--mcp` appended, inherits our environment,
//! and writes its diagnostics straight to our stderr. The session is
//! cancelled (which also reaps the child) on every path out of
//! [`McpEngineCaller::call_tool`]. Nothing is pooled.

use std::process::Stdio;

use async_trait::async_trait;
use rmcp::model::{CallToolResult, ClientInfo, Content, RawContent};
use rmcp::transport::TokioChildProcess;
use rmcp::ServiceExt;
use serde_json::json;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::caller::{EngineCaller, ToolInvocation, ToolResult};
use crate::error::{EngineError, EngineResult};
use crate::resolver::EngineTarget;

/// Flag that switches an engine binary into MCP server mode.
pub const SERVER_MODE_FLAG: &str = "--mcp";

/// Name the orchestrator presents during the handshake.
pub const CLIENT_NAME: &str = "forge";

/// Spawns one engine process per call and speaks MCP over its stdio.
#[derive(Debug, Clone)]
pub struct McpEngineCaller {
    client_name: String,
    client_version: String,
}

impl McpEngineCaller {
    pub fn new(client_version: impl Into<String>) -> Self {
        Self {
            client_name: CLIENT_NAME.to_string(),
            client_version: client_version.into(),
        }
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    fn client_info(&self) -> ClientInfo {
        let mut info = ClientInfo::default();
        info.client_info.name = self.client_name.clone();
        info.client_info.version = self.client_version.clone();
        info
    }

    fn command_for(target: &EngineTarget) -> Command {
        let mut cmd = Command::new(&target.command.executable);
        cmd.args(&target.command.arguments)
            .arg(SERVER_MODE_FLAG)
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl EngineCaller for McpEngineCaller {
    async fn call_tool(
        &self,
        target: &EngineTarget,
        invocation: &ToolInvocation,
    ) -> EngineResult<ToolResult> {
        let engine = target.uri.as_str();
        let tool = invocation.tool_name.as_str();

        // Request is built up front so nothing can fail between connect and close.
        let params = serde_json::from_value(json!({
            "name": tool,
            "arguments": invocation.arguments,
        }))
        .map_err(|source| EngineError::Decode {
            engine: engine.to_string(),
            what: "tools/call request".to_string(),
            source,
        })?;

        // Spawned
        debug!(engine, command = %target.command, "spawning engine");
        let transport = TokioChildProcess::new(Self::command_for(target)).map_err(|source| {
            EngineError::SpawnFailed {
                engine: engine.to_string(),
                source,
            }
        })?;

        // Connected. A failed handshake drops the transport, which kills the child.
        let service = self
            .client_info()
            .serve(transport)
            .await
            .map_err(|e| EngineError::Connection {
                engine: engine.to_string(),
                message: format!("initialization failed: {e}"),
            })?;

        // Invoked
        info!(engine, tool, "calling engine tool");
        let outcome = service.call_tool(params).await;

        // Closed, whatever the outcome.
        if let Err(e) = service.cancel().await {
            warn!(engine, error = %e, "error during engine shutdown");
        }

        let result = outcome.map_err(|e| EngineError::Transport {
            engine: engine.to_string(),
            tool: tool.to_string(),
            message: e.to_string(),
        })?;

        let result = tool_result_from(result);
        debug!(engine, tool, is_error = result.is_error, "engine tool returned");
        Ok(result)
    }
}

/// Convert an MCP `CallToolResult` into a [`ToolResult`].
pub fn tool_result_from(result: CallToolResult) -> ToolResult {
    ToolResult {
        text_summary: content_to_text(&result.content),
        structured_payload: result.structured_content,
        is_error: result.is_error.unwrap_or(false),
    }
}

/// Concatenate the text entries of an MCP content list.
///
/// Non-text entries are rendered as a `[non-text]` placeholder.
pub fn content_to_text(content: &[Content]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(content.len());
    for item in content {
        match &item.raw {
            RawContent::Text(text) => parts.push(text.text.clone()),
            _ => parts.push("[non-text]".into()),
        }
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolvedCommand;

    fn target(executable: &str) -> EngineTarget {
        EngineTarget {
            uri: "go://fake".to_string(),
            engine: "go://fake".to_string(),
            command: ResolvedCommand {
                executable: executable.to_string(),
                arguments: vec!["run".to_string(), "fake".to_string()],
            },
        }
    }

    #[test]
    fn test_content_to_text_joins_text_entries() {
        let content = vec![Content::text("line one"), Content::text("line two")];
        assert_eq!(content_to_text(&content), "line one\nline two");
    }

    #[test]
    fn test_client_info_identifies_caller() {
        let info = McpEngineCaller::new("v0.9.0").client_info();
        assert_eq!(info.client_info.name, "forge");
        assert_eq!(info.client_info.version, "v0.9.0");
    }

    #[test]
    fn test_command_appends_server_flag() {
        let cmd = McpEngineCaller::command_for(&target("go"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["run", "fake", "--mcp"]);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_infrastructure_error() {
        let caller = McpEngineCaller::new("v0.9.0");
        let err = caller
            .call_tool(
                &target("/nonexistent/forge-engine-binary"),
                &ToolInvocation::new("build", Default::default()),
            )
            .await
            .unwrap_err();
        assert!(err.is_infrastructure(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_process_exiting_before_handshake_is_connection_error() {
        // `true` exits immediately without speaking MCP.
        let caller = McpEngineCaller::new("v0.9.0");
        let err = caller
            .call_tool(
                &target("true"),
                &ToolInvocation::new("build", Default::default()),
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, EngineError::Connection { .. }),
            "unexpected error: {err}"
        );
    }
}
