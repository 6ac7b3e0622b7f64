//! forge-engine: engine addressing and tool-call transport for Forge
//!
//! This crate provides the layer that turns an engine reference
//! (`go://go-build`, `go://github.com/org/repo/cmd/tool@v1.2.0`,
//! `alias://unit-tests`) into a running process and performs one MCP tool
//! call against it.
//!
//! ## Layer 0 - Engine dispatch
//!
//! - [`uri`]: reference grammar and internal/external classification
//! - [`locator`]: run-command construction, local checkout discovery
//! - [`resolver`]: [`EngineResolver`], alias tables
//! - [`caller`]: the [`EngineCaller`] seam and tool-call value types
//! - [`mcp`]: [`McpEngineCaller`], the stdio MCP adapter
//! - [`spec`]: typed helpers for loosely-typed spec payloads

pub mod caller;
pub mod error;
pub mod locator;
pub mod mcp;
pub mod resolver;
pub mod spec;
pub mod uri;

pub use caller::{
    EngineCaller, ToolInvocation, ToolResult, TOOL_BUILD, TOOL_CONFIG_VALIDATE, TOOL_RUN,
};
pub use error::{EngineError, EngineResult};
pub use locator::{EngineLocator, LocatorConfig};
pub use mcp::{McpEngineCaller, SERVER_MODE_FLAG};
pub use resolver::{resolve, AliasTable, EngineResolver, EngineTarget, Resolution, ResolvedCommand};
pub use spec::{FieldError, JsonMap, SpecReader};
pub use uri::EngineReference;
