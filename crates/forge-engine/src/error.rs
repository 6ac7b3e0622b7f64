//! Error types for forge-engine

use thiserror::Error;

/// Errors produced while resolving or calling an engine.
///
/// Variants split into two families: resolution errors (the reference could
/// not be turned into a command) and infrastructure errors (the engine never
/// produced a tool result). A tool that runs and reports failure is not an
/// error here; see [`crate::ToolResult::is_error`].
#[derive(Error, Debug)]
pub enum EngineError {
    /// Scheme is neither `go://` nor `alias://`
    #[error("unsupported engine scheme in {uri:?} (expected go:// or alias://)")]
    UnsupportedScheme { uri: String },

    /// Nothing after `go://`
    #[error("empty engine path in {uri:?}")]
    EmptyPath { uri: String },

    /// Nothing after `alias://`
    #[error("empty alias name in {uri:?}")]
    EmptyAliasName { uri: String },

    /// Alias reference with no alias table to resolve it against
    #[error("alias://{name} requires configuration-level resolution")]
    AliasRequiresConfig { name: String },

    /// Alias chain loops back on itself
    #[error("alias cycle detected: {chain}")]
    AliasCycle { chain: String },

    /// Local development mode is on but no checkout could be found
    #[error("forge repository not found for local mode (searched: {searched})")]
    LocalRepoNotFound { searched: String },

    /// Engine process could not be started
    #[error("failed to spawn engine {engine}: {source}")]
    SpawnFailed {
        engine: String,
        source: std::io::Error,
    },

    /// Protocol handshake failed (process exited, malformed initialize)
    #[error("failed to connect to engine {engine}: {message}")]
    Connection { engine: String, message: String },

    /// The tools/call exchange itself failed
    #[error("tool call {tool} on engine {engine} failed: {message}")]
    Transport {
        engine: String,
        tool: String,
        message: String,
    },

    /// Structured payload did not have the expected shape
    #[error("engine {engine} returned an unreadable {what}: {source}")]
    Decode {
        engine: String,
        what: String,
        source: serde_json::Error,
    },
}

impl EngineError {
    /// The reference itself is malformed or cannot be resolved here.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            EngineError::UnsupportedScheme { .. }
                | EngineError::EmptyPath { .. }
                | EngineError::EmptyAliasName { .. }
                | EngineError::AliasRequiresConfig { .. }
                | EngineError::AliasCycle { .. }
                | EngineError::LocalRepoNotFound { .. }
        )
    }

    /// The engine never ran to completion.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            EngineError::SpawnFailed { .. }
                | EngineError::Connection { .. }
                | EngineError::Transport { .. }
        )
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
