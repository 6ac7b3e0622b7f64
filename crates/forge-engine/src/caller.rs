//! Engine-agnostic tool-call interface.
//!
//! Any engine, whatever it is written in, is reached through
//! [`EngineCaller::call_tool`]. The stdio MCP transport in [`crate::mcp`] is
//! the production implementation; orchestration code only sees this trait,
//! which keeps it testable with in-process fakes.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::resolver::EngineTarget;
use crate::spec::JsonMap;

pub const TOOL_BUILD: &str = "build";
pub const TOOL_RUN: &str = "run";
pub const TOOL_CONFIG_VALIDATE: &str = "config-validate";

/// One tool call request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub arguments: JsonMap,
}

impl ToolInvocation {
    pub fn new(tool_name: impl Into<String>, arguments: JsonMap) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Build from any serializable argument struct. Non-object values
    /// produce an empty argument map.
    pub fn from_args<T: Serialize>(tool_name: impl Into<String>, args: &T) -> EngineResult<Self> {
        let tool_name = tool_name.into();
        let value = serde_json::to_value(args).map_err(|source| EngineError::Decode {
            engine: "<local>".to_string(),
            what: format!("{tool_name} arguments"),
            source,
        })?;
        let arguments = match value {
            Value::Object(map) => map,
            _ => JsonMap::new(),
        };
        Ok(Self {
            tool_name,
            arguments,
        })
    }
}

/// What a completed tool call returned.
///
/// `is_error = true` means the engine ran and reported a semantic failure;
/// transport failures never produce a `ToolResult`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub text_summary: String,
    pub structured_payload: Option<Value>,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(text: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            text_summary: text.into(),
            structured_payload: payload,
            is_error: false,
        }
    }

    pub fn failure(text: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            text_summary: text.into(),
            structured_payload: payload,
            is_error: true,
        }
    }

    /// Decode the structured payload, if any.
    pub fn decode<T: DeserializeOwned>(&self, engine: &str, what: &str) -> EngineResult<Option<T>> {
        self.structured_payload
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|source| EngineError::Decode {
                engine: engine.to_string(),
                what: what.to_string(),
                source,
            })
    }
}

/// A remote engine reachable by tool calls.
#[async_trait]
pub trait EngineCaller: Send + Sync {
    /// Perform exactly one tool call against `target`.
    async fn call_tool(
        &self,
        target: &EngineTarget,
        invocation: &ToolInvocation,
    ) -> EngineResult<ToolResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Args {
        name: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        location: String,
    }

    #[test]
    fn test_invocation_from_args() {
        let inv = ToolInvocation::from_args(
            TOOL_BUILD,
            &Args {
                name: "api".to_string(),
            },
        )
        .unwrap();
        assert_eq!(inv.tool_name, "build");
        assert_eq!(inv.arguments.get("name"), Some(&json!("api")));
    }

    #[test]
    fn test_decode_payload() {
        let result = ToolResult::success("ok", Some(json!({"location": "./build/bin/api"})));
        let payload: Option<Payload> = result.decode("go://go-build", "artifact").unwrap();
        assert_eq!(payload.unwrap().location, "./build/bin/api");
    }

    #[test]
    fn test_decode_missing_payload_is_none() {
        let result = ToolResult::success("ok", None);
        let payload: Option<Payload> = result.decode("go://go-build", "artifact").unwrap();
        assert!(payload.is_none());
    }

    #[test]
    fn test_decode_malformed_payload() {
        let result = ToolResult::success("ok", Some(json!({"location": 3})));
        let err = result
            .decode::<Payload>("go://go-build", "artifact")
            .unwrap_err();
        assert!(matches!(err, EngineError::Decode { .. }));
    }
}
