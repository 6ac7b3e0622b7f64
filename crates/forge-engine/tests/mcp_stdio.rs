//! Full MCP round trips against a scripted stdio engine.
//!
//! The engine is a small `sh` script that answers `initialize` and
//! `tools/call` with canned JSON-RPC lines, so these tests need nothing
//! beyond a POSIX shell and `sed`.
#![cfg(target_os = "linux")]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use forge_engine::{EngineCaller, EngineTarget, McpEngineCaller, ResolvedCommand, ToolInvocation};
use serde_json::{json, Map, Value};
use tempfile::TempDir;

const SCRIPT: &str = r#"
echo $$ > '@DIR@/pid'
echo "$*" > '@DIR@/args'
echo "scripted engine up" >&2
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"scripted-engine","version":"0.0.1"}}}\n' "$id"
      ;;
    *'"method":"tools/call"'*)
      case "$line" in
        *'"name":"lint"'*)
          printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"undefined: Foo"}],"isError":true}}\n' "$id"
          ;;
        *)
          printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"built api"}],"structuredContent":{"name":"api","type":"binary","location":"./build/bin/api"},"isError":false}}\n' "$id"
          ;;
      esac
      ;;
  esac
done
"#;

struct ScriptedEngine {
    dir: TempDir,
    script: PathBuf,
}

impl ScriptedEngine {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("engine.sh");
        let body = SCRIPT.replace("@DIR@", &dir.path().display().to_string());
        fs::write(&script, body).unwrap();
        Self { dir, script }
    }

    fn target(&self) -> EngineTarget {
        EngineTarget {
            uri: "go://scripted".to_string(),
            engine: "go://scripted".to_string(),
            command: ResolvedCommand {
                executable: "sh".to_string(),
                arguments: vec![self.script.display().to_string()],
            },
        }
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.dir.path().join(name))
            .unwrap()
            .trim()
            .to_string()
    }

    fn pid(&self) -> u32 {
        self.read("pid").parse().unwrap()
    }
}

/// Gone from the process table, or a zombie awaiting reaping.
fn has_exited(pid: u32) -> bool {
    let status = Path::new("/proc").join(pid.to_string()).join("status");
    match fs::read_to_string(status) {
        Ok(text) => text
            .lines()
            .any(|line| line.starts_with("State:") && line.contains('Z')),
        Err(_) => true,
    }
}

async fn wait_for_exit(pid: u32) -> bool {
    for _ in 0..100 {
        if has_exited(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

fn arguments(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[tokio::test]
async fn test_tool_call_round_trip_parses_result() {
    let engine = ScriptedEngine::new();
    let caller = McpEngineCaller::new("v0.9.0");
    let invocation = ToolInvocation::new(
        "build",
        arguments(json!({"name": "api", "dest": "./build/bin"})),
    );

    let result = caller.call_tool(&engine.target(), &invocation).await.unwrap();

    assert_eq!(result.text_summary, "built api");
    assert!(!result.is_error);
    let payload = result.structured_payload.expect("structured content");
    assert_eq!(payload["location"], json!("./build/bin/api"));
    assert_eq!(payload["name"], json!("api"));
    assert_eq!(engine.read("args"), "--mcp");
    assert!(wait_for_exit(engine.pid()).await, "engine still running after the call");
}

#[tokio::test]
async fn test_tool_error_reply_sets_is_error() {
    let engine = ScriptedEngine::new();
    let caller = McpEngineCaller::new("v0.9.0");
    let invocation = ToolInvocation::new("lint", arguments(json!({"packages": ["./..."]})));

    let result = caller.call_tool(&engine.target(), &invocation).await.unwrap();

    assert!(result.is_error);
    assert_eq!(result.text_summary, "undefined: Foo");
    assert!(result.structured_payload.is_none());
    assert!(wait_for_exit(engine.pid()).await, "engine still running after the call");
}
