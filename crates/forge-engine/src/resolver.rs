//! Engine URI resolution.
//!
//! Turns an engine reference into either a process to spawn or an explicit
//! "needs the configuration tree" outcome for `alias://` references.
//!
//! The orchestrator's own version is carried by [`EngineResolver`] as a
//! plain value; internal engines always run at that version so that every
//! engine invocation comes from the same source snapshot as the caller.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::locator::{external_run_args, EngineLocator, GO_EXECUTABLE};
use crate::spec::FieldError;
use crate::uri::{short_name, EngineReference};

/// Executable plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCommand {
    pub executable: String,
    pub arguments: Vec<String>,
}

impl fmt::Display for ResolvedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.executable)?;
        for arg in &self.arguments {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Spawn this command.
    RemoteProcess(ResolvedCommand),
    /// Caller must map the alias using configuration it holds.
    DelegatedAlias { name: String },
}

/// Resolved command together with the reference it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineTarget {
    /// Reference as written by the user (before alias expansion).
    pub uri: String,
    /// Concrete `go://` reference the alias chain ended at.
    pub engine: String,
    pub command: ResolvedCommand,
}

/// Alias name to engine URI, taken from the declarative configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: impl Into<String>, uri: impl Into<String>) {
        self.entries.insert(alias.into(), uri.into());
    }

    pub fn with(mut self, alias: impl Into<String>, uri: impl Into<String>) -> Self {
        self.insert(alias, uri);
        self
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Build from a full configuration tree.
    ///
    /// Reads `engines: [{alias, uri}]` (`engine` is accepted in place of
    /// `uri`). A missing `engines` key yields an empty table.
    pub fn from_forge_spec(forge_spec: &Value) -> Result<Self, FieldError> {
        let mut table = Self::new();
        let Some(engines) = forge_spec.get("engines") else {
            return Ok(table);
        };
        let engines = engines
            .as_array()
            .ok_or_else(|| FieldError::wrong_type("engines", "list"))?;

        for (i, entry) in engines.iter().enumerate() {
            let field = format!("engines[{i}]");
            let obj = entry
                .as_object()
                .ok_or_else(|| FieldError::wrong_type(&field, "object"))?;
            let alias = obj
                .get("alias")
                .and_then(Value::as_str)
                .ok_or_else(|| FieldError::missing(format!("{field}.alias")))?;
            let uri = obj
                .get("uri")
                .or_else(|| obj.get("engine"))
                .and_then(Value::as_str)
                .ok_or_else(|| FieldError::missing(format!("{field}.uri")))?;
            table.insert(alias, uri);
        }
        Ok(table)
    }
}

/// Resolves engine references for one orchestrator version.
#[derive(Debug, Clone)]
pub struct EngineResolver {
    forge_version: String,
    locator: EngineLocator,
    aliases: AliasTable,
}

impl EngineResolver {
    pub fn new(forge_version: impl Into<String>, locator: EngineLocator) -> Self {
        Self {
            forge_version: forge_version.into(),
            locator,
            aliases: AliasTable::default(),
        }
    }

    /// Same resolver with an alias table attached.
    pub fn with_aliases(&self, aliases: AliasTable) -> Self {
        Self {
            forge_version: self.forge_version.clone(),
            locator: self.locator.clone(),
            aliases,
        }
    }

    pub fn forge_version(&self) -> &str {
        &self.forge_version
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Resolve one reference without consulting the alias table.
    pub fn resolve(&self, uri: &str) -> EngineResult<Resolution> {
        match EngineReference::parse(uri)? {
            EngineReference::Alias { name } => Ok(Resolution::DelegatedAlias { name }),
            EngineReference::Go { path, version } => {
                let arguments = if crate::uri::is_external_module(&path) {
                    external_run_args(&path, version.as_deref())
                } else {
                    // Embedded version is ignored for internal engines.
                    if let Some(embedded) = &version {
                        debug!(
                            engine = %uri,
                            embedded = %embedded,
                            forge_version = %self.forge_version,
                            "ignoring embedded version for internal engine"
                        );
                    }
                    self.locator
                        .locate(short_name(&path), &self.forge_version)?
                };
                Ok(Resolution::RemoteProcess(ResolvedCommand {
                    executable: GO_EXECUTABLE.to_string(),
                    arguments,
                }))
            }
        }
    }

    /// Resolve to a spawnable target, following aliases through the table.
    pub fn resolve_target(&self, uri: &str) -> EngineResult<EngineTarget> {
        let mut current = uri.to_string();
        let mut chain = vec![current.clone()];

        loop {
            match self.resolve(&current)? {
                Resolution::RemoteProcess(command) => {
                    return Ok(EngineTarget {
                        uri: uri.to_string(),
                        engine: current,
                        command,
                    });
                }
                Resolution::DelegatedAlias { name } => {
                    let next = self
                        .aliases
                        .get(&name)
                        .ok_or_else(|| EngineError::AliasRequiresConfig { name: name.clone() })?;
                    if chain.iter().any(|seen| seen == next) {
                        chain.push(next.to_string());
                        return Err(EngineError::AliasCycle {
                            chain: chain.join(" -> "),
                        });
                    }
                    chain.push(next.to_string());
                    current = next.to_string();
                }
            }
        }
    }
}

/// Free-function form: resolve `uri` for an orchestrator at `current_version`.
pub fn resolve(
    uri: &str,
    current_version: &str,
    locator: &EngineLocator,
) -> EngineResult<Resolution> {
    EngineResolver::new(current_version, locator.clone()).resolve(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::FORGE_MODULE;
    use serde_json::json;

    fn resolver(version: &str) -> EngineResolver {
        EngineResolver::new(version, EngineLocator::default())
    }

    #[test]
    fn test_alias_is_delegated() {
        let resolution = resolver("v0.9.0").resolve("alias://x").unwrap();
        assert_eq!(
            resolution,
            Resolution::DelegatedAlias {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn test_internal_uses_own_version() {
        let resolution = resolver("v0.9.0").resolve("go://go-build@v0.1.0").unwrap();
        let Resolution::RemoteProcess(cmd) = resolution else {
            panic!("expected remote process");
        };
        assert_eq!(cmd.executable, "go");
        assert!(cmd.arguments.iter().any(|a| a.contains("go-build")));
        assert!(cmd
            .arguments
            .contains(&format!("{FORGE_MODULE}/cmd/go-build@v0.9.0")));
        assert!(!cmd.arguments.iter().any(|a| a.contains("v0.1.0")));
    }

    #[test]
    fn test_internal_slash_qualified_uses_last_segment() {
        let Resolution::RemoteProcess(cmd) = resolver("v1.0.0").resolve("go://cmd/go-test").unwrap()
        else {
            panic!("expected remote process");
        };
        assert_eq!(
            cmd.arguments[1],
            format!("{FORGE_MODULE}/cmd/go-test@v1.0.0")
        );
    }

    #[test]
    fn test_external_dirty_version_stripped() {
        let Resolution::RemoteProcess(cmd) = resolver("v0.9.0")
            .resolve("go://github.com/o/r/cmd/tool@v1.0.0-dirty")
            .unwrap()
        else {
            panic!("expected remote process");
        };
        assert_eq!(cmd.arguments[1], "github.com/o/r/cmd/tool@v1.0.0");
    }

    #[test]
    fn test_external_defaults_to_latest() {
        let Resolution::RemoteProcess(cmd) = resolver("v0.9.0")
            .resolve("go://github.com/o/r/cmd/tool")
            .unwrap()
        else {
            panic!("expected remote process");
        };
        assert_eq!(cmd.to_string(), "go run github.com/o/r/cmd/tool@latest");
    }

    #[test]
    fn test_resolve_target_without_table_reports_alias() {
        let err = resolver("v0.9.0").resolve_target("alias://lint").unwrap_err();
        assert!(matches!(err, EngineError::AliasRequiresConfig { name } if name == "lint"));
    }

    #[test]
    fn test_resolve_target_follows_alias_chain() {
        let table = AliasTable::new()
            .with("unit", "alias://go-tests")
            .with("go-tests", "go://go-test");
        let target = resolver("v0.9.0")
            .with_aliases(table)
            .resolve_target("alias://unit")
            .unwrap();
        assert_eq!(target.uri, "alias://unit");
        assert_eq!(target.engine, "go://go-test");
        assert!(target.command.arguments[1].ends_with("/cmd/go-test@v0.9.0"));
    }

    #[test]
    fn test_resolve_target_detects_cycle() {
        let table = AliasTable::new()
            .with("a", "alias://b")
            .with("b", "alias://a");
        let err = resolver("v0.9.0")
            .with_aliases(table)
            .resolve_target("alias://a")
            .unwrap_err();
        assert!(matches!(err, EngineError::AliasCycle { .. }));
    }

    #[test]
    fn test_alias_table_from_forge_spec() {
        let table = AliasTable::from_forge_spec(&json!({
            "engines": [
                {"alias": "unit", "uri": "go://go-test"},
                {"alias": "img", "engine": "go://container-build"}
            ]
        }))
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("img"), Some("go://container-build"));
    }

    #[test]
    fn test_alias_table_rejects_malformed_entry() {
        let err = AliasTable::from_forge_spec(&json!({"engines": [{"uri": "go://x"}]}))
            .unwrap_err();
        assert_eq!(err.field, "engines[0].alias");
    }

    #[test]
    fn test_versions_do_not_interfere() {
        let a = resolver("v1.0.0");
        let b = resolver("v2.0.0");
        let Resolution::RemoteProcess(ca) = a.resolve("go://go-build").unwrap() else {
            panic!()
        };
        let Resolution::RemoteProcess(cb) = b.resolve("go://go-build").unwrap() else {
            panic!()
        };
        assert!(ca.arguments[1].ends_with("@v1.0.0"));
        assert!(cb.arguments[1].ends_with("@v2.0.0"));
    }
}
