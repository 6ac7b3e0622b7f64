//! Engine reference parsing.
//!
//! Grammar:
//!
//! ```text
//! go://<path>[@<version>]
//! alias://<name>
//! ```
//!
//! A `<path>` whose first segment contains a dot is an external Go module
//! path (`github.com/org/repo/cmd/tool`); anything else names an internal
//! engine, optionally slash-qualified (`cmd/go-build` and `go-build` are
//! the same engine).

use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};

pub const GO_SCHEME: &str = "go://";
pub const ALIAS_SCHEME: &str = "alias://";

/// A parsed engine reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineReference {
    /// Runnable Go module, internal or external.
    Go {
        path: String,
        version: Option<String>,
    },
    /// Name that only the declarative configuration can map to an engine.
    Alias { name: String },
}

impl EngineReference {
    pub fn parse(uri: &str) -> EngineResult<Self> {
        let uri = uri.trim();

        if let Some(rest) = uri.strip_prefix(GO_SCHEME) {
            let (path, version) = match rest.rsplit_once('@') {
                Some((path, version)) => (path, Some(version)),
                None => (rest, None),
            };
            let path = path.trim_matches('/');
            if path.is_empty() {
                return Err(EngineError::EmptyPath {
                    uri: uri.to_string(),
                });
            }
            let version = version
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            return Ok(EngineReference::Go {
                path: path.to_string(),
                version,
            });
        }

        if let Some(name) = uri.strip_prefix(ALIAS_SCHEME) {
            let name = name.trim();
            if name.is_empty() {
                return Err(EngineError::EmptyAliasName {
                    uri: uri.to_string(),
                });
            }
            return Ok(EngineReference::Alias {
                name: name.to_string(),
            });
        }

        Err(EngineError::UnsupportedScheme {
            uri: uri.to_string(),
        })
    }

    /// Whether this reference points at a module outside the orchestrator.
    pub fn is_external(&self) -> bool {
        match self {
            EngineReference::Go { path, .. } => is_external_module(path),
            EngineReference::Alias { .. } => false,
        }
    }
}

impl FromStr for EngineReference {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EngineReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineReference::Go {
                path,
                version: Some(version),
            } => write!(f, "{GO_SCHEME}{path}@{version}"),
            EngineReference::Go {
                path,
                version: None,
            } => write!(f, "{GO_SCHEME}{path}"),
            EngineReference::Alias { name } => write!(f, "{ALIAS_SCHEME}{name}"),
        }
    }
}

/// A first path segment with a dot is a domain, so the module is external.
pub fn is_external_module(path: &str) -> bool {
    path.split('/')
        .next()
        .map(|segment| segment.contains('.'))
        .unwrap_or(false)
}

/// Short binary name of an internal engine path (`cmd/go-build` -> `go-build`).
pub fn short_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Strip `-dirty` / `+dirty` build markers; they are not resolvable versions.
pub fn strip_dirty(version: &str) -> &str {
    version
        .strip_suffix("-dirty")
        .or_else(|| version.strip_suffix("+dirty"))
        .unwrap_or(version)
}
