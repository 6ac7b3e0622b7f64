//! Run-command construction for internal engines.
//!
//! Internal engines are binaries under the orchestrator's own module
//! (`github.com/alexandremahdhaoui/forge/cmd/<name>`). By default they are
//! launched with `go run <module>/cmd/<name>@<version>`. In local development
//! mode (`FORGE_RUN_LOCAL_ENABLED=true`) they are run from a checkout instead,
//! located in this order:
//!
//! 1. `FORGE_REPO_PATH`
//! 2. the Go module cache (`GOMODCACHE`, then `$GOPATH/pkg/mod`, then `~/go/pkg/mod`)
//! 3. walking upward from the running executable

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::uri::strip_dirty;

/// Go module path of the orchestrator.
pub const FORGE_MODULE: &str = "github.com/alexandremahdhaoui/forge";

/// Entrypoint that identifies a checkout of the orchestrator.
pub const FORGE_ENTRYPOINT: &str = "cmd/forge/main.go";

pub const ENV_RUN_LOCAL: &str = "FORGE_RUN_LOCAL_ENABLED";
pub const ENV_REPO_PATH: &str = "FORGE_REPO_PATH";

/// Executable used to run Go engines.
pub const GO_EXECUTABLE: &str = "go";

/// Locator settings. Read once from the environment, then passed by value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocatorConfig {
    /// Run internal engines from a local checkout.
    pub run_local: bool,
    /// Explicit checkout location.
    pub repo_override: Option<PathBuf>,
    /// Go module cache root.
    pub module_cache: Option<PathBuf>,
    /// Path of the running orchestrator binary.
    pub executable: Option<PathBuf>,
}

impl LocatorConfig {
    pub fn from_env() -> Self {
        let run_local = env::var(ENV_RUN_LOCAL)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let repo_override = env::var_os(ENV_REPO_PATH)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let module_cache = env::var_os("GOMODCACHE")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                env::var_os("GOPATH")
                    .filter(|v| !v.is_empty())
                    .map(|p| PathBuf::from(p).join("pkg").join("mod"))
            })
            .or_else(|| {
                env::var_os("HOME")
                    .filter(|v| !v.is_empty())
                    .map(|h| PathBuf::from(h).join("go").join("pkg").join("mod"))
            });

        Self {
            run_local,
            repo_override,
            module_cache,
            executable: env::current_exe().ok(),
        }
    }
}

/// Builds the `go` argument lists used to launch engines.
#[derive(Debug, Clone, Default)]
pub struct EngineLocator {
    config: LocatorConfig,
}

impl EngineLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Arguments that run the internal engine `short_name` at `version`.
    pub fn locate(&self, short_name: &str, version: &str) -> EngineResult<Vec<String>> {
        if self.config.run_local {
            let repo = self.find_forge_repo(version)?;
            debug!(engine = short_name, repo = %repo.display(), "running engine from local checkout");
            return Ok(vec![
                "run".to_string(),
                "-C".to_string(),
                repo.to_string_lossy().into_owned(),
                format!("./cmd/{short_name}"),
            ]);
        }

        Ok(vec![
            "run".to_string(),
            format!(
                "{FORGE_MODULE}/cmd/{short_name}@{}",
                effective_version(version)
            ),
        ])
    }

    /// Locate a checkout of the orchestrator for local development mode.
    pub fn find_forge_repo(&self, version: &str) -> EngineResult<PathBuf> {
        let mut searched = Vec::new();

        // Strategy 1: explicit override
        if let Some(path) = &self.config.repo_override {
            if is_forge_repo(path) {
                return Ok(path.clone());
            }
            searched.push(format!("{}={}", ENV_REPO_PATH, path.display()));
        }

        // Strategy 2: Go module cache, only meaningful for a concrete version
        let version = effective_version(version);
        if let Some(cache) = &self.config.module_cache {
            if version != "latest" {
                let candidate = cache.join(format!("{FORGE_MODULE}@{version}"));
                if is_forge_repo(&candidate) {
                    info!(path = %candidate.display(), "using forge from module cache");
                    return Ok(candidate);
                }
                searched.push(candidate.display().to_string());
            }
        }

        // Strategy 3: walk upward from the executable
        if let Some(exe) = &self.config.executable {
            for dir in exe.ancestors().skip(1) {
                if is_forge_repo(dir) {
                    info!(path = %dir.display(), "using forge checkout above executable");
                    return Ok(dir.to_path_buf());
                }
            }
            searched.push(format!("ancestors of {}", exe.display()));
        }

        Err(EngineError::LocalRepoNotFound {
            searched: if searched.is_empty() {
                "nothing configured".to_string()
            } else {
                searched.join(", ")
            },
        })
    }
}

/// Arguments that run an external module at `version` (default `latest`).
pub fn external_run_args(module_path: &str, version: Option<&str>) -> Vec<String> {
    vec![
        "run".to_string(),
        format!(
            "{module_path}@{}",
            effective_version(version.unwrap_or_default())
        ),
    ]
}

/// Normalize a version for `go run <module>@<version>`.
///
/// Dirty markers are stripped; empty and development versions fall back to
/// `latest`.
pub fn effective_version(version: &str) -> &str {
    let version = strip_dirty(version.trim());
    match version {
        "" | "dev" | "(devel)" | "unknown" => "latest",
        other => other,
    }
}

/// A directory is a forge checkout when its go.mod declares the forge module
/// and it carries the forge entrypoint.
pub fn is_forge_repo(dir: &Path) -> bool {
    if !dir.join(FORGE_ENTRYPOINT).is_file() {
        return false;
    }
    match std::fs::read_to_string(dir.join("go.mod")) {
        Ok(content) => content.lines().any(|line| {
            line.trim()
                .strip_prefix("module")
                .map(|rest| rest.trim() == FORGE_MODULE)
                .unwrap_or(false)
        }),
        Err(_) => false,
    }
}
