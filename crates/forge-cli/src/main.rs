//! forge-dispatch - drive Forge engines from the command line
//!
//! ## Commands
//!
//! - `resolve`: show the command an engine reference resolves to
//! - `build`: run a `builders` list in parallel and print the aggregate artifact
//! - `test`: run a `runners` list in parallel and print the aggregate report
//! - `validate`: validate a composite spec, recursing into every child engine
//!
//! Results are printed as JSON on stdout; logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, Level};

use forge_core::{
    BuildRequest, CompositeShape, CompositeSpec, ConfigValidateInput, Dispatcher, ParallelBuilder,
    ParallelTestRunner, RecursiveValidator, RunContext, TestRunRequest, PARALLEL_BUILDER,
    PARALLEL_TEST_RUNNER,
};
use forge_engine::{
    AliasTable, EngineLocator, EngineResolver, JsonMap, LocatorConfig, McpEngineCaller, Resolution,
};

#[derive(Parser)]
#[command(name = "forge-dispatch")]
#[command(author = "Forge Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dispatch Forge engines over MCP and aggregate their results", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true, env = "FORGE_LOG_JSON")]
    log_json: bool,

    /// Version internal engines run at (defaults to this binary's version)
    #[arg(long, global = true, env = "FORGE_VERSION")]
    forge_version: Option<String>,

    /// Full forge configuration (JSON), used for alias:// resolution
    #[arg(long, global = true)]
    forge_spec: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an engine reference without running it
    Resolve {
        /// Engine reference, e.g. go://go-build or alias://lint
        uri: String,
    },

    /// Build every task in parallel
    Build {
        /// JSON file holding a task list or a `{"builders": [...]}` spec
        #[arg(short, long)]
        tasks: PathBuf,

        /// Name of the aggregate artifact
        #[arg(short, long, default_value = "parallel-build")]
        name: String,

        /// Source directory passed to every builder
        #[arg(long)]
        src: Option<String>,

        /// Destination directory passed to every builder
        #[arg(long)]
        dest: Option<String>,
    },

    /// Run every test runner in parallel
    Test {
        /// Test stage
        #[arg(short, long)]
        stage: String,

        /// JSON file holding a task list or a `{"runners": [...]}` spec
        #[arg(short, long)]
        tasks: PathBuf,

        /// Runner whose coverage becomes the aggregate's coverage
        #[arg(long)]
        primary_coverage_runner: Option<String>,

        #[arg(long)]
        root_dir: Option<String>,

        #[arg(long)]
        tmp_dir: Option<String>,

        #[arg(long)]
        build_dir: Option<String>,
    },

    /// Validate a composite spec and all of its children
    Validate {
        /// Which composite the spec belongs to
        #[arg(short, long, value_enum)]
        kind: CompositeKind,

        /// JSON file holding the composite spec
        #[arg(short, long)]
        spec: PathBuf,

        /// Configuration path reported to child engines
        #[arg(long, default_value = "forge.yaml")]
        config_path: String,

        #[arg(long, default_value = "")]
        spec_type: String,

        #[arg(long, default_value = "")]
        spec_name: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompositeKind {
    Builders,
    Runners,
}

impl CompositeKind {
    fn shape(self) -> CompositeShape {
        match self {
            CompositeKind::Builders => PARALLEL_BUILDER,
            CompositeKind::Runners => PARALLEL_TEST_RUNNER,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    forge_core::telemetry::init_tracing(cli.log_json, level);

    let version = cli
        .forge_version
        .clone()
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
    let forge_spec = cli.forge_spec.as_deref().map(read_json).transpose()?;
    let aliases = match &forge_spec {
        Some(tree) => AliasTable::from_forge_spec(tree).context("Invalid engines table in forge spec")?,
        None => AliasTable::new(),
    };
    let resolver = EngineResolver::new(&version, EngineLocator::new(LocatorConfig::from_env()))
        .with_aliases(aliases);

    match cli.command {
        Commands::Resolve { uri } => cmd_resolve(&resolver, &uri),
        Commands::Build {
            tasks,
            name,
            src,
            dest,
        } => {
            let dispatcher = dispatcher(resolver, &version);
            cmd_build(dispatcher, &tasks, name, src, dest).await
        }
        Commands::Test {
            stage,
            tasks,
            primary_coverage_runner,
            root_dir,
            tmp_dir,
            build_dir,
        } => {
            let dispatcher = dispatcher(resolver, &version);
            let context = RunContext {
                root_dir,
                tmp_dir,
                build_dir,
            };
            cmd_test(dispatcher, &tasks, stage, primary_coverage_runner, context).await
        }
        Commands::Validate {
            kind,
            spec,
            config_path,
            spec_type,
            spec_name,
        } => {
            let dispatcher = dispatcher(resolver, &version);
            let input = ConfigValidateInput {
                spec: read_object(&spec)?,
                forge_spec,
                config_path,
                spec_type,
                spec_name,
            };
            cmd_validate(dispatcher, kind, input).await
        }
    }
}

fn dispatcher(resolver: EngineResolver, version: &str) -> Dispatcher {
    Dispatcher::new(resolver, Arc::new(McpEngineCaller::new(version)))
}

fn cmd_resolve(resolver: &EngineResolver, uri: &str) -> Result<()> {
    let out = match resolver.resolve(uri)? {
        Resolution::RemoteProcess(command) => json!({
            "uri": uri,
            "kind": "remote-process",
            "command": command,
        }),
        Resolution::DelegatedAlias { name } => match resolver.aliases().get(&name) {
            Some(_) => {
                let target = resolver.resolve_target(uri)?;
                json!({
                    "uri": uri,
                    "kind": "delegated-alias",
                    "alias": name,
                    "engine": target.engine,
                    "command": target.command,
                })
            }
            None => json!({
                "uri": uri,
                "kind": "delegated-alias",
                "alias": name,
            }),
        },
    };
    print_json(&out)
}

async fn cmd_build(
    dispatcher: Dispatcher,
    tasks: &Path,
    name: String,
    src: Option<String>,
    dest: Option<String>,
) -> Result<()> {
    let composite = load_composite(tasks, &PARALLEL_BUILDER)?;
    let request = BuildRequest::from_composite(name, &composite).with_dirs(src, dest);

    let output = ParallelBuilder::new(dispatcher).run(request).await?;
    print_json(&output.artifact)?;

    if let Some(err) = output.error {
        bail!(err);
    }
    info!(artifacts = output.artifact.artifact_count(), "build finished");
    Ok(())
}

async fn cmd_test(
    dispatcher: Dispatcher,
    tasks: &Path,
    stage: String,
    primary: Option<String>,
    context: RunContext,
) -> Result<()> {
    let composite = load_composite(tasks, &PARALLEL_TEST_RUNNER)?;
    let mut request = TestRunRequest::from_composite(stage, &composite).with_context(context);
    if primary.is_some() {
        request = request.with_primary(primary);
    }

    let report = ParallelTestRunner::new(dispatcher).run(request).await?;
    print_json(&report)?;

    if !report.status.is_passed() {
        bail!("stage {} failed: {}", report.stage, report.error_message);
    }
    Ok(())
}

async fn cmd_validate(dispatcher: Dispatcher, kind: CompositeKind, input: ConfigValidateInput) -> Result<()> {
    let output = RecursiveValidator::new(dispatcher, kind.shape())
        .validate(&input)
        .await;
    print_json(&output)?;

    if !output.valid {
        bail!(
            "{} error(s){}",
            output.errors.len(),
            if output.infra_error.is_empty() {
                String::new()
            } else {
                format!("; {}", output.infra_error)
            }
        );
    }
    Ok(())
}

/// Read a task file. A bare list is treated as the composite's child list.
fn load_composite(path: &Path, shape: &CompositeShape) -> Result<CompositeSpec> {
    let spec = match read_json(path)? {
        Value::Array(items) => {
            let mut spec = JsonMap::new();
            spec.insert(shape.list_field.to_string(), Value::Array(items));
            spec
        }
        Value::Object(map) => map,
        _ => bail!("{} must hold a JSON list or object", path.display()),
    };

    CompositeSpec::parse(&spec, shape).map_err(|errors| {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        anyhow::anyhow!("invalid task file {}: {joined}", path.display())
    })
}

fn read_object(path: &Path) -> Result<JsonMap> {
    match read_json(path)? {
        Value::Object(map) => Ok(map),
        _ => bail!("{} must hold a JSON object", path.display()),
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_cli_parses_test_command() {
        let cli = Cli::try_parse_from([
            "forge-dispatch",
            "test",
            "--stage",
            "unit",
            "--tasks",
            "runners.json",
            "--primary-coverage-runner",
            "unit",
        ])
        .unwrap();
        match cli.command {
            Commands::Test {
                stage,
                primary_coverage_runner,
                ..
            } => {
                assert_eq!(stage, "unit");
                assert_eq!(primary_coverage_runner.as_deref(), Some("unit"));
            }
            _ => panic!("expected test command"),
        }
    }

    #[test]
    fn test_cli_parses_validate_kind() {
        let cli = Cli::try_parse_from([
            "forge-dispatch",
            "validate",
            "--kind",
            "builders",
            "--spec",
            "spec.json",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Validate {
                kind: CompositeKind::Builders,
                ..
            }
        ));
    }

    #[test]
    fn test_load_composite_accepts_bare_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "tasks.json",
            r#"[{"name": "api", "engine": "go://go-build"}, {"engine": "go://go-gen"}]"#,
        );
        let composite = load_composite(&path, &PARALLEL_BUILDER).unwrap();
        assert_eq!(composite.children.len(), 2);
        assert_eq!(composite.children[1].engine_reference, "go://go-gen");
    }

    #[test]
    fn test_load_composite_reads_primary() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "runners.json",
            r#"{"runners": [{"name": "unit", "engine": "go://go-test"}], "primaryCoverageRunner": "unit"}"#,
        );
        let composite = load_composite(&path, &PARALLEL_TEST_RUNNER).unwrap();
        assert_eq!(composite.primary.as_deref(), Some("unit"));
    }

    #[test]
    fn test_load_composite_reports_structural_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "tasks.json", r#"{"runners": [{"name": "unit"}]}"#);
        let err = load_composite(&path, &PARALLEL_TEST_RUNNER).unwrap_err();
        assert!(err.to_string().contains("spec.runners[0].engine"));
    }

    #[test]
    fn test_resolve_prints_alias_target() {
        let resolver = EngineResolver::new("v0.3.1", EngineLocator::default())
            .with_aliases(AliasTable::new().with("lint", "go://go-lint"));
        cmd_resolve(&resolver, "alias://lint").unwrap();
        cmd_resolve(&resolver, "alias://unknown").unwrap();
        assert!(cmd_resolve(&resolver, "http://x").is_err());
    }
}
