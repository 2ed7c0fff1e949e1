//! Command-line interface.
//!
//! With `--files`, the named files are extracted and assembled directly.
//! Otherwise the root is walked for Python sources and the result is fanned
//! out through the [`BatchCoordinator`](crate::batch::BatchCoordinator).

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use pygrapher_core::config::{CliOverrides, ConfigSource, Isolation, ResolvedConfig};
use pygrapher_core::error::GraphError;
use pygrapher_core::graph::Graph;
use pygrapher_core::output::OutputStyle;
use pygrapher_python::{build_graph, discover_python_files, DiscoveryOptions, ResolutionRoot};
use tracing::debug;

use crate::batch::{BatchCoordinator, BatchRunner, InProcessRunner, SubprocessRunner};

// ============================================================================
// CLI Structure
// ============================================================================

/// Build a definition/reference graph for a Python source tree.
///
/// The graph is written to stdout as one JSON document with sorted keys.
/// Diagnostics go to stderr.
#[derive(Parser, Debug, Clone)]
#[command(name = "pygrapher", version, about = "Python definition/reference graph builder")]
pub struct Cli {
    /// Root directory of the source tree.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Analyze exactly these files (relative to --dir) without batching.
    #[arg(long, num_args = 1..)]
    pub files: Vec<String>,

    /// Indent the JSON output.
    #[arg(long)]
    pub pretty: bool,

    /// Shorthand for --log-level debug.
    #[arg(long, short = 'v', conflicts_with = "quiet")]
    pub verbose: bool,

    /// Shorthand for --log-level error.
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Log level for tracing output.
    #[arg(long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Log line format.
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Analyze at most this many discovered files.
    #[arg(long)]
    pub maxfiles: Option<usize>,

    /// Files per batch.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Batches to run at once.
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Per-batch worker timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Batch isolation: `process` or `in-process`.
    #[arg(long, value_parser = parse_isolation)]
    pub isolation: Option<Isolation>,

    /// Extra import search root (repeatable).
    #[arg(long = "search-path")]
    pub search_paths: Vec<PathBuf>,

    /// Extra directory name to skip during discovery (repeatable).
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,
}

fn parse_isolation(s: &str) -> Result<Isolation, String> {
    s.parse().map_err(|e: pygrapher_core::config::ConfigError| e.to_string())
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }

    /// Spelling accepted by `--log-level`.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log line format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
    }
}

impl Cli {
    /// Level after applying --verbose / --quiet.
    pub fn effective_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else if self.quiet {
            LogLevel::Error
        } else {
            self.log_level
        }
    }

    pub fn output_style(&self) -> OutputStyle {
        if self.pretty {
            OutputStyle::Pretty
        } else {
            OutputStyle::Compact
        }
    }

    /// Configuration overrides carried by flags.
    pub fn to_overrides(&self) -> CliOverrides {
        CliOverrides {
            batch_size: self.batch_size,
            max_files: self.maxfiles,
            jobs: self.jobs,
            worker_timeout_secs: self.timeout,
            isolation: self.isolation,
            search_paths: self.search_paths.clone(),
            exclude: self.exclude.clone(),
        }
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Build the graph the command line asks for.
pub fn execute(cli: &Cli) -> Result<Graph, GraphError> {
    if !cli.dir.exists() {
        return Err(GraphError::file_not_found(cli.dir.display().to_string()));
    }
    if !cli.dir.is_dir() {
        return Err(GraphError::invalid_args(format!(
            "target is not a directory: {}",
            cli.dir.display()
        )));
    }
    let root = ResolutionRoot::new(&cli.dir)?;
    let config = ResolvedConfig::resolve(root.path(), &cli.to_overrides())?;
    let search_paths = config.search_path_list();

    if !cli.files.is_empty() {
        for file in &cli.files {
            root.to_root_relative(Path::new(file))
                .map_err(|e| GraphError::invalid_args(e.to_string()))?;
        }
        debug!("analyzing {} explicit files", cli.files.len());
        return Ok(build_graph(&root, &cli.files, &search_paths)?);
    }

    let options = DiscoveryOptions {
        exclude: config.exclude_list(),
        max_files: config.max_files.as_ref().map(|v| v.value),
    };
    let files = discover_python_files(root.path(), &options)?;
    if files.is_empty() {
        return Err(GraphError::EmptyTarget);
    }

    match config.isolation.value {
        Isolation::Process => {
            // Workers read pyproject.toml and the environment themselves
            let forwarded: Vec<PathBuf> = config
                .search_paths
                .iter()
                .filter(|v| v.source == ConfigSource::CliFlag)
                .map(|v| v.value.clone())
                .collect();
            let timeout = Duration::from_secs(config.worker_timeout_secs.value);
            let runner = SubprocessRunner::current_exe(timeout)?
                .with_logging(cli.effective_level(), cli.log_format)
                .with_search_paths(forwarded);
            coordinate(runner, root, &config, &files)
        }
        Isolation::InProcess => {
            coordinate(InProcessRunner::new(search_paths), root, &config, &files)
        }
    }
}

fn coordinate<R: BatchRunner>(
    runner: R,
    root: ResolutionRoot,
    config: &ResolvedConfig,
    files: &[String],
) -> Result<Graph, GraphError> {
    let coordinator =
        BatchCoordinator::new(runner, root, config.batch_size.value).with_jobs(config.jobs.value);
    let (graph, _stats) = coordinator.run(files)?;
    Ok(graph)
}
