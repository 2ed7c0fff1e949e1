//! Layered run configuration.
//!
//! Precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (`PYGRAPHER_*`)
//! 3. Project config (`[tool.pygrapher]` in `<root>/pyproject.toml`)
//! 4. Defaults
//!
//! Scalar values are replaced by higher layers. List values (search paths,
//! exclusions) accumulate, lower layers first.
//!
//! An active virtualenv (`VIRTUAL_ENV`) contributes its base interpreter's
//! standard library and its own `site-packages` to the search paths, at the
//! environment layer.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Default number of files per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default per-batch worker timeout in seconds.
pub const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 300;

pub const ENV_BATCH_SIZE: &str = "PYGRAPHER_BATCH_SIZE";
pub const ENV_MAX_FILES: &str = "PYGRAPHER_MAX_FILES";
pub const ENV_JOBS: &str = "PYGRAPHER_JOBS";
pub const ENV_WORKER_TIMEOUT: &str = "PYGRAPHER_WORKER_TIMEOUT";
pub const ENV_ISOLATION: &str = "PYGRAPHER_ISOLATION";
pub const ENV_SEARCH_PATH: &str = "PYGRAPHER_SEARCH_PATH";
/// Set by `activate` scripts to the root of the active virtualenv.
pub const ENV_VIRTUAL_ENV: &str = "VIRTUAL_ENV";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is present but not acceptable.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// `pyproject.toml` exists but is not valid TOML for our section.
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Configuration Sources
// ============================================================================

/// Configuration value source (for precedence tracking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    /// Built-in default value.
    Default = 0,
    /// From pyproject.toml [tool.pygrapher].
    ProjectConfig = 1,
    /// From environment variable.
    EnvVar = 2,
    /// From CLI flag (highest precedence).
    CliFlag = 3,
}

/// A configuration value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue<T> {
    /// The actual value.
    pub value: T,
    /// Where the value came from.
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    /// Create a new config value with the given source.
    pub fn new(value: T, source: ConfigSource) -> Self {
        ConfigValue { value, source }
    }

    /// Merge with another value, preferring higher precedence.
    pub fn merge(self, other: Self) -> Self {
        if other.source >= self.source {
            other
        } else {
            self
        }
    }
}

// ============================================================================
// Isolation
// ============================================================================

/// How each batch is isolated from the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Isolation {
    /// Each batch runs in a fresh child process.
    #[default]
    Process,
    /// Each batch runs in this process with a fresh engine.
    InProcess,
}

impl Isolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Isolation::Process => "process",
            Isolation::InProcess => "in-process",
        }
    }
}

impl FromStr for Isolation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "process" => Ok(Isolation::Process),
            "in-process" => Ok(Isolation::InProcess),
            other => Err(ConfigError::InvalidValue {
                key: "isolation".to_string(),
                reason: format!("expected 'process' or 'in-process', got '{}'", other),
            }),
        }
    }
}

// ============================================================================
// Project Config
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct PyProject {
    #[serde(default)]
    tool: Option<ToolTable>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolTable {
    #[serde(default)]
    pygrapher: Option<ProjectSection>,
}

/// The `[tool.pygrapher]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ProjectSection {
    batch_size: Option<usize>,
    max_files: Option<usize>,
    jobs: Option<usize>,
    worker_timeout_secs: Option<u64>,
    isolation: Option<Isolation>,
    #[serde(default)]
    search_paths: Vec<PathBuf>,
    #[serde(default)]
    exclude: Vec<String>,
}

// ============================================================================
// Configuration Resolution
// ============================================================================

/// Resolved configuration with precedence information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub batch_size: ConfigValue<usize>,
    pub max_files: Option<ConfigValue<usize>>,
    pub jobs: ConfigValue<usize>,
    pub worker_timeout_secs: ConfigValue<u64>,
    pub isolation: ConfigValue<Isolation>,
    /// Extra import search roots (for example a virtualenv site-packages).
    pub search_paths: Vec<ConfigValue<PathBuf>>,
    /// Extra directory names skipped during discovery.
    pub exclude: Vec<ConfigValue<String>>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ResolvedConfig {
            batch_size: ConfigValue::new(DEFAULT_BATCH_SIZE, ConfigSource::Default),
            max_files: None,
            jobs: ConfigValue::new(1, ConfigSource::Default),
            worker_timeout_secs: ConfigValue::new(
                DEFAULT_WORKER_TIMEOUT_SECS,
                ConfigSource::Default,
            ),
            isolation: ConfigValue::new(Isolation::default(), ConfigSource::Default),
            search_paths: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl ResolvedConfig {
    /// Resolve configuration from all sources, reading the process environment.
    pub fn resolve(root: &Path, cli_overrides: &CliOverrides) -> Result<Self> {
        Self::resolve_with_env(root, cli_overrides, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with an explicit environment lookup.
    pub fn resolve_with_env(
        root: &Path,
        cli_overrides: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = ResolvedConfig::default();

        let pyproject_path = root.join("pyproject.toml");
        if pyproject_path.is_file() {
            debug!("reading {}", pyproject_path.display());
            config.apply_project_config(root, &pyproject_path)?;
        }

        config.apply_env_vars(env)?;
        config.apply_cli_overrides(cli_overrides);
        config.validate()?;

        debug!(
            "config: batch_size={} ({:?}) jobs={} ({:?}) timeout={}s ({:?}) isolation={} ({:?}) search_paths={}",
            config.batch_size.value,
            config.batch_size.source,
            config.jobs.value,
            config.jobs.source,
            config.worker_timeout_secs.value,
            config.worker_timeout_secs.source,
            config.isolation.value.as_str(),
            config.isolation.source,
            config.search_paths.len()
        );
        Ok(config)
    }

    /// Search paths in precedence-accumulated order.
    pub fn search_path_list(&self) -> Vec<PathBuf> {
        self.search_paths.iter().map(|v| v.value.clone()).collect()
    }

    /// Exclusions in precedence-accumulated order.
    pub fn exclude_list(&self) -> Vec<String> {
        self.exclude.iter().map(|v| v.value.clone()).collect()
    }

    fn apply_project_config(&mut self, root: &Path, pyproject_path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(pyproject_path)?;
        let parsed: PyProject = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: pyproject_path.to_path_buf(),
            message: e.to_string(),
        })?;
        let Some(section) = parsed.tool.and_then(|t| t.pygrapher) else {
            return Ok(());
        };

        let src = ConfigSource::ProjectConfig;
        if let Some(n) = section.batch_size {
            self.batch_size = self.batch_size.clone().merge(ConfigValue::new(n, src));
        }
        if let Some(n) = section.max_files {
            self.max_files = Some(ConfigValue::new(n, src));
        }
        if let Some(n) = section.jobs {
            self.jobs = self.jobs.clone().merge(ConfigValue::new(n, src));
        }
        if let Some(secs) = section.worker_timeout_secs {
            self.worker_timeout_secs = self
                .worker_timeout_secs
                .clone()
                .merge(ConfigValue::new(secs, src));
        }
        if let Some(isolation) = section.isolation {
            self.isolation = self.isolation.clone().merge(ConfigValue::new(isolation, src));
        }
        for path in section.search_paths {
            // Relative entries are anchored at the project root
            let path = if path.is_absolute() {
                path
            } else {
                root.join(path)
            };
            self.search_paths.push(ConfigValue::new(path, src));
        }
        for dir in section.exclude {
            self.exclude.push(ConfigValue::new(dir, src));
        }
        Ok(())
    }

    fn apply_env_vars(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        let src = ConfigSource::EnvVar;
        if let Some(raw) = env(ENV_BATCH_SIZE) {
            let n = parse_number(ENV_BATCH_SIZE, &raw)?;
            self.batch_size = ConfigValue::new(n, src);
        }
        if let Some(raw) = env(ENV_MAX_FILES) {
            let n = parse_number(ENV_MAX_FILES, &raw)?;
            self.max_files = Some(ConfigValue::new(n, src));
        }
        if let Some(raw) = env(ENV_JOBS) {
            let n = parse_number(ENV_JOBS, &raw)?;
            self.jobs = ConfigValue::new(n, src);
        }
        if let Some(raw) = env(ENV_WORKER_TIMEOUT) {
            let secs = parse_number(ENV_WORKER_TIMEOUT, &raw)?;
            self.worker_timeout_secs = ConfigValue::new(secs, src);
        }
        if let Some(raw) = env(ENV_ISOLATION) {
            self.isolation = ConfigValue::new(raw.parse()?, src);
        }
        if let Some(raw) = env(ENV_SEARCH_PATH) {
            for path in std::env::split_paths(&raw) {
                if !path.as_os_str().is_empty() {
                    self.search_paths.push(ConfigValue::new(path, src));
                }
            }
        }
        if let Some(venv) = env(ENV_VIRTUAL_ENV).filter(|v| !v.is_empty()) {
            for path in virtualenv_search_paths(Path::new(&venv)) {
                debug!("search path {} from {}", path.display(), ENV_VIRTUAL_ENV);
                self.search_paths.push(ConfigValue::new(path, src));
            }
        }
        Ok(())
    }

    fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        let src = ConfigSource::CliFlag;
        if let Some(n) = overrides.batch_size {
            self.batch_size = ConfigValue::new(n, src);
        }
        if let Some(n) = overrides.max_files {
            self.max_files = Some(ConfigValue::new(n, src));
        }
        if let Some(n) = overrides.jobs {
            self.jobs = ConfigValue::new(n, src);
        }
        if let Some(secs) = overrides.worker_timeout_secs {
            self.worker_timeout_secs = ConfigValue::new(secs, src);
        }
        if let Some(isolation) = overrides.isolation {
            self.isolation = ConfigValue::new(isolation, src);
        }
        for path in &overrides.search_paths {
            self.search_paths.push(ConfigValue::new(path.clone(), src));
        }
        for dir in &overrides.exclude {
            self.exclude.push(ConfigValue::new(dir.clone(), src));
        }
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size.value == 0 {
            return Err(ConfigError::InvalidValue {
                key: "batch-size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.jobs.value == 0 {
            return Err(ConfigError::InvalidValue {
                key: "jobs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Import roots of a virtualenv: the base interpreter's standard library
/// (located through `pyvenv.cfg`), then the env's `site-packages`.
///
/// Only directories that exist are returned.
pub fn virtualenv_search_paths(venv: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    let cfg = std::fs::read_to_string(venv.join("pyvenv.cfg")).unwrap_or_default();
    let setting = |key: &str| {
        cfg.lines().find_map(|line| {
            let (k, v) = line.split_once('=')?;
            (k.trim() == key).then(|| v.trim().to_string())
        })
    };
    let version = setting("version_info").or_else(|| setting("version"));
    if let (Some(home), Some(version)) = (setting("home"), version) {
        let short: Vec<&str> = version.split('.').take(2).collect();
        let base = Path::new(&home).parent().map(Path::to_path_buf);
        if let (Some(base), [major, minor]) = (base, short.as_slice()) {
            let stdlib = base.join("lib").join(format!("python{}.{}", major, minor));
            if stdlib.is_dir() {
                paths.push(stdlib);
            }
        }
    }

    let mut site_dirs: Vec<PathBuf> = std::fs::read_dir(venv.join("lib"))
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("python"))
        .map(|entry| entry.path().join("site-packages"))
        .filter(|dir| dir.is_dir())
        .collect();
    site_dirs.sort();
    paths.extend(site_dirs);

    // Windows layout
    let windows = venv.join("Lib").join("site-packages");
    if windows.is_dir() && !paths.contains(&windows) {
        paths.push(windows);
    }
    paths
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("expected a non-negative integer, got '{}'", raw),
    })
}

/// CLI configuration overrides.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// --batch-size flag.
    pub batch_size: Option<usize>,
    /// --maxfiles flag.
    pub max_files: Option<usize>,
    /// --jobs flag.
    pub jobs: Option<usize>,
    /// --timeout flag.
    pub worker_timeout_secs: Option<u64>,
    /// --isolation flag.
    pub isolation: Option<Isolation>,
    /// --search-path flags.
    pub search_paths: Vec<PathBuf>,
    /// --exclude flags.
    pub exclude: Vec<String>,
}

// ============================================================================
// Tests
// ============================================================================
