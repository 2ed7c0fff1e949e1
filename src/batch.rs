//! Batch coordinator.
//!
//! Splits the discovered file list into fixed-size contiguous batches, runs
//! each batch as an isolated unit of work, and concatenates the per-batch
//! graphs in batch order. There is no cross-batch deduplication.
//!
//! Isolation is provided by a [`BatchRunner`]:
//! - [`SubprocessRunner`] re-invokes the current executable in file-list
//!   mode, one child process per batch, under a timeout watchdog.
//! - [`InProcessRunner`] builds a fresh engine per batch, so no module index
//!   survives from one batch to the next.
//!
//! Every runner receives the resolution root explicitly. The process working
//! directory is never changed, which is what makes `jobs > 1` safe.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use pygrapher_core::error::GraphError;
use pygrapher_core::graph::Graph;
use pygrapher_python::{build_graph, EngineError, ResolutionRoot};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use wait_timeout::ChildExt;

use crate::cli::{LogFormat, LogLevel};

// ============================================================================
// Error Types
// ============================================================================

/// Why a single batch produced no graph.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The worker process could not be started.
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] io::Error),

    /// The worker exceeded its time limit and was killed.
    #[error("worker timed out after {limit:?}")]
    Timeout { limit: Duration },

    /// The worker exited unsuccessfully.
    #[error("worker exited with {status}")]
    WorkerFailed { status: String },

    /// The worker printed something other than a graph document.
    #[error("worker output is not a graph: {0}")]
    Output(#[from] serde_json::Error),

    /// In-process engine setup failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// IO error talking to the worker.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for batch runs.
pub type BatchResult<T> = Result<T, BatchError>;

impl From<BatchError> for GraphError {
    fn from(err: BatchError) -> Self {
        GraphError::InternalError {
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Runners
// ============================================================================

/// Runs the extract/assemble pipeline over one batch.
pub trait BatchRunner: Sync {
    fn run_batch(&self, root: &ResolutionRoot, batch: &[String]) -> BatchResult<Graph>;
}

/// Runs each batch in this process with a fresh engine.
#[derive(Debug, Clone, Default)]
pub struct InProcessRunner {
    search_paths: Vec<PathBuf>,
}

impl InProcessRunner {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        InProcessRunner { search_paths }
    }
}

impl BatchRunner for InProcessRunner {
    fn run_batch(&self, root: &ResolutionRoot, batch: &[String]) -> BatchResult<Graph> {
        Ok(build_graph(root, batch, &self.search_paths)?)
    }
}

/// Runs each batch in a child process of `program`.
///
/// The child is invoked as `<program> --dir <root> ... --files <batch...>`.
/// Its stdout is parsed as a graph document; its stderr is inherited so
/// worker diagnostics reach the same stream as the parent's.
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    program: PathBuf,
    timeout: Duration,
    log_level: LogLevel,
    log_format: LogFormat,
    search_paths: Vec<PathBuf>,
}

impl SubprocessRunner {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        SubprocessRunner {
            program: program.into(),
            timeout,
            log_level: LogLevel::Warn,
            log_format: LogFormat::Text,
            search_paths: Vec::new(),
        }
    }

    /// A runner that re-invokes the running executable.
    pub fn current_exe(timeout: Duration) -> io::Result<Self> {
        Ok(SubprocessRunner::new(std::env::current_exe()?, timeout))
    }

    /// Forward the parent's logging configuration to workers.
    pub fn with_logging(mut self, level: LogLevel, format: LogFormat) -> Self {
        self.log_level = level;
        self.log_format = format;
        self
    }

    pub fn with_search_paths(mut self, search_paths: Vec<PathBuf>) -> Self {
        self.search_paths = search_paths;
        self
    }

    fn command(&self, root: &ResolutionRoot, batch: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--dir")
            .arg(root.path())
            .arg("--log-level")
            .arg(self.log_level.as_str())
            .arg("--log-format")
            .arg(self.log_format.as_str());
        for path in &self.search_paths {
            cmd.arg("--search-path").arg(path);
        }
        // --files takes every remaining argument
        cmd.arg("--files").args(batch);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }
}

impl BatchRunner for SubprocessRunner {
    fn run_batch(&self, root: &ResolutionRoot, batch: &[String]) -> BatchResult<Graph> {
        let start = Instant::now();
        let mut child = self.command(root, batch).spawn().map_err(BatchError::Spawn)?;

        // Drain stdout concurrently so a large graph cannot fill the pipe
        // and stall the worker before it exits.
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("worker stdout was not captured"))?;
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        // Wait with timeout using OS-level waiting (no polling)
        match child.wait_timeout(self.timeout)? {
            Some(status) => {
                let output = reader
                    .join()
                    .map_err(|_| io::Error::other("worker output reader panicked"))??;
                debug!(
                    "worker for {} files finished in {:?} with {}",
                    batch.len(),
                    start.elapsed(),
                    status
                );
                if !status.success() {
                    return Err(BatchError::WorkerFailed {
                        status: status.to_string(),
                    });
                }
                Ok(serde_json::from_slice(&output)?)
            }
            None => {
                let _ = child.kill();
                let _ = child.wait(); // Reap the zombie
                // Not joined: a grandchild may still hold the pipe open
                drop(reader);
                warn!(
                    "worker timed out after {:?} (limit: {:?})",
                    start.elapsed(),
                    self.timeout
                );
                Err(BatchError::Timeout {
                    limit: self.timeout,
                })
            }
        }
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Summary of one coordinated run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub files: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub defs: usize,
    pub refs: usize,
}

/// Partitions files into batches and concatenates the batch graphs.
pub struct BatchCoordinator<R> {
    runner: R,
    root: ResolutionRoot,
    batch_size: usize,
    jobs: usize,
}

impl<R: BatchRunner> BatchCoordinator<R> {
    /// `batch_size` below 1 is treated as 1.
    pub fn new(runner: R, root: ResolutionRoot, batch_size: usize) -> Self {
        BatchCoordinator {
            runner,
            root,
            batch_size: batch_size.max(1),
            jobs: 1,
        }
    }

    /// Run up to `jobs` batches at once.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run every batch and concatenate the results in batch order.
    ///
    /// A failed batch is logged and contributes nothing. Only when every
    /// batch fails is the run itself an error.
    pub fn run(&self, files: &[String]) -> Result<(Graph, BatchStats), GraphError> {
        let batches: Vec<&[String]> = files.chunks(self.batch_size).collect();
        let total = files.len();

        let results: Vec<BatchResult<Graph>> = if self.jobs > 1 && batches.len() > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
                .map_err(|e| GraphError::internal(format!("failed to start batch pool: {}", e)))?;
            // collect() on an indexed parallel iterator keeps input order
            pool.install(|| {
                batches
                    .par_iter()
                    .enumerate()
                    .map(|(index, batch)| self.run_one(index, batch, total))
                    .collect()
            })
        } else {
            batches
                .iter()
                .enumerate()
                .map(|(index, batch)| self.run_one(index, batch, total))
                .collect()
        };

        let mut graph = Graph::new();
        let mut stats = BatchStats {
            files: total,
            batches: batches.len(),
            ..BatchStats::default()
        };
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(batch_graph) => graph.extend(batch_graph),
                Err(err) => {
                    stats.failed_batches += 1;
                    error!("batch {} of {} failed: {}", index + 1, batches.len(), err);
                }
            }
        }
        stats.defs = graph.defs.len();
        stats.refs = graph.refs.len();

        info!(
            files = stats.files,
            batches = stats.batches,
            failed_batches = stats.failed_batches,
            defs = stats.defs,
            refs = stats.refs,
            "batch run complete"
        );
        if stats.batches > 0 && stats.failed_batches == stats.batches {
            return Err(GraphError::BatchFailed {
                batches: stats.batches,
            });
        }
        Ok((graph, stats))
    }

    fn run_one(&self, index: usize, batch: &[String], total: usize) -> BatchResult<Graph> {
        let first = index * self.batch_size;
        info!(
            "processing source files {} to {} of {}",
            first,
            first + batch.len(),
            total
        );
        self.runner.run_batch(&self.root, batch)
    }
}
