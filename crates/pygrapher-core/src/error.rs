//! Error types and exit code constants for pygrapher.
//!
//! This module provides a unified error type (`GraphError`) that bridges
//! domain-specific errors from the subsystems (positions, configuration,
//! engine, batches) into one type the binary turns into an exit status.
//!
//! ## Exit Code Mapping
//!
//! - `2`: Invalid arguments (missing or empty target, bad config values)
//! - `3`: Resolution errors at the boundary (target directory not found)
//! - `4`: Batch failure (every batch of a run failed)
//! - `10`: Internal errors (I/O on output, serialization)
//!
//! Per-occurrence failures never reach this type: they are logged and the
//! occurrence is skipped.

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::text::PositionError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller.
    InvalidArguments = 2,
    /// Resolution errors (target directory or file not found).
    ResolutionError = 3,
    /// Every batch of the run failed.
    BatchFailed = 4,
    /// Internal errors (bugs, unexpected state, output I/O).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the command-line boundary.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// The target directory has no source files to analyze.
    #[error("target directory must not be empty")]
    EmptyTarget,

    /// File or directory not found.
    #[error("target directory not found: {path}")]
    FileNotFound { path: String },

    /// Every batch failed.
    #[error("all {batches} batches failed")]
    BatchFailed { batches: usize },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&GraphError> for OutputErrorCode {
    fn from(err: &GraphError) -> Self {
        match err {
            GraphError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            GraphError::EmptyTarget => OutputErrorCode::InvalidArguments,
            GraphError::FileNotFound { .. } => OutputErrorCode::ResolutionError,
            GraphError::BatchFailed { .. } => OutputErrorCode::BatchFailed,
            GraphError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<GraphError> for OutputErrorCode {
    fn from(err: GraphError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<ConfigError> for GraphError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidValue { .. } => GraphError::InvalidArguments {
                message: err.to_string(),
            },
            ConfigError::Parse { .. } => GraphError::InvalidArguments {
                message: err.to_string(),
            },
            ConfigError::Io(io_err) => GraphError::InternalError {
                message: format!("IO error reading config: {}", io_err),
            },
        }
    }
}

impl From<PositionError> for GraphError {
    fn from(err: PositionError) -> Self {
        GraphError::InternalError {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for GraphError {
    fn from(err: std::io::Error) -> Self {
        GraphError::InternalError {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::InternalError {
            message: format!("JSON error: {}", err),
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl GraphError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        GraphError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        GraphError::FileNotFound { path: path.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        GraphError::InternalError {
            message: message.into(),
        }
    }

    /// Get the exit code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
