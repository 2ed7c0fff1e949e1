//! Error bridge implementations for Python-support errors.
//!
//! `impl From<X> for GraphError` conversions live here rather than in
//! `pygrapher-core` because the source types belong to this crate.

use pygrapher_core::error::GraphError;

use crate::analyzer::EngineError;
use crate::files::DiscoveryError;

// ============================================================================
// Bridge: DiscoveryError -> GraphError
// ============================================================================

impl From<DiscoveryError> for GraphError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::NotFound { path } => GraphError::FileNotFound { path },
            DiscoveryError::NotADirectory { path } => GraphError::InvalidArguments {
                message: format!("target is not a directory: {}", path),
            },
            DiscoveryError::Io(io_err) => GraphError::InternalError {
                message: format!("IO error during discovery: {}", io_err),
            },
        }
    }
}

// ============================================================================
// Bridge: EngineError -> GraphError
// ============================================================================

impl From<EngineError> for GraphError {
    fn from(err: EngineError) -> Self {
        GraphError::InternalError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pygrapher_core::error::OutputErrorCode;

    #[test]
    fn missing_root_is_a_resolution_error() {
        let err: GraphError = DiscoveryError::NotFound {
            path: "nowhere".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "target directory not found: nowhere");
        assert_eq!(err.error_code(), OutputErrorCode::ResolutionError);
    }

    #[test]
    fn non_directory_root_is_invalid_arguments() {
        let err: GraphError = DiscoveryError::NotADirectory {
            path: "file.py".to_string(),
        }
        .into();
        assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
    }

    #[test]
    fn engine_errors_are_internal() {
        let err: GraphError = EngineError::Language {
            message: "version mismatch".to_string(),
        }
        .into();
        assert_eq!(err.error_code(), OutputErrorCode::InternalError);
        assert!(err.to_string().contains("version mismatch"));
    }
}
