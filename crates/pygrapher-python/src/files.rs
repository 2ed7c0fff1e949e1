//! Python source file discovery.
//!
//! Walks a root directory and returns the root-relative, `/`-separated paths
//! of every `.py` file, sorted so that batch boundaries are reproducible.

use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::naming::normalize_path;

/// Directory names that never hold project sources.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &["__pycache__", "node_modules", "venv", "target"];

// ============================================================================
// Error Types
// ============================================================================

/// Error type for file discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Root directory not found.
    #[error("target directory not found: {path}")]
    NotFound { path: String },

    /// Root exists but is not a directory.
    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for discovery.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

// ============================================================================
// Options
// ============================================================================

/// Discovery options.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Extra directory names to skip, on top of [`DEFAULT_EXCLUDED_DIRS`]
    /// and hidden directories. A trailing `/` is ignored.
    pub exclude: Vec<String>,
    /// Keep only the first `n` files of the sorted list.
    pub max_files: Option<usize>,
}

impl DiscoveryOptions {
    fn is_excluded(&self, name: &str) -> bool {
        name.starts_with('.')
            || DEFAULT_EXCLUDED_DIRS.contains(&name)
            || self
                .exclude
                .iter()
                .any(|ex| ex.trim_end_matches('/') == name)
    }
}

// ============================================================================
// File Collection
// ============================================================================

/// Collect root-relative paths of the Python files under `root`.
pub fn discover_python_files(root: &Path, options: &DiscoveryOptions) -> DiscoveryResult<Vec<String>> {
    if !root.exists() {
        return Err(DiscoveryError::NotFound {
            path: root.display().to_string(),
        });
    }
    if !root.is_dir() {
        return Err(DiscoveryError::NotADirectory {
            path: root.display().to_string(),
        });
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| keep_entry(entry, options));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable entry under {}: {}", root.display(), err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "py") {
            continue;
        }
        let Ok(rel_path) = path.strip_prefix(root) else {
            continue;
        };
        files.push(normalize_path(rel_path));
    }

    files.sort();
    if let Some(max) = options.max_files {
        files.truncate(max);
    }
    debug!("discovered {} python files under {}", files.len(), root.display());
    Ok(files)
}

fn keep_entry(entry: &DirEntry, options: &DiscoveryOptions) -> bool {
    // The root itself is always walked, even if its own name is hidden
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    !options.is_excluded(&entry.file_name().to_string_lossy())
}

// ============================================================================
// Tests
// ============================================================================
