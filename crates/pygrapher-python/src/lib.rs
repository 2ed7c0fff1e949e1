//! Python support for pygrapher.
//!
//! This crate turns Python source trees into definition/reference graphs:
//! - Source file discovery
//! - A tree-sitter semantic analysis engine with import resolution
//! - Canonical path resolution for definitions and reference targets
//! - Per-file extraction and per-batch graph assembly

pub mod analyzer;
pub mod assemble;
pub mod builtins;
pub mod extract;
pub mod files;
pub mod imports;
pub mod naming;
pub mod resolve;
pub mod syntax;

// Error bridges into the unified GraphError
mod error_bridges;

pub use analyzer::{EngineError, TreeSitterEngine};
pub use assemble::{assemble, build_graph, module_definition};
pub use extract::{ExtractError, Extractor, FileGraph};
pub use files::{discover_python_files, DiscoveryError, DiscoveryOptions};
pub use resolve::{PathResolver, ResolutionRoot, ResolveError, ResolveMode, ResolvedPath};
