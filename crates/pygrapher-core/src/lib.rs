//! Core infrastructure for pygrapher.
//!
//! This crate provides the language-agnostic layer:
//! - Graph records (`Definition`, `Reference`, `Graph`) and their JSON emission
//! - Position conversion from line:column to byte offsets
//! - The analysis engine contract consumed by language support crates
//! - Layered configuration and the unified error type
//!
//! Language-specific path resolution and extraction live in
//! `pygrapher-python`.

pub mod adapter;
pub mod config;
pub mod error;
pub mod facts;
pub mod graph;
pub mod output;
pub mod text;

pub use adapter::{AnalysisEngine, FileAnalysis, NameOccurrence, OccurrenceRole, SymbolHandle};
pub use error::{GraphError, OutputErrorCode};
pub use facts::{Scope, ScopeArena, ScopeId, ScopeKind, SymbolKind};
pub use graph::{Definition, Graph, Reference};
pub use text::{PositionConverter, PositionError};
