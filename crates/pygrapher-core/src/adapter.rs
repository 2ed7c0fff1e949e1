//! Analysis engine trait and the occurrence data it produces.
//!
//! An engine turns one source file into a [`FileAnalysis`]: the raw source
//! text, the file's scopes, and every name occurrence in source order. The
//! graph layer never parses source itself; it only consumes this contract.
//!
//! # Scope indices
//!
//! [`SymbolHandle::scope`] is an index into the [`ScopeArena`] of the file
//! being analyzed. It is `None` for symbols that live in other files or in
//! the builtin scope, since their scopes are not part of this file's arena.
//!
//! # Full names
//!
//! [`SymbolHandle::full_name`] follows the engine's own dotted scheme rooted
//! at the proximal module name (`b.foo` for `foo` in `a/b.py`). For
//! statement variables and parameters it names the enclosing scope and omits
//! the symbol's own segment. Turning this into a canonical graph path is the
//! resolver's job, not the engine's.

use std::path::{Path, PathBuf};

use crate::facts::{ScopeArena, ScopeId, SymbolKind};

/// Whether an occurrence binds a name or uses one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurrenceRole {
    Definition,
    Reference,
}

/// A symbol as seen by the engine: the definition itself for definition
/// occurrences, or the resolved target of a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolHandle {
    pub kind: SymbolKind,
    pub name: String,
    /// Engine full name. Empty when the engine could not name the symbol.
    pub full_name: String,
    /// Owning module file. Root-relative for the analyzed file, absolute
    /// for other files, `None` for builtins.
    pub module_path: Option<PathBuf>,
    /// Immediately enclosing scope, when it belongs to the analyzed file.
    pub scope: Option<ScopeId>,
    pub docstring: String,
    /// Target lives in the builtin scope with no file backing.
    pub builtin: bool,
    /// Receiver identifier for attribute bindings (`self` in `self.x = 1`).
    pub receiver: Option<String>,
}

impl SymbolHandle {
    /// Create a handle for a file-backed symbol.
    pub fn new(
        kind: SymbolKind,
        name: impl Into<String>,
        full_name: impl Into<String>,
        module_path: impl Into<PathBuf>,
    ) -> Self {
        SymbolHandle {
            kind,
            name: name.into(),
            full_name: full_name.into(),
            module_path: Some(module_path.into()),
            scope: None,
            docstring: String::new(),
            builtin: false,
            receiver: None,
        }
    }

    /// Create a handle for a builtin symbol.
    pub fn builtin(kind: SymbolKind, name: impl Into<String>) -> Self {
        let name = name.into();
        SymbolHandle {
            kind,
            full_name: name.clone(),
            name,
            module_path: None,
            scope: None,
            docstring: String::new(),
            builtin: true,
            receiver: None,
        }
    }

    pub fn with_scope(mut self, scope: ScopeId) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = docstring.into();
        self
    }

    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }
}

/// One name occurrence reported by an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameOccurrence {
    pub role: OccurrenceRole,
    /// Bare token text at the occurrence.
    pub name: String,
    /// 1-indexed line.
    pub line: u32,
    /// 0-indexed byte column.
    pub column: u32,
    /// Definition handle, or the reference target. `None` when the engine
    /// could not resolve a reference.
    pub symbol: Option<SymbolHandle>,
}

impl NameOccurrence {
    pub fn definition(name: impl Into<String>, line: u32, column: u32, symbol: SymbolHandle) -> Self {
        NameOccurrence {
            role: OccurrenceRole::Definition,
            name: name.into(),
            line,
            column,
            symbol: Some(symbol),
        }
    }

    pub fn reference(
        name: impl Into<String>,
        line: u32,
        column: u32,
        target: Option<SymbolHandle>,
    ) -> Self {
        NameOccurrence {
            role: OccurrenceRole::Reference,
            name: name.into(),
            line,
            column,
            symbol: target,
        }
    }

    pub fn is_definition(&self) -> bool {
        self.role == OccurrenceRole::Definition
    }
}

/// Analysis result for one file.
#[derive(Debug, Clone, Default)]
pub struct FileAnalysis {
    pub source: String,
    pub scopes: ScopeArena,
    /// Occurrences ordered by (line, column).
    pub occurrences: Vec<NameOccurrence>,
}

/// A semantic-analysis engine.
///
/// Engines may keep caches across calls; one engine instance is meant to
/// serve one batch of files and be dropped afterwards.
pub trait AnalysisEngine {
    /// The error type for this engine.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Analyze the file at `path` (relative to the engine's root, or
    /// absolute inside it).
    fn analyze(&mut self, path: &Path) -> Result<FileAnalysis, Self::Error>;
}
