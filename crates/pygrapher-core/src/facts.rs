//! Symbol and scope facts shared by engines and the graph layer.
//!
//! Scopes live in a flat [`ScopeArena`]: each scope stores the index of its
//! parent, so ancestor walks are plain index hops with no shared ownership.

use serde::{Deserialize, Serialize};

// ============================================================================
// Kinds
// ============================================================================

/// Kind of a named symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Module,
    Class,
    Function,
    /// A variable bound by an assignment-like statement.
    #[default]
    Statement,
    Param,
    Instance,
}

impl SymbolKind {
    /// Output kind string, as it appears in the `Kind` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Module => "module",
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Statement => "statement",
            SymbolKind::Param => "param",
            SymbolKind::Instance => "instance",
        }
    }

    /// Kinds whose engine full name omits their own final segment.
    pub fn is_local_binding(&self) -> bool {
        matches!(self, SymbolKind::Statement | SymbolKind::Param)
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a lexical scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Module,
    Class,
    Function,
    Lambda,
}

impl ScopeKind {
    /// Function-like scopes (functions and lambdas).
    pub fn is_function_like(&self) -> bool {
        matches!(self, ScopeKind::Function | ScopeKind::Lambda)
    }
}

// ============================================================================
// Scope Arena
// ============================================================================

/// Index of a scope inside one file's [`ScopeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl ScopeId {
    /// Create a new scope ID.
    pub fn new(id: u32) -> Self {
        ScopeId(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope_{}", self.0)
    }
}

/// One lexical scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub kind: ScopeKind,
    /// Bare name (`foo` for `def foo`, the proximal module name for modules).
    pub name: String,
    /// Dotted name in the engine's own scheme, rooted at the proximal module.
    pub full_name: String,
    pub parent: Option<ScopeId>,
}

/// Flat table of the scopes of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        ScopeArena::default()
    }

    /// Append a scope and return its id.
    pub fn push(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId::new(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    pub fn get(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.index())
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.get(id).and_then(|s| s.parent)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Iterate from `start` (inclusive) up to the root scope.
    pub fn ancestors(&self, start: ScopeId) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            next: self.get(start).map(|_| start),
        }
    }

    /// Nearest scope of `kind`, starting at `start` itself.
    pub fn nearest(&self, start: ScopeId, kind: ScopeKind) -> Option<ScopeId> {
        self.ancestors(start)
            .find(|id| self.get(*id).is_some_and(|s| s.kind == kind))
    }
}

/// Iterator over a scope and its ancestors.
pub struct Ancestors<'a> {
    arena: &'a ScopeArena,
    next: Option<ScopeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = ScopeId;

    fn next(&mut self) -> Option<ScopeId> {
        let current = self.next?;
        self.next = self.arena.parent(current);
        Some(current)
    }
}
