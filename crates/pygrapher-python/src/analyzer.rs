//! tree-sitter backed semantic analysis engine for Python.
//!
//! Each file is walked twice:
//!
//! 1. **Binding pass**: builds the scope arena, records every binding site
//!    as a definition occurrence, and resolves import statements (emitting
//!    their names as references to the imported modules and symbols).
//! 2. **Reference pass**: resolves every remaining identifier with Python's
//!    scoping rules (class scopes are invisible to nested functions), plus
//!    attribute accesses whose object is a module, a class from this file,
//!    or `self` inside a method.
//!
//! Occurrences are returned sorted by position.
//!
//! # Full names
//!
//! Full names are rooted at the proximal module name: `def foo` in
//! `pkg/mod.py` has full name `mod.foo`. Statement variables and parameters
//! carry the full name of the scope they are bound in, so `x = 1` at module
//! level in the same file has full name `mod`.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use pygrapher_core::adapter::{AnalysisEngine, FileAnalysis, NameOccurrence, SymbolHandle};
use pygrapher_core::facts::{Scope, ScopeArena, ScopeId, ScopeKind, SymbolKind};
use thiserror::Error;
use tracing::debug;
use tree_sitter::{Node, Parser};

use crate::builtins::lookup_builtin;
use crate::imports::{ModuleLocation, ModuleResolver};
use crate::naming::proximal_module_name;
use crate::resolve::{ResolutionRoot, ResolveError, SELF_RECEIVER};
use crate::syntax::{
    body_docstring, dotted_parts, field_children, is_identifier, named_children, node_text,
    position, python_parser, relative_import_parts,
};

/// Scope name used for lambdas.
const LAMBDA_NAME: &str = "<lambda>";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that prevent a file from being analyzed at all.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The source file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The parser produced no tree.
    #[error("failed to parse {path}")]
    Parse { path: String },

    /// The Python grammar could not be loaded.
    #[error("failed to load Python grammar: {message}")]
    Language { message: String },

    /// The file does not lie under the analysis root.
    #[error(transparent)]
    Path(#[from] ResolveError),
}

// ============================================================================
// Engine
// ============================================================================

/// Semantic analysis engine over tree-sitter-python.
///
/// The module index built for import resolution lives as long as the
/// engine. Create one engine per batch.
pub struct TreeSitterEngine {
    root: ResolutionRoot,
    parser: Parser,
    modules: ModuleResolver,
}

impl TreeSitterEngine {
    pub fn new(root: ResolutionRoot, search_paths: Vec<PathBuf>) -> Result<Self, EngineError> {
        let modules = ModuleResolver::new(root.path().to_path_buf(), search_paths)?;
        Ok(TreeSitterEngine {
            root,
            parser: python_parser()?,
            modules,
        })
    }

    pub fn root(&self) -> &ResolutionRoot {
        &self.root
    }

    /// Number of imported modules indexed so far.
    pub fn cached_modules(&self) -> usize {
        self.modules.cached_modules()
    }
}

impl AnalysisEngine for TreeSitterEngine {
    type Error = EngineError;

    fn analyze(&mut self, path: &Path) -> Result<FileAnalysis, EngineError> {
        let rel = self.root.to_root_relative(path)?;
        let abs = self.root.join(&rel);
        let source = std::fs::read_to_string(&abs).map_err(|source| EngineError::Io {
            path: rel.clone(),
            source,
        })?;
        let tree = self
            .parser
            .parse(&source, None)
            .ok_or_else(|| EngineError::Parse { path: rel.clone() })?;
        if tree.root_node().has_error() {
            debug!("{} has syntax errors; analysis is best-effort", rel);
        }

        let walker = FileWalker::new(source.as_bytes(), PathBuf::from(&rel), abs, &mut self.modules);
        let (scopes, occurrences) = walker.run(tree.root_node());
        Ok(FileAnalysis {
            source,
            scopes,
            occurrences,
        })
    }
}

// ============================================================================
// File Walker
// ============================================================================

/// What a name is bound to inside one file.
#[derive(Debug, Clone)]
struct Binding {
    /// `None` for imports that could not be resolved.
    target: Option<SymbolHandle>,
    /// Scope opened by the bound class, for member lookups.
    class_scope: Option<ScopeId>,
}

impl Binding {
    fn to(target: Option<SymbolHandle>) -> Self {
        Binding {
            target,
            class_scope: None,
        }
    }
}

#[derive(Debug, Default)]
struct Frame {
    bindings: HashMap<String, Binding>,
    globals: HashSet<String>,
    nonlocals: HashSet<String>,
    /// `self.<attr>` bindings made in methods (class frames only).
    instance_attrs: HashMap<String, Binding>,
}

/// Statically known value of an expression, for attribute lookups.
#[derive(Debug, Clone)]
enum Value {
    Module(ModuleLocation),
    Class(ScopeId),
    Instance(ScopeId),
}

struct FileWalker<'a> {
    bytes: &'a [u8],
    /// Root-relative path reported on every handle of this file.
    module_path: PathBuf,
    /// Absolute path, for relative imports.
    abs_path: PathBuf,
    modules: &'a mut ModuleResolver,
    scopes: ScopeArena,
    /// Parallel to `scopes`.
    frames: Vec<Frame>,
    /// Scope opened by each function, class or lambda node.
    node_scopes: HashMap<usize, ScopeId>,
    /// Start bytes of tokens already reported as definitions.
    defined_at: HashSet<usize>,
    occurrences: Vec<NameOccurrence>,
}

impl<'a> FileWalker<'a> {
    fn new(
        bytes: &'a [u8],
        module_path: PathBuf,
        abs_path: PathBuf,
        modules: &'a mut ModuleResolver,
    ) -> Self {
        FileWalker {
            bytes,
            module_path,
            abs_path,
            modules,
            scopes: ScopeArena::new(),
            frames: Vec::new(),
            node_scopes: HashMap::new(),
            defined_at: HashSet::new(),
            occurrences: Vec::new(),
        }
    }

    fn run(mut self, root: Node<'_>) -> (ScopeArena, Vec<NameOccurrence>) {
        let proximal = proximal_module_name(&self.module_path);
        let module = self.push_scope(ScopeKind::Module, &proximal, proximal.clone(), None);
        self.bind_children(root, module);
        self.refer(root, module);
        self.occurrences.sort_by_key(|o| (o.line, o.column));
        (self.scopes, self.occurrences)
    }

    // ------------------------------------------------------------------------
    // Scopes and bindings
    // ------------------------------------------------------------------------

    fn push_scope(&mut self, kind: ScopeKind, name: &str, full_name: String, parent: Option<ScopeId>) -> ScopeId {
        let id = self.scopes.push(Scope {
            kind,
            name: name.to_string(),
            full_name,
            parent,
        });
        self.frames.push(Frame::default());
        id
    }

    fn frame(&self, id: ScopeId) -> &Frame {
        &self.frames[id.index()]
    }

    fn frame_mut(&mut self, id: ScopeId) -> &mut Frame {
        &mut self.frames[id.index()]
    }

    fn full_name_of(&self, scope: ScopeId) -> String {
        self.scopes
            .get(scope)
            .map(|s| s.full_name.clone())
            .unwrap_or_default()
    }

    fn scope_kind(&self, scope: ScopeId) -> Option<ScopeKind> {
        self.scopes.get(scope).map(|s| s.kind)
    }

    fn text(&self, node: Node<'_>) -> &'a str {
        node_text(node, self.bytes)
    }

    fn handle(&self, kind: SymbolKind, name: &str, full_name: String, scope: ScopeId) -> SymbolHandle {
        SymbolHandle::new(kind, name, full_name, self.module_path.clone()).with_scope(scope)
    }

    fn bind_name(&mut self, scope: ScopeId, name: &str, binding: Binding) {
        self.frame_mut(scope)
            .bindings
            .entry(name.to_string())
            .or_insert(binding);
    }

    /// Scope a variable assigned in `scope` is actually bound in.
    fn binding_scope(&self, name: &str, scope: ScopeId) -> ScopeId {
        let frame = self.frame(scope);
        if frame.globals.contains(name) {
            return ScopeId::new(0);
        }
        if frame.nonlocals.contains(name) {
            let enclosing = self
                .scopes
                .ancestors(scope)
                .skip(1)
                .find(|id| self.scope_kind(*id).is_some_and(|k| k.is_function_like()));
            if let Some(enclosing) = enclosing {
                return enclosing;
            }
        }
        scope
    }

    /// Class whose instance `self` refers to inside `scope`.
    fn method_class(&self, scope: ScopeId) -> Option<ScopeId> {
        for id in self.scopes.ancestors(scope) {
            let s = self.scopes.get(id)?;
            match s.kind {
                ScopeKind::Function | ScopeKind::Lambda => {
                    if let Some(parent) = s.parent {
                        if self.scope_kind(parent) == Some(ScopeKind::Class) {
                            return Some(parent);
                        }
                    }
                }
                ScopeKind::Class | ScopeKind::Module => return None,
            }
        }
        None
    }

    fn lookup(&self, name: &str, scope: ScopeId) -> Option<Binding> {
        let frame = self.frame(scope);
        if frame.globals.contains(name) {
            return self
                .frame(ScopeId::new(0))
                .bindings
                .get(name)
                .cloned()
                .or_else(|| lookup_builtin(name).map(|h| Binding::to(Some(h))));
        }
        if let Some(binding) = frame.bindings.get(name) {
            return Some(binding.clone());
        }
        for id in self.scopes.ancestors(scope).skip(1) {
            if self.scope_kind(id) == Some(ScopeKind::Class) {
                continue;
            }
            if let Some(binding) = self.frame(id).bindings.get(name) {
                return Some(binding.clone());
            }
        }
        lookup_builtin(name).map(|h| Binding::to(Some(h)))
    }

    // ------------------------------------------------------------------------
    // Occurrences
    // ------------------------------------------------------------------------

    fn record_definition(&mut self, token: Node<'_>, handle: SymbolHandle) {
        let (line, column) = position(token);
        self.defined_at.insert(token.start_byte());
        self.occurrences
            .push(NameOccurrence::definition(self.text(token), line, column, handle));
    }

    fn record_reference(&mut self, token: Node<'_>, target: Option<SymbolHandle>) {
        let (line, column) = position(token);
        self.occurrences
            .push(NameOccurrence::reference(self.text(token), line, column, target));
    }

    fn define_variable(&mut self, token: Node<'_>, kind: SymbolKind, scope: ScopeId) {
        let name = self.text(token);
        let target_scope = if kind == SymbolKind::Param {
            scope
        } else {
            self.binding_scope(name, scope)
        };
        let handle = self.handle(kind, name, self.full_name_of(target_scope), target_scope);
        self.record_definition(token, handle.clone());
        self.bind_name(target_scope, name, Binding::to(Some(handle)));
    }

    // ------------------------------------------------------------------------
    // Binding pass
    // ------------------------------------------------------------------------

    fn bind_children(&mut self, node: Node<'_>, scope: ScopeId) {
        for child in named_children(node) {
            self.bind(child, scope);
        }
    }

    fn bind(&mut self, node: Node<'_>, scope: ScopeId) {
        match node.kind() {
            "function_definition" => self.bind_function(node, scope),
            "class_definition" => self.bind_class(node, scope),
            "lambda" => self.bind_lambda(node, scope),
            "assignment" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.bind_target(left, scope);
                }
                if let Some(ty) = node.child_by_field_name("type") {
                    self.bind(ty, scope);
                }
                if let Some(right) = node.child_by_field_name("right") {
                    self.bind(right, scope);
                }
            }
            "augmented_assignment" => {
                if let Some(right) = node.child_by_field_name("right") {
                    self.bind(right, scope);
                }
            }
            "for_statement" | "for_in_clause" => {
                let left = node.child_by_field_name("left");
                if let Some(left) = left {
                    self.bind_target(left, scope);
                }
                for child in named_children(node) {
                    if Some(child.id()) != left.map(|l| l.id()) {
                        self.bind(child, scope);
                    }
                }
            }
            "named_expression" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.bind_target(name, scope);
                }
                if let Some(value) = node.child_by_field_name("value") {
                    self.bind(value, scope);
                }
            }
            "as_pattern" => {
                let alias = node.child_by_field_name("alias");
                for child in named_children(node) {
                    if Some(child.id()) == alias.map(|a| a.id()) {
                        self.bind_target(child, scope);
                    } else {
                        self.bind(child, scope);
                    }
                }
            }
            "except_clause" => self.bind_except(node, scope),
            "global_statement" | "nonlocal_statement" => {
                let names: Vec<String> = named_children(node)
                    .into_iter()
                    .filter(|n| is_identifier(*n))
                    .map(|n| self.text(n).to_string())
                    .collect();
                let frame = self.frame_mut(scope);
                if node.kind() == "global_statement" {
                    frame.globals.extend(names);
                } else {
                    frame.nonlocals.extend(names);
                }
            }
            "import_statement" => self.bind_import(node, scope),
            "import_from_statement" => self.bind_import_from(node, scope),
            "future_import_statement" => {}
            _ => self.bind_children(node, scope),
        }
    }

    fn bind_target(&mut self, node: Node<'_>, scope: ScopeId) {
        if is_identifier(node) {
            self.define_variable(node, SymbolKind::Statement, scope);
            return;
        }
        match node.kind() {
            "pattern_list" | "tuple_pattern" | "list_pattern" | "tuple" | "list"
            | "expression_list" | "parenthesized_expression" | "as_pattern_target"
            | "list_splat_pattern" | "list_splat" => {
                for child in named_children(node) {
                    self.bind_target(child, scope);
                }
            }
            "attribute" => self.bind_attribute_target(node, scope),
            _ => self.bind(node, scope),
        }
    }

    fn bind_attribute_target(&mut self, node: Node<'_>, scope: ScopeId) {
        let (Some(object), Some(attr)) = (
            node.child_by_field_name("object"),
            node.child_by_field_name("attribute"),
        ) else {
            return;
        };
        if is_identifier(object) && self.text(object) == SELF_RECEIVER {
            if let Some(class) = self.method_class(scope) {
                let name = self.text(attr);
                let handle = self
                    .handle(SymbolKind::Statement, name, self.full_name_of(scope), scope)
                    .with_receiver(SELF_RECEIVER);
                self.record_definition(attr, handle.clone());
                self.frame_mut(class)
                    .instance_attrs
                    .entry(name.to_string())
                    .or_insert(Binding::to(Some(handle)));
                return;
            }
        }
        self.bind(object, scope);
    }

    fn bind_except(&mut self, node: Node<'_>, scope: ScopeId) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        let mut after_as = false;
        for child in children {
            if child.kind() == "as" {
                after_as = true;
                continue;
            }
            if !child.is_named() {
                continue;
            }
            if after_as {
                self.bind_target(child, scope);
                after_as = false;
            } else {
                self.bind(child, scope);
            }
        }
    }

    fn bind_function(&mut self, node: Node<'_>, scope: ScopeId) {
        let Some(name_node) = node.child_by_field_name("name") else {
            self.bind_children(node, scope);
            return;
        };
        let name = self.text(name_node);
        let full_name = join_name(&self.full_name_of(scope), name);
        let docstring = body_docstring(node.child_by_field_name("body"), self.bytes);
        let handle = self
            .handle(SymbolKind::Function, name, full_name.clone(), scope)
            .with_docstring(docstring);
        self.record_definition(name_node, handle.clone());
        self.bind_name(scope, name, Binding::to(Some(handle)));

        let inner = self.push_scope(ScopeKind::Function, name, full_name, Some(scope));
        self.node_scopes.insert(node.id(), inner);
        if let Some(params) = node.child_by_field_name("parameters") {
            self.bind_parameters(params, scope, inner);
        }
        if let Some(ret) = node.child_by_field_name("return_type") {
            self.bind(ret, scope);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.bind_children(body, inner);
        }
    }

    fn bind_class(&mut self, node: Node<'_>, scope: ScopeId) {
        let Some(name_node) = node.child_by_field_name("name") else {
            self.bind_children(node, scope);
            return;
        };
        let name = self.text(name_node);
        let full_name = join_name(&self.full_name_of(scope), name);
        if let Some(bases) = node.child_by_field_name("superclasses") {
            self.bind(bases, scope);
        }

        let inner = self.push_scope(ScopeKind::Class, name, full_name.clone(), Some(scope));
        self.node_scopes.insert(node.id(), inner);
        let docstring = body_docstring(node.child_by_field_name("body"), self.bytes);
        let handle = self
            .handle(SymbolKind::Class, name, full_name, scope)
            .with_docstring(docstring);
        self.record_definition(name_node, handle.clone());
        self.bind_name(
            scope,
            name,
            Binding {
                target: Some(handle),
                class_scope: Some(inner),
            },
        );

        if let Some(body) = node.child_by_field_name("body") {
            self.bind_children(body, inner);
        }
    }

    fn bind_lambda(&mut self, node: Node<'_>, scope: ScopeId) {
        let full_name = join_name(&self.full_name_of(scope), LAMBDA_NAME);
        let inner = self.push_scope(ScopeKind::Lambda, LAMBDA_NAME, full_name, Some(scope));
        self.node_scopes.insert(node.id(), inner);
        if let Some(params) = node.child_by_field_name("parameters") {
            self.bind_parameters(params, scope, inner);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.bind(body, inner);
        }
    }

    /// Parameters bind in `inner`; defaults and annotations evaluate in `outer`.
    fn bind_parameters(&mut self, params: Node<'_>, outer: ScopeId, inner: ScopeId) {
        for param in named_children(params) {
            if is_identifier(param) {
                self.define_variable(param, SymbolKind::Param, inner);
                continue;
            }
            match param.kind() {
                "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                    for child in named_children(param) {
                        match child.kind() {
                            _ if is_identifier(child) => {
                                self.define_variable(child, SymbolKind::Param, inner)
                            }
                            "list_splat_pattern" | "dictionary_splat_pattern" => {
                                for ident in named_children(child).into_iter().filter(|n| is_identifier(*n)) {
                                    self.define_variable(ident, SymbolKind::Param, inner);
                                }
                            }
                            _ => self.bind(child, outer),
                        }
                    }
                }
                "default_parameter" | "typed_default_parameter" => {
                    if let Some(name) = param.child_by_field_name("name") {
                        if is_identifier(name) {
                            self.define_variable(name, SymbolKind::Param, inner);
                        }
                    }
                    for field in ["type", "value"] {
                        if let Some(child) = param.child_by_field_name(field) {
                            self.bind(child, outer);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Resolve and report each component of a dotted module name.
    fn bind_module_chain(&mut self, parts: &[Node<'_>], level: usize) -> Vec<Option<ModuleLocation>> {
        let mut locations = Vec::with_capacity(parts.len());
        let mut names: Vec<String> = Vec::with_capacity(parts.len());
        for part in parts {
            let name = self.text(*part);
            names.push(name.to_string());
            let location = self.modules.find(&self.abs_path, level, &names);
            self.record_reference(*part, location.as_ref().map(|l| l.handle(name)));
            locations.push(location);
        }
        locations
    }

    fn bind_import(&mut self, stmt: Node<'_>, scope: ScopeId) {
        for name in field_children(stmt, "name") {
            match name.kind() {
                "dotted_name" => {
                    let parts = dotted_parts(name);
                    let locations = self.bind_module_chain(&parts, 0);
                    if let (Some(first), Some(location)) = (parts.first(), locations.first()) {
                        let bound = self.text(*first);
                        let target = location.as_ref().map(|l| l.handle(bound));
                        self.bind_name(scope, bound, Binding::to(target));
                    }
                }
                "aliased_import" => {
                    let (Some(module), Some(alias)) = (
                        name.child_by_field_name("name"),
                        name.child_by_field_name("alias"),
                    ) else {
                        continue;
                    };
                    let parts = dotted_parts(module);
                    let locations = self.bind_module_chain(&parts, 0);
                    let last_name = parts.last().map(|p| self.text(*p)).unwrap_or_default();
                    let target = locations
                        .last()
                        .cloned()
                        .flatten()
                        .map(|l| l.handle(last_name));
                    self.record_reference(alias, target.clone());
                    self.bind_name(scope, self.text(alias), Binding::to(target));
                }
                _ => {}
            }
        }
    }

    fn bind_import_from(&mut self, stmt: Node<'_>, scope: ScopeId) {
        let Some(module_node) = stmt.child_by_field_name("module_name") else {
            return;
        };
        let (level, parts) = if module_node.kind() == "relative_import" {
            relative_import_parts(module_node, self.bytes)
        } else {
            (0, dotted_parts(module_node))
        };
        let locations = self.bind_module_chain(&parts, level);
        let module_names: Vec<String> = parts.iter().map(|p| self.text(*p).to_string()).collect();
        let module = if parts.is_empty() {
            self.modules.find(&self.abs_path, level, &[])
        } else {
            locations.last().cloned().flatten()
        };

        let mut cursor = stmt.walk();
        let wildcard = stmt
            .named_children(&mut cursor)
            .any(|c| c.kind() == "wildcard_import");
        if wildcard {
            if let Some(location) = &module {
                for name in self.modules.star_names(location) {
                    let target = self.modules.member(location, &name);
                    self.bind_name(scope, &name, Binding::to(target));
                }
            }
        }

        for name in field_children(stmt, "name") {
            let (imported, alias) = if name.kind() == "aliased_import" {
                (name.child_by_field_name("name"), name.child_by_field_name("alias"))
            } else {
                (Some(name), None)
            };
            let Some(imported) = imported else {
                continue;
            };
            let imported_name = self.text(imported);
            let target = module
                .as_ref()
                .and_then(|location| self.modules.member(location, imported_name))
                .or_else(|| {
                    // Namespace packages have no initializer to hold the member
                    let mut submodule = module_names.clone();
                    submodule.push(imported_name.to_string());
                    self.modules
                        .find(&self.abs_path, level, &submodule)
                        .map(|l| l.handle(imported_name))
                });
            self.record_reference(imported, target.clone());
            let bound = match alias {
                Some(alias) => {
                    self.record_reference(alias, target.clone());
                    self.text(alias)
                }
                None => imported_name,
            };
            self.bind_name(scope, bound, Binding::to(target));
        }
    }

    // ------------------------------------------------------------------------
    // Reference pass
    // ------------------------------------------------------------------------

    fn refer(&mut self, node: Node<'_>, scope: ScopeId) {
        match node.kind() {
            "function_definition" | "class_definition" | "lambda" => {
                let inner = self.node_scopes.get(&node.id()).copied().unwrap_or(scope);
                let body = node.child_by_field_name("body");
                for child in named_children(node) {
                    if Some(child.id()) == body.map(|b| b.id()) {
                        self.refer(child, inner);
                    } else {
                        self.refer(child, scope);
                    }
                }
            }
            "import_statement" | "import_from_statement" | "future_import_statement"
            | "global_statement" | "nonlocal_statement" => {}
            "keyword_argument" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.refer(value, scope);
                }
            }
            "attribute" => {
                self.attribute_value(node, scope);
            }
            _ if is_identifier(node) => {
                self.identifier_value(node, scope);
            }
            _ => {
                for child in named_children(node) {
                    self.refer(child, scope);
                }
            }
        }
    }

    fn expr_value(&mut self, node: Node<'_>, scope: ScopeId) -> Option<Value> {
        if is_identifier(node) {
            return self.identifier_value(node, scope);
        }
        if node.kind() == "attribute" {
            return self.attribute_value(node, scope);
        }
        self.refer(node, scope);
        None
    }

    fn identifier_value(&mut self, node: Node<'_>, scope: ScopeId) -> Option<Value> {
        if self.defined_at.contains(&node.start_byte()) {
            return None;
        }
        let name = self.text(node);
        let binding = self.lookup(name, scope);
        let target = binding.as_ref().and_then(|b| b.target.clone());
        self.record_reference(node, target.clone());

        if name == SELF_RECEIVER && target.as_ref().is_some_and(|t| t.kind == SymbolKind::Param) {
            if let Some(class) = self.method_class(scope) {
                return Some(Value::Instance(class));
            }
        }
        binding.and_then(|b| value_of(&b))
    }

    fn attribute_value(&mut self, node: Node<'_>, scope: ScopeId) -> Option<Value> {
        let (Some(object), Some(attr)) = (
            node.child_by_field_name("object"),
            node.child_by_field_name("attribute"),
        ) else {
            for child in named_children(node) {
                self.refer(child, scope);
            }
            return None;
        };
        let object_value = self.expr_value(object, scope);
        if self.defined_at.contains(&attr.start_byte()) {
            return None;
        }
        let name = self.text(attr);
        let binding = match object_value? {
            Value::Module(location) => self
                .modules
                .member(&location, name)
                .map(|h| Binding::to(Some(h))),
            Value::Class(class) => self.frame(class).bindings.get(name).cloned(),
            Value::Instance(class) => {
                let frame = self.frame(class);
                frame
                    .bindings
                    .get(name)
                    .or_else(|| frame.instance_attrs.get(name))
                    .cloned()
            }
        }?;
        let target = binding.target.clone()?;
        self.record_reference(attr, Some(target));
        value_of(&binding)
    }
}

fn value_of(binding: &Binding) -> Option<Value> {
    if let Some(class) = binding.class_scope {
        return Some(Value::Class(class));
    }
    let target = binding.target.as_ref()?;
    match (&target.kind, &target.module_path) {
        (SymbolKind::Module, Some(path)) => Some(Value::Module(ModuleLocation::from_file(path.clone()))),
        _ => None,
    }
}

fn join_name(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Project {
        dir: TempDir,
    }

    impl Project {
        fn new() -> Self {
            Project {
                dir: TempDir::new().unwrap(),
            }
        }

        fn file(self, rel: &str, body: &str) -> Self {
            let path = self.dir.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, body).unwrap();
            self
        }

        fn analyze(&self, rel: &str) -> FileAnalysis {
            let root = ResolutionRoot::new(self.dir.path()).unwrap();
            let mut engine = TreeSitterEngine::new(root, vec![]).unwrap();
            engine.analyze(Path::new(rel)).unwrap()
        }
    }

    fn defs(analysis: &FileAnalysis) -> Vec<(String, SymbolKind, String)> {
        analysis
            .occurrences
            .iter()
            .filter(|o| o.is_definition())
            .map(|o| {
                let h = o.symbol.as_ref().unwrap();
                (o.name.clone(), h.kind, h.full_name.clone())
            })
            .collect()
    }

    fn refs<'a>(analysis: &'a FileAnalysis, name: &str) -> Vec<&'a NameOccurrence> {
        analysis
            .occurrences
            .iter()
            .filter(|o| !o.is_definition() && o.name == name)
            .collect()
    }

    mod bindings {
        use super::*;

        #[test]
        fn function_and_params() {
            let p = Project::new().file("m.py", "def foo(a, b=1, *args, c: int = 2, **kw):\n    pass\n");
            let a = p.analyze("m.py");
            assert_eq!(
                defs(&a),
                vec![
                    ("foo".to_string(), SymbolKind::Function, "m.foo".to_string()),
                    ("a".to_string(), SymbolKind::Param, "m.foo".to_string()),
                    ("b".to_string(), SymbolKind::Param, "m.foo".to_string()),
                    ("args".to_string(), SymbolKind::Param, "m.foo".to_string()),
                    ("c".to_string(), SymbolKind::Param, "m.foo".to_string()),
                    ("kw".to_string(), SymbolKind::Param, "m.foo".to_string()),
                ]
            );
        }

        #[test]
        fn class_method_and_self_attribute() {
            let p = Project::new().file(
                "m.py",
                "class C:\n    def __init__(self):\n        self.x = 1\n",
            );
            let a = p.analyze("m.py");
            let x = a
                .occurrences
                .iter()
                .find(|o| o.is_definition() && o.name == "x")
                .unwrap();
            let h = x.symbol.as_ref().unwrap();
            assert_eq!(h.kind, SymbolKind::Statement);
            assert_eq!(h.full_name, "m.C.__init__");
            assert_eq!(h.receiver.as_deref(), Some(SELF_RECEIVER));
            assert_eq!((x.line, x.column), (3, 13));
            let scope = a.scopes.get(h.scope.unwrap()).unwrap();
            assert_eq!(scope.kind, ScopeKind::Function);
        }

        #[test]
        fn assignments_loops_and_with() {
            let source = "x = y = 0\nfor i, j in []:\n    pass\nwith open('f') as fh:\n    pass\nif (n := 3):\n    pass\n";
            let a = Project::new().file("m.py", source).analyze("m.py");
            let names: Vec<String> = defs(&a).into_iter().map(|(n, _, _)| n).collect();
            assert_eq!(names, vec!["x", "y", "i", "j", "fh", "n"]);
            assert!(defs(&a).iter().all(|(_, k, f)| *k == SymbolKind::Statement && f == "m"));
        }

        #[test]
        fn global_rebinds_at_module_scope() {
            let source = "def f():\n    global counter\n    counter = 1\n";
            let a = Project::new().file("m.py", source).analyze("m.py");
            let counter = defs(&a).into_iter().find(|(n, _, _)| n == "counter").unwrap();
            assert_eq!(counter.2, "m");
        }

        #[test]
        fn function_docstring_on_handle() {
            let source = "def f():\n    \"\"\"Say hi.\"\"\"\n";
            let a = Project::new().file("m.py", source).analyze("m.py");
            let f = a.occurrences.iter().find(|o| o.name == "f").unwrap();
            assert_eq!(f.symbol.as_ref().unwrap().docstring, "Say hi.");
        }

        #[test]
        fn package_init_full_names_use_package_name() {
            let a = Project::new()
                .file("pkg/__init__.py", "def bar():\n    pass\n")
                .analyze("pkg/__init__.py");
            assert_eq!(defs(&a)[0].2, "pkg.bar");
            assert_eq!(
                a.occurrences[0].symbol.as_ref().unwrap().module_path,
                Some(PathBuf::from("pkg/__init__.py"))
            );
        }
    }

    mod references {
        use super::*;

        #[test]
        fn local_and_builtin_names() {
            let source = "def foo():\n    return len([])\n\nfoo()\n";
            let a = Project::new().file("m.py", source).analyze("m.py");
            let foo = refs(&a, "foo");
            assert_eq!(foo.len(), 1);
            assert_eq!((foo[0].line, foo[0].column), (4, 0));
            assert_eq!(foo[0].symbol.as_ref().unwrap().full_name, "m.foo");
            let len = refs(&a, "len");
            assert!(len[0].symbol.as_ref().unwrap().builtin);
        }

        #[test]
        fn unresolved_names_have_no_target() {
            let a = Project::new().file("m.py", "print(undefined_thing)\n").analyze("m.py");
            let r = refs(&a, "undefined_thing");
            assert_eq!(r.len(), 1);
            assert!(r[0].symbol.is_none());
        }

        #[test]
        fn class_scope_is_invisible_to_methods() {
            let source = "x = 1\nclass C:\n    x = 2\n    def m(self):\n        return x\n";
            let a = Project::new().file("m.py", source).analyze("m.py");
            let x = refs(&a, "x");
            assert_eq!(x.len(), 1);
            let target = x[0].symbol.as_ref().unwrap();
            // module-level x, not the class attribute
            assert_eq!(target.full_name, "m");
            assert_eq!(a.scopes.get(target.scope.unwrap()).unwrap().kind, ScopeKind::Module);
        }

        #[test]
        fn self_attribute_reference_targets_instance_binding() {
            let source = "class C:\n    def __init__(self):\n        self.x = 1\n    def get(self):\n        return self.x\n";
            let a = Project::new().file("m.py", source).analyze("m.py");
            let x = refs(&a, "x");
            assert_eq!(x.len(), 1);
            let target = x[0].symbol.as_ref().unwrap();
            assert_eq!(target.receiver.as_deref(), Some(SELF_RECEIVER));
            assert_eq!(target.full_name, "m.C.__init__");
        }

        #[test]
        fn method_call_through_self() {
            let source = "class C:\n    def run(self):\n        self.step()\n    def step(self):\n        pass\n";
            let a = Project::new().file("m.py", source).analyze("m.py");
            let step = refs(&a, "step");
            assert_eq!(step.len(), 1);
            assert_eq!(step[0].symbol.as_ref().unwrap().full_name, "m.C.step");
        }

        #[test]
        fn keyword_argument_names_are_not_references() {
            let source = "def f(a):\n    pass\nf(a=1)\n";
            let a = Project::new().file("m.py", source).analyze("m.py");
            assert!(refs(&a, "a").is_empty());
        }

        #[test]
        fn default_values_resolve_in_enclosing_scope() {
            let source = "D = 1\ndef f(a=D):\n    return a\n";
            let a = Project::new().file("m.py", source).analyze("m.py");
            let d = refs(&a, "D");
            assert_eq!(d.len(), 1);
            assert_eq!(d[0].symbol.as_ref().unwrap().full_name, "m");
            let a_ref = refs(&a, "a");
            assert_eq!(a_ref[0].symbol.as_ref().unwrap().kind, SymbolKind::Param);
        }

        #[test]
        fn occurrences_are_position_ordered() {
            let source = "import os\ndef f(x):\n    return x + 1\n";
            let a = Project::new().file("m.py", source).analyze("m.py");
            let positions: Vec<(u32, u32)> = a.occurrences.iter().map(|o| (o.line, o.column)).collect();
            let mut sorted = positions.clone();
            sorted.sort();
            assert_eq!(positions, sorted);
        }
    }

    mod imports {
        use super::*;

        #[test]
        fn import_components_reference_modules() {
            let p = Project::new()
                .file("a/__init__.py", "")
                .file("a/b.py", "def g():\n    pass\n")
                .file("main.py", "import a.b\na.b.g()\n");
            let a = p.analyze("main.py");
            let b_refs = refs(&a, "b");
            assert_eq!(b_refs.len(), 2);
            for r in &b_refs {
                let h = r.symbol.as_ref().unwrap();
                assert_eq!(h.kind, SymbolKind::Module);
                assert_eq!(h.full_name, "b");
            }
            let g = refs(&a, "g");
            assert_eq!(g.len(), 1);
            assert_eq!(g[0].symbol.as_ref().unwrap().full_name, "b.g");
        }

        #[test]
        fn from_import_binds_imported_definition() {
            let p = Project::new()
                .file("util.py", "def helper():\n    pass\n")
                .file("main.py", "from util import helper as h\nh()\n");
            let a = p.analyze("main.py");
            let h = refs(&a, "h");
            assert_eq!(h.len(), 2);
            assert!(h
                .iter()
                .all(|r| r.symbol.as_ref().unwrap().full_name == "util.helper"));
            let module_path = h[0].symbol.as_ref().unwrap().module_path.clone().unwrap();
            assert!(module_path.is_absolute());
        }

        #[test]
        fn relative_import_from_package() {
            let p = Project::new()
                .file("pkg/__init__.py", "")
                .file("pkg/core.py", "VALUE = 1\n")
                .file("pkg/use.py", "from .core import VALUE\nprint(VALUE)\n");
            let a = p.analyze("pkg/use.py");
            let v = refs(&a, "VALUE");
            assert_eq!(v.len(), 2);
            let h = v[1].symbol.as_ref().unwrap();
            assert_eq!(h.kind, SymbolKind::Statement);
            assert_eq!(h.full_name, "core");
        }

        #[test]
        fn unresolvable_import_is_reported_unresolved() {
            let a = Project::new()
                .file("main.py", "import nowhere\nnowhere.call()\n")
                .analyze("main.py");
            let n = refs(&a, "nowhere");
            assert_eq!(n.len(), 2);
            assert!(n.iter().all(|r| r.symbol.is_none()));
            assert!(refs(&a, "call").is_empty());
        }

        #[test]
        fn star_import_binds_public_names() {
            let p = Project::new()
                .file("lib.py", "def api():\n    pass\n")
                .file("main.py", "from lib import *\napi()\n");
            let a = p.analyze("main.py");
            let api = refs(&a, "api");
            assert_eq!(api.len(), 1);
            assert_eq!(api[0].symbol.as_ref().unwrap().full_name, "lib.api");
        }
    }

    #[test]
    fn missing_file_is_an_engine_error() {
        let p = Project::new();
        let root = ResolutionRoot::new(p.dir.path()).unwrap();
        let mut engine = TreeSitterEngine::new(root, vec![]).unwrap();
        let err = engine.analyze(Path::new("absent.py")).unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }

    #[test]
    fn file_outside_root_is_an_engine_error() {
        let p = Project::new();
        let root = ResolutionRoot::new(p.dir.path()).unwrap();
        let mut engine = TreeSitterEngine::new(root, vec![]).unwrap();
        let err = engine.analyze(Path::new("../escape.py")).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Path(ResolveError::OutsideRoot { .. })
        ));
    }
}
