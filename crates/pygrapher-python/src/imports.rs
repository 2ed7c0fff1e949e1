//! Import resolution and the per-engine module index.
//!
//! Modules are located under the analysis root first, then under each
//! configured search path. A located module is parsed once and reduced to
//! its top-level bindings; the index is kept for the lifetime of the
//! [`ModuleResolver`] and never evicted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use pygrapher_core::adapter::SymbolHandle;
use pygrapher_core::facts::SymbolKind;
use tracing::debug;
use tree_sitter::{Node, Parser};

use crate::analyzer::EngineError;
use crate::naming::{proximal_module_name, PACKAGE_INIT};
use crate::syntax::{
    body_docstring, dotted_parts, field_children, is_identifier, named_children, node_text,
    python_parser, relative_import_parts,
};

/// Maximum number of re-export hops followed for one name.
pub const MAX_REEXPORT_DEPTH: usize = 8;

// ============================================================================
// Module Locations
// ============================================================================

/// A module file found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleLocation {
    /// Absolute path of the `.py` file (`__init__.py` for packages).
    pub file: PathBuf,
    pub is_package: bool,
}

impl ModuleLocation {
    pub fn from_file(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let is_package = file.file_name().is_some_and(|n| n == PACKAGE_INIT);
        ModuleLocation { file, is_package }
    }

    /// Directory holding the package's submodules.
    pub fn package_dir(&self) -> Option<&Path> {
        if self.is_package {
            self.file.parent()
        } else {
            None
        }
    }

    /// Reference target handle for this module, reported under `name`.
    pub fn handle(&self, name: &str) -> SymbolHandle {
        SymbolHandle::new(
            SymbolKind::Module,
            name,
            proximal_module_name(&self.file),
            self.file.clone(),
        )
    }
}

// ============================================================================
// Module Index
// ============================================================================

#[derive(Debug, Clone)]
enum IndexEntry {
    /// Defined in the module itself.
    Symbol { kind: SymbolKind, docstring: String },
    /// Bound by `import a.b` (`a`) or `import a.b as c` (`c`).
    Module { parts: Vec<String> },
    /// Bound by `from <module> import <name>`.
    From {
        level: usize,
        module: Vec<String>,
        name: String,
    },
}

/// Top-level bindings of one module, first binding of each name wins.
#[derive(Debug, Default)]
pub struct ModuleIndex {
    entries: HashMap<String, IndexEntry>,
    order: Vec<String>,
}

impl ModuleIndex {
    /// Build the index from a parsed module.
    pub fn build(root: Node<'_>, bytes: &[u8]) -> Self {
        let mut index = ModuleIndex::default();
        index.collect_block(root, bytes);
        index
    }

    /// Names bound at module level, in source order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn insert(&mut self, name: &str, entry: IndexEntry) {
        if name.is_empty() || self.entries.contains_key(name) {
            return;
        }
        self.order.push(name.to_string());
        self.entries.insert(name.to_string(), entry);
    }

    fn collect_block(&mut self, node: Node<'_>, bytes: &[u8]) {
        for child in named_children(node) {
            match child.kind() {
                "function_definition" | "class_definition" => self.collect_definition(child, bytes),
                "decorated_definition" => {
                    if let Some(def) = child.child_by_field_name("definition") {
                        self.collect_definition(def, bytes);
                    }
                }
                "expression_statement" => {
                    for expr in named_children(child) {
                        self.collect_assignment(expr, bytes);
                    }
                }
                "import_statement" => self.collect_import(child, bytes),
                "import_from_statement" => self.collect_import_from(child, bytes),
                // Conditional and guarded top-level code still binds module names
                "if_statement" | "elif_clause" | "else_clause" | "try_statement"
                | "except_clause" | "finally_clause" | "with_statement" | "for_statement"
                | "while_statement" | "block" => self.collect_block(child, bytes),
                _ => {}
            }
        }
    }

    fn collect_definition(&mut self, def: Node<'_>, bytes: &[u8]) {
        let kind = if def.kind() == "class_definition" {
            SymbolKind::Class
        } else {
            SymbolKind::Function
        };
        if let Some(name) = def.child_by_field_name("name") {
            let docstring = body_docstring(def.child_by_field_name("body"), bytes);
            self.insert(node_text(name, bytes), IndexEntry::Symbol { kind, docstring });
        }
    }

    fn collect_assignment(&mut self, expr: Node<'_>, bytes: &[u8]) {
        if expr.kind() != "assignment" {
            return;
        }
        if let Some(left) = expr.child_by_field_name("left") {
            self.collect_targets(left, bytes);
        }
        if let Some(right) = expr.child_by_field_name("right") {
            self.collect_assignment(right, bytes);
        }
    }

    fn collect_targets(&mut self, target: Node<'_>, bytes: &[u8]) {
        if is_identifier(target) {
            self.insert(
                node_text(target, bytes),
                IndexEntry::Symbol {
                    kind: SymbolKind::Statement,
                    docstring: String::new(),
                },
            );
            return;
        }
        if matches!(
            target.kind(),
            "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern"
        ) {
            for child in named_children(target) {
                self.collect_targets(child, bytes);
            }
        }
    }

    fn collect_import(&mut self, stmt: Node<'_>, bytes: &[u8]) {
        for name in field_children(stmt, "name") {
            match name.kind() {
                "dotted_name" => {
                    let parts = texts(&dotted_parts(name), bytes);
                    if let Some(first) = parts.first().cloned() {
                        self.insert(&first, IndexEntry::Module { parts: vec![first.clone()] });
                    }
                }
                "aliased_import" => {
                    let (Some(module), Some(alias)) = (
                        name.child_by_field_name("name"),
                        name.child_by_field_name("alias"),
                    ) else {
                        continue;
                    };
                    let parts = texts(&dotted_parts(module), bytes);
                    self.insert(node_text(alias, bytes), IndexEntry::Module { parts });
                }
                _ => {}
            }
        }
    }

    fn collect_import_from(&mut self, stmt: Node<'_>, bytes: &[u8]) {
        let Some(module_node) = stmt.child_by_field_name("module_name") else {
            return;
        };
        let (level, module) = if module_node.kind() == "relative_import" {
            let (level, parts) = relative_import_parts(module_node, bytes);
            (level, texts(&parts, bytes))
        } else {
            (0, texts(&dotted_parts(module_node), bytes))
        };
        for name in field_children(stmt, "name") {
            let (imported, bound) = match name.kind() {
                "aliased_import" => (
                    name.child_by_field_name("name"),
                    name.child_by_field_name("alias"),
                ),
                _ => (Some(name), Some(name)),
            };
            let (Some(imported), Some(bound)) = (imported, bound) else {
                continue;
            };
            let entry = IndexEntry::From {
                level,
                module: module.clone(),
                name: node_text(imported, bytes).to_string(),
            };
            self.insert(node_text(bound, bytes), entry);
        }
    }
}

fn texts(nodes: &[Node<'_>], bytes: &[u8]) -> Vec<String> {
    nodes
        .iter()
        .map(|n| node_text(*n, bytes).to_string())
        .collect()
}

// ============================================================================
// Module Resolver
// ============================================================================

/// Locates modules and answers member lookups against their indexes.
pub struct ModuleResolver {
    root: PathBuf,
    search_paths: Vec<PathBuf>,
    parser: Parser,
    cache: HashMap<PathBuf, Option<Rc<ModuleIndex>>>,
}

impl ModuleResolver {
    /// Create a resolver rooted at the absolute directory `root`.
    pub fn new(root: impl Into<PathBuf>, search_paths: Vec<PathBuf>) -> Result<Self, EngineError> {
        Ok(ModuleResolver {
            root: root.into(),
            search_paths,
            parser: python_parser()?,
            cache: HashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of module files indexed so far (including failed loads).
    pub fn cached_modules(&self) -> usize {
        self.cache.len()
    }

    /// Locate an absolute module name (`a.b.c` as parts).
    pub fn find_absolute(&self, parts: &[String]) -> Option<ModuleLocation> {
        std::iter::once(&self.root)
            .chain(self.search_paths.iter())
            .find_map(|base| find_in(base, parts))
    }

    /// Locate a module relative to the file `from_file`.
    ///
    /// `level` 1 is the file's own package directory. Empty `parts` names
    /// the package at that level itself.
    pub fn find_relative(&self, from_file: &Path, level: usize, parts: &[String]) -> Option<ModuleLocation> {
        let mut base = from_file.parent()?;
        for _ in 1..level {
            base = base.parent()?;
        }
        if parts.is_empty() {
            let init = base.join(PACKAGE_INIT);
            return init.is_file().then(|| ModuleLocation::from_file(init));
        }
        find_in(base, parts)
    }

    /// Locate `from <level dots><parts> import ...` as seen from `from_file`.
    pub fn find(&self, from_file: &Path, level: usize, parts: &[String]) -> Option<ModuleLocation> {
        if level == 0 {
            self.find_absolute(parts)
        } else {
            self.find_relative(from_file, level, parts)
        }
    }

    /// The module's index, loading it on first use.
    pub fn index(&mut self, location: &ModuleLocation) -> Option<Rc<ModuleIndex>> {
        if let Some(cached) = self.cache.get(&location.file) {
            return cached.clone();
        }
        let loaded = self.load(&location.file).map(Rc::new);
        self.cache.insert(location.file.clone(), loaded.clone());
        loaded
    }

    fn load(&mut self, file: &Path) -> Option<ModuleIndex> {
        let source = match std::fs::read_to_string(file) {
            Ok(source) => source,
            Err(err) => {
                debug!("cannot index module {}: {}", file.display(), err);
                return None;
            }
        };
        let tree = self.parser.parse(&source, None)?;
        Some(ModuleIndex::build(tree.root_node(), source.as_bytes()))
    }

    /// Resolve `name` as an attribute of the module at `location`.
    pub fn member(&mut self, location: &ModuleLocation, name: &str) -> Option<SymbolHandle> {
        self.member_at_depth(location, name, 0)
    }

    fn member_at_depth(&mut self, location: &ModuleLocation, name: &str, depth: usize) -> Option<SymbolHandle> {
        let entry = self
            .index(location)
            .and_then(|index| index.entries.get(name).cloned());
        match entry {
            Some(IndexEntry::Symbol { kind, docstring }) => {
                let proximal = proximal_module_name(&location.file);
                let full_name = if kind.is_local_binding() {
                    proximal
                } else {
                    format!("{}.{}", proximal, name)
                };
                Some(
                    SymbolHandle::new(kind, name, full_name, location.file.clone())
                        .with_docstring(docstring),
                )
            }
            Some(IndexEntry::Module { parts }) => {
                let last = parts.last().cloned().unwrap_or_default();
                self.find_absolute(&parts).map(|loc| loc.handle(&last))
            }
            Some(IndexEntry::From {
                level,
                module,
                name: imported,
            }) => {
                if depth >= MAX_REEXPORT_DEPTH {
                    debug!("re-export chain too deep for '{}'", name);
                    return None;
                }
                let target = self.find(&location.file, level, &module)?;
                self.member_at_depth(&target, &imported, depth + 1)
            }
            None => {
                // A package attribute may be a submodule that nothing imported yet
                let dir = location.package_dir()?;
                find_in(dir, &[name.to_string()]).map(|loc| loc.handle(name))
            }
        }
    }

    /// Public top-level names of a module, for `from m import *`.
    pub fn star_names(&mut self, location: &ModuleLocation) -> Vec<String> {
        self.index(location)
            .map(|index| {
                index
                    .names()
                    .filter(|n| !n.starts_with('_'))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Find `parts` as a package or module under `base`. Packages win.
fn find_in(base: &Path, parts: &[String]) -> Option<ModuleLocation> {
    if parts.is_empty() {
        return None;
    }
    let mut dir = base.to_path_buf();
    for part in parts {
        dir.push(part);
    }
    let init = dir.join(PACKAGE_INIT);
    if init.is_file() {
        return Some(ModuleLocation::from_file(init));
    }
    let module = dir.with_extension("py");
    module.is_file().then(|| ModuleLocation::from_file(module))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    fn parts(dotted: &str) -> Vec<String> {
        dotted.split('.').map(str::to_string).collect()
    }

    fn resolver(dir: &TempDir, search: Vec<PathBuf>) -> ModuleResolver {
        ModuleResolver::new(dir.path(), search).unwrap()
    }

    #[test]
    fn index_collects_top_level_bindings() {
        let source = "import os\nimport a.b as ab\nfrom .x import y as z\nX = 1\na, b = 1, 2\n\ndef f():\n    inner = 1\n\nclass K:\n    pass\n\nif True:\n    G = 2\n";
        let tree = python_parser().unwrap().parse(source, None).unwrap();
        let index = ModuleIndex::build(tree.root_node(), source.as_bytes());
        let names: Vec<&str> = index.names().collect();
        assert_eq!(names, vec!["os", "ab", "z", "X", "a", "b", "f", "K", "G"]);
        assert!(!index.contains("inner"));
    }

    #[test]
    fn packages_win_over_modules() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pkg/__init__.py", "");
        write(dir.path(), "pkg.py", "");
        let loc = resolver(&dir, vec![]).find_absolute(&parts("pkg")).unwrap();
        assert!(loc.is_package);
    }

    #[test]
    fn search_paths_are_consulted_after_root() {
        let dir = TempDir::new().unwrap();
        let site = TempDir::new().unwrap();
        write(site.path(), "requests/__init__.py", "def get(url):\n    pass\n");
        let r = resolver(&dir, vec![site.path().to_path_buf()]);
        let loc = r.find_absolute(&parts("requests")).unwrap();
        assert!(loc.file.starts_with(site.path()));
        assert!(r.find_absolute(&parts("missing")).is_none());
    }

    #[test]
    fn relative_lookup_from_nested_module() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pkg/__init__.py", "");
        write(dir.path(), "pkg/sub/__init__.py", "");
        write(dir.path(), "pkg/sub/m.py", "");
        write(dir.path(), "pkg/util.py", "");
        let r = resolver(&dir, vec![]);
        let from = dir.path().join("pkg/sub/m.py");
        let util = r.find_relative(&from, 2, &parts("util")).unwrap();
        assert_eq!(util.file, dir.path().join("pkg/util.py"));
        let own_package = r.find_relative(&from, 1, &[]).unwrap();
        assert_eq!(own_package.file, dir.path().join("pkg/sub/__init__.py"));
    }

    #[test]
    fn member_of_module() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "lib/util.py",
            "def helper():\n    \"\"\"Help.\"\"\"\n\nLIMIT = 3\n",
        );
        let mut r = resolver(&dir, vec![]);
        let loc = r.find_absolute(&parts("lib.util")).unwrap();
        let helper = r.member(&loc, "helper").unwrap();
        assert_eq!(helper.kind, SymbolKind::Function);
        assert_eq!(helper.full_name, "util.helper");
        assert_eq!(helper.docstring, "Help.");
        let limit = r.member(&loc, "LIMIT").unwrap();
        assert_eq!(limit.kind, SymbolKind::Statement);
        assert_eq!(limit.full_name, "util");
        assert!(r.member(&loc, "nope").is_none());
        assert_eq!(r.cached_modules(), 1);
    }

    #[test]
    fn re_exports_are_followed() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pkg/__init__.py", "from .impl import run\n");
        write(dir.path(), "pkg/impl.py", "def run():\n    pass\n");
        let mut r = resolver(&dir, vec![]);
        let pkg = r.find_absolute(&parts("pkg")).unwrap();
        let run = r.member(&pkg, "run").unwrap();
        assert_eq!(run.full_name, "impl.run");
        assert_eq!(run.module_path, Some(dir.path().join("pkg/impl.py")));
    }

    #[test]
    fn cyclic_re_exports_terminate() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.py", "from b import x\n");
        write(dir.path(), "b.py", "from a import x\n");
        let mut r = resolver(&dir, vec![]);
        let a = r.find_absolute(&parts("a")).unwrap();
        assert!(r.member(&a, "x").is_none());
    }

    #[test]
    fn package_submodule_fallback() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pkg/__init__.py", "");
        write(dir.path(), "pkg/tools.py", "");
        let mut r = resolver(&dir, vec![]);
        let pkg = r.find_absolute(&parts("pkg")).unwrap();
        let tools = r.member(&pkg, "tools").unwrap();
        assert_eq!(tools.kind, SymbolKind::Module);
        assert_eq!(tools.full_name, "tools");
    }

    #[test]
    fn star_names_skip_private() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "m.py", "a = 1\n_b = 2\ndef c():\n    pass\n");
        let mut r = resolver(&dir, vec![]);
        let m = r.find_absolute(&parts("m")).unwrap();
        assert_eq!(r.star_names(&m), vec!["a", "c"]);
    }
}
