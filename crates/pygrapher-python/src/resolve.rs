//! Canonical path resolution for symbol handles.
//!
//! A canonical path is the engine full name, made unique by:
//!
//! 1. appending the bare name for statement variables and parameters (the
//!    engine omits it for those kinds),
//! 2. anchoring `self.<attr>` bindings at the enclosing class rather than
//!    the method that assigns them,
//! 3. prefixing the module's supermodule (its directory, or the parent
//!    directory for a package `__init__.py`),
//!
//! and finally writing every `.` as `/`. Builtins resolve to their bare name.
//!
//! All paths are computed against an explicit [`ResolutionRoot`]; nothing
//! here consults the process working directory.

use std::io;
use std::path::{Component, Path, PathBuf};

use pygrapher_core::adapter::SymbolHandle;
use pygrapher_core::facts::{ScopeArena, ScopeKind};
use pygrapher_core::text::PositionError;
use thiserror::Error;

use crate::naming::{normalize_path, supermodule_path};

/// Receiver identifier whose attribute bindings are class-anchored.
pub const SELF_RECEIVER: &str = "self";

/// Directory names that mark the root of installed third-party packages.
pub const PACKAGE_MARKERS: &[&str] = &["site-packages", "dist-packages"];

/// Directory name prefix that marks a Python runtime install (`python3.11`).
pub const RUNTIME_MARKER_PREFIX: &str = "python";

// ============================================================================
// Error Types
// ============================================================================

/// Per-occurrence resolution failures. None of these abort a file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The engine could not resolve the occurrence to any symbol.
    #[error("no definition found for '{name}'")]
    Unresolved { name: String },

    /// Resolution produced an empty full name or path.
    #[error("full_name is empty for '{name}'")]
    EmptyPath { name: String },

    /// A file-backed symbol without an owning module path.
    #[error("no module path for '{name}'")]
    MissingModulePath { name: String },

    /// An instance attribute binding with no enclosing class scope.
    #[error("no enclosing class for instance attribute '{name}'")]
    NoEnclosingClass { name: String },

    /// An absolute module path outside the root with no recognizable marker.
    #[error("could not convert absolute module path {path} to relative module path")]
    Unrelativizable { path: String },

    /// A source file given by the caller that does not lie under the root.
    #[error("source file is outside the analysis root: {path}")]
    OutsideRoot { path: String },

    /// The engine reported a position that is not in the source.
    #[error(transparent)]
    Position(#[from] PositionError),
}

/// Result type for resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

// ============================================================================
// Resolution Root
// ============================================================================

/// The directory every relative path is measured against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRoot {
    path: PathBuf,
}

impl ResolutionRoot {
    /// Canonicalize `root` and use it as the resolution root.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let path = std::fs::canonicalize(root.as_ref())?;
        Ok(ResolutionRoot { path })
    }

    /// Use an absolute path as-is, without touching the file system.
    pub fn from_absolute(path: impl Into<PathBuf>) -> Self {
        ResolutionRoot {
            path: lexical_normalize(&path.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absolute path of a root-relative file.
    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.path.join(rel)
    }

    /// Root-relative, `/`-separated form of a user-supplied file path.
    ///
    /// Relative input is taken as already root-relative. Absolute input
    /// inside the root has the root stripped. Absolute input outside the
    /// root, and relative input that climbs out of it with `..`, is
    /// [`ResolveError::OutsideRoot`].
    pub fn to_root_relative(&self, file: &Path) -> ResolveResult<String> {
        let mut normalized = lexical_normalize(file);
        if normalized.is_absolute() && !normalized.starts_with(&self.path) {
            // The root is canonical; a symlinked spelling of it is still inside
            if let Ok(canonical) = std::fs::canonicalize(&normalized) {
                normalized = canonical;
            }
        }
        let rel = if normalized.is_absolute() {
            normalized.strip_prefix(&self.path).ok()
        } else {
            Some(normalized.as_path())
        };
        match rel {
            Some(rel)
                if !rel.as_os_str().is_empty()
                    && !matches!(rel.components().next(), Some(Component::ParentDir)) =>
            {
                Ok(normalize_path(rel))
            }
            _ => Err(ResolveError::OutsideRoot {
                path: file.display().to_string(),
            }),
        }
    }

    /// Rewrite a module path reported for a reference target relative to
    /// the root.
    ///
    /// Precedence: a path inside the root; else the components after a
    /// third-party package marker; else the components after a runtime
    /// install marker; else [`ResolveError::Unrelativizable`].
    pub fn relativize(&self, module_path: &Path) -> ResolveResult<String> {
        let normalized = lexical_normalize(module_path);
        let inside = if normalized.is_absolute() {
            normalized.strip_prefix(&self.path).ok().map(Path::to_path_buf)
        } else {
            Some(normalized.clone())
        };
        if let Some(rel) = inside {
            if !matches!(rel.components().next(), Some(Component::ParentDir)) {
                return Ok(normalize_path(&rel));
            }
        }

        let components: Vec<String> = normalized
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let after = |idx: usize| -> Option<String> {
            let rest = &components[idx + 1..];
            (!rest.is_empty()).then(|| rest.join("/"))
        };

        let package_marker = components
            .iter()
            .position(|c| PACKAGE_MARKERS.contains(&c.as_str()));
        let runtime_marker = || {
            components
                .iter()
                .position(|c| c.starts_with(RUNTIME_MARKER_PREFIX))
        };
        package_marker
            .or_else(runtime_marker)
            .and_then(after)
            .ok_or_else(|| ResolveError::Unrelativizable {
                path: module_path.display().to_string(),
            })
    }
}

/// Resolve `.` and `..` components without touching the file system.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// ============================================================================
// Path Resolver
// ============================================================================

/// Whether a handle is being resolved as a definition or a reference target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// The handle's module path is the root-relative file being analyzed.
    Definition,
    /// The module path may be absolute and is rewritten relative to the root.
    Reference,
}

/// A resolved canonical path plus the module file it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Canonical `/`-delimited path.
    pub path: String,
    /// Root-relative module file, `""` for builtins.
    pub module_file: String,
}

/// Computes canonical paths against a fixed root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: ResolutionRoot,
}

impl PathResolver {
    pub fn new(root: ResolutionRoot) -> Self {
        PathResolver { root }
    }

    pub fn root(&self) -> &ResolutionRoot {
        &self.root
    }

    /// Canonical path of `handle`.
    ///
    /// `scopes` is the arena of the file the handle was reported in; it is
    /// only consulted when the handle's scope index is set.
    pub fn canonical_path(
        &self,
        handle: &SymbolHandle,
        scopes: &ScopeArena,
        mode: ResolveMode,
    ) -> ResolveResult<ResolvedPath> {
        if handle.builtin {
            if handle.name.is_empty() {
                return Err(ResolveError::EmptyPath {
                    name: handle.name.clone(),
                });
            }
            return Ok(ResolvedPath {
                path: handle.name.clone(),
                module_file: String::new(),
            });
        }

        let local = self.local_full_name(handle, scopes)?;

        let module_path = handle
            .module_path
            .as_deref()
            .ok_or_else(|| ResolveError::MissingModulePath {
                name: handle.name.clone(),
            })?;
        let module_file = match mode {
            ResolveMode::Definition => normalize_path(module_path),
            ResolveMode::Reference => self.root.relativize(module_path)?,
        };

        let supermodule = supermodule_path(&module_file).replace('/', ".");
        let dotted = if supermodule.is_empty() {
            local
        } else {
            format!("{}.{}", supermodule, local)
        };
        let path = dotted.replace('.', "/");
        if path.is_empty() {
            return Err(ResolveError::EmptyPath {
                name: handle.name.clone(),
            });
        }
        Ok(ResolvedPath { path, module_file })
    }

    fn local_full_name(&self, handle: &SymbolHandle, scopes: &ScopeArena) -> ResolveResult<String> {
        let empty = || ResolveError::EmptyPath {
            name: handle.name.clone(),
        };

        if handle.kind.is_local_binding() && handle.receiver.as_deref() == Some(SELF_RECEIVER) {
            if let Some(scope) = handle.scope {
                let in_function = scopes
                    .get(scope)
                    .is_some_and(|s| s.kind.is_function_like());
                if in_function {
                    let class = scopes
                        .nearest(scope, ScopeKind::Class)
                        .and_then(|id| scopes.get(id))
                        .ok_or_else(|| ResolveError::NoEnclosingClass {
                            name: handle.name.clone(),
                        })?;
                    if class.full_name.is_empty() {
                        return Err(empty());
                    }
                    return Ok(format!("{}.{}", class.full_name, handle.name));
                }
            }
        }

        if handle.full_name.is_empty() {
            return Err(empty());
        }
        if handle.kind.is_local_binding() {
            Ok(format!("{}.{}", handle.full_name, handle.name))
        } else {
            Ok(handle.full_name.clone())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pygrapher_core::facts::{Scope, ScopeId, SymbolKind};

    fn resolver() -> PathResolver {
        PathResolver::new(ResolutionRoot::from_absolute("/work/proj"))
    }

    fn scope(kind: ScopeKind, name: &str, full_name: &str, parent: Option<ScopeId>) -> Scope {
        Scope {
            kind,
            name: name.to_string(),
            full_name: full_name.to_string(),
            parent,
        }
    }

    /// `mod.py` with `class C` and method `__init__`.
    fn class_arena(module_full: &str) -> (ScopeArena, ScopeId, ScopeId, ScopeId) {
        let mut arena = ScopeArena::new();
        let m = arena.push(scope(ScopeKind::Module, module_full, module_full, None));
        let c = arena.push(scope(
            ScopeKind::Class,
            "C",
            &format!("{}.C", module_full),
            Some(m),
        ));
        let f = arena.push(scope(
            ScopeKind::Function,
            "__init__",
            &format!("{}.C.__init__", module_full),
            Some(c),
        ));
        (arena, m, c, f)
    }

    mod definitions {
        use super::*;

        #[test]
        fn top_level_function() {
            let h = SymbolHandle::new(SymbolKind::Function, "foo", "mod.foo", "mod.py");
            let r = resolver()
                .canonical_path(&h, &ScopeArena::new(), ResolveMode::Definition)
                .unwrap();
            assert_eq!(r.path, "mod/foo");
            assert_eq!(r.module_file, "mod.py");
        }

        #[test]
        fn nested_module_gets_supermodule_prefix() {
            let h = SymbolHandle::new(SymbolKind::Class, "K", "mod.K", "pkg/sub/mod.py");
            let r = resolver()
                .canonical_path(&h, &ScopeArena::new(), ResolveMode::Definition)
                .unwrap();
            assert_eq!(r.path, "pkg/sub/mod/K");
        }

        #[test]
        fn package_init_anchors_at_package_dir() {
            let h = SymbolHandle::new(SymbolKind::Function, "bar", "pkg.bar", "pkg/__init__.py");
            let r = resolver()
                .canonical_path(&h, &ScopeArena::new(), ResolveMode::Definition)
                .unwrap();
            assert_eq!(r.path, "pkg/bar");
            assert!(!r.path.contains("__init__"));
        }

        #[test]
        fn statement_appends_bare_name() {
            let h = SymbolHandle::new(SymbolKind::Statement, "x", "mod", "mod.py");
            let r = resolver()
                .canonical_path(&h, &ScopeArena::new(), ResolveMode::Definition)
                .unwrap();
            assert_eq!(r.path, "mod/x");
        }

        #[test]
        fn param_appends_bare_name() {
            let h = SymbolHandle::new(SymbolKind::Param, "a", "mod.f", "mod.py");
            let r = resolver()
                .canonical_path(&h, &ScopeArena::new(), ResolveMode::Definition)
                .unwrap();
            assert_eq!(r.path, "mod/f/a");
        }

        #[test]
        fn self_attribute_is_class_anchored() {
            let (arena, _, _, init) = class_arena("mod");
            let h = SymbolHandle::new(SymbolKind::Statement, "x", "mod.C.__init__", "mod.py")
                .with_scope(init)
                .with_receiver(SELF_RECEIVER);
            let r = resolver()
                .canonical_path(&h, &arena, ResolveMode::Definition)
                .unwrap();
            assert_eq!(r.path, "mod/C/x");
        }

        #[test]
        fn self_attribute_without_class_is_an_error() {
            let mut arena = ScopeArena::new();
            let m = arena.push(scope(ScopeKind::Module, "mod", "mod", None));
            let f = arena.push(scope(ScopeKind::Function, "f", "mod.f", Some(m)));
            let h = SymbolHandle::new(SymbolKind::Statement, "x", "mod.f", "mod.py")
                .with_scope(f)
                .with_receiver(SELF_RECEIVER);
            let err = resolver()
                .canonical_path(&h, &arena, ResolveMode::Definition)
                .unwrap_err();
            assert!(matches!(err, ResolveError::NoEnclosingClass { .. }));
        }

        #[test]
        fn other_receivers_bind_to_function() {
            let (arena, _, _, init) = class_arena("mod");
            let h = SymbolHandle::new(SymbolKind::Statement, "x", "mod.C.__init__", "mod.py")
                .with_scope(init)
                .with_receiver("other");
            let r = resolver()
                .canonical_path(&h, &arena, ResolveMode::Definition)
                .unwrap();
            assert_eq!(r.path, "mod/C/__init__/x");
        }

        #[test]
        fn empty_full_name_is_an_error() {
            let h = SymbolHandle::new(SymbolKind::Function, "f", "", "mod.py");
            let err = resolver()
                .canonical_path(&h, &ScopeArena::new(), ResolveMode::Definition)
                .unwrap_err();
            assert_eq!(
                err,
                ResolveError::EmptyPath {
                    name: "f".to_string()
                }
            );
        }

        #[test]
        fn builtin_is_bare_name() {
            let h = SymbolHandle::builtin(SymbolKind::Function, "len");
            let r = resolver()
                .canonical_path(&h, &ScopeArena::new(), ResolveMode::Reference)
                .unwrap();
            assert_eq!(r.path, "len");
            assert_eq!(r.module_file, "");
        }
    }

    mod references {
        use super::*;

        #[test]
        fn absolute_path_inside_root() {
            let h = SymbolHandle::new(
                SymbolKind::Function,
                "helper",
                "util.helper",
                "/work/proj/lib/util.py",
            );
            let r = resolver()
                .canonical_path(&h, &ScopeArena::new(), ResolveMode::Reference)
                .unwrap();
            assert_eq!(r.path, "lib/util/helper");
            assert_eq!(r.module_file, "lib/util.py");
        }

        #[test]
        fn site_packages_marker() {
            let h = SymbolHandle::new(
                SymbolKind::Function,
                "get",
                "api.get",
                "/venv/lib/python3.11/site-packages/requests/api.py",
            );
            let r = resolver()
                .canonical_path(&h, &ScopeArena::new(), ResolveMode::Reference)
                .unwrap();
            assert_eq!(r.path, "requests/api/get");
            assert_eq!(r.module_file, "requests/api.py");
        }

        #[test]
        fn runtime_marker() {
            let h = SymbolHandle::new(SymbolKind::Module, "os", "os", "/usr/lib/python3.11/os.py");
            let r = resolver()
                .canonical_path(&h, &ScopeArena::new(), ResolveMode::Reference)
                .unwrap();
            assert_eq!(r.path, "os");
            assert_eq!(r.module_file, "os.py");
        }

        #[test]
        fn unmarked_outside_path_is_reported() {
            let h = SymbolHandle::new(SymbolKind::Function, "f", "m.f", "/elsewhere/lib/m.py");
            let err = resolver()
                .canonical_path(&h, &ScopeArena::new(), ResolveMode::Reference)
                .unwrap_err();
            assert!(matches!(err, ResolveError::Unrelativizable { .. }));
        }

        #[test]
        fn package_module_target() {
            let h = SymbolHandle::new(SymbolKind::Module, "pkg", "pkg", "/work/proj/pkg/__init__.py");
            let r = resolver()
                .canonical_path(&h, &ScopeArena::new(), ResolveMode::Reference)
                .unwrap();
            assert_eq!(r.path, "pkg");
        }
    }

    mod roots {
        use super::*;

        #[test]
        fn relativize_relative_input() {
            let root = ResolutionRoot::from_absolute("/work/proj");
            assert_eq!(root.relativize(Path::new("./a/b.py")).unwrap(), "a/b.py");
        }

        #[test]
        fn relativize_escaping_relative_input_uses_markers() {
            let root = ResolutionRoot::from_absolute("/work/proj");
            assert_eq!(
                root.relativize(Path::new("../venv/site-packages/six.py"))
                    .unwrap(),
                "six.py"
            );
            assert!(root.relativize(Path::new("../other/x.py")).is_err());
        }

        #[test]
        fn marker_as_last_component_is_reported() {
            let root = ResolutionRoot::from_absolute("/work/proj");
            assert!(root.relativize(Path::new("/opt/site-packages")).is_err());
        }

        #[test]
        fn to_root_relative_strips_root() {
            let root = ResolutionRoot::from_absolute("/work/proj");
            assert_eq!(
                root.to_root_relative(Path::new("/work/proj/pkg/m.py")).unwrap(),
                "pkg/m.py"
            );
            assert_eq!(
                root.to_root_relative(Path::new("./pkg/m.py")).unwrap(),
                "pkg/m.py"
            );
            assert_eq!(
                root.to_root_relative(Path::new("pkg/../m.py")).unwrap(),
                "m.py"
            );
        }

        #[test]
        fn to_root_relative_rejects_files_outside_root() {
            let root = ResolutionRoot::from_absolute("/work/proj");
            let err = root
                .to_root_relative(Path::new("/tmp/.hidden/x.py"))
                .unwrap_err();
            assert_eq!(
                err,
                ResolveError::OutsideRoot {
                    path: "/tmp/.hidden/x.py".to_string()
                }
            );
            assert!(root.to_root_relative(Path::new("../other/x.py")).is_err());
            assert!(root.to_root_relative(Path::new("/work/projx/m.py")).is_err());
            assert!(root.to_root_relative(Path::new("/work/proj")).is_err());
        }

        #[test]
        fn lexical_normalize_collapses_parents() {
            assert_eq!(
                lexical_normalize(Path::new("/a/b/../c/./d.py")),
                PathBuf::from("/a/c/d.py")
            );
            assert_eq!(lexical_normalize(Path::new("../x")), PathBuf::from("../x"));
        }
    }
}
