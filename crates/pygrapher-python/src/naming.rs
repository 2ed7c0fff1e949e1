//! Python module naming conventions.
//!
//! All functions here work on `/`-separated path strings. Paths coming from
//! the file system are normalized with [`normalize_path`] first.

use std::path::{Component, Path};

/// Package initializer file name.
pub const PACKAGE_INIT: &str = "__init__.py";

/// Render a path with `/` separators, dropping `.` components.
pub fn normalize_path(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut absolute = false;
    for component in path.components() {
        match component {
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::Prefix(prefix) => parts.push(prefix.as_os_str().to_string_lossy().into_owned()),
            Component::ParentDir => parts.push("..".to_string()),
            Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Last `/`-separated component of `path`.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Everything before the last `/`, or `""` when there is none.
pub fn dirname(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

/// True if `path` names a package initializer file.
pub fn is_package_init(path: &str) -> bool {
    basename(path) == PACKAGE_INIT
}

/// Dotted module name of a root-relative source file.
///
/// `pkg/mod.py` is `pkg.mod`; `pkg/__init__.py` is `pkg`.
pub fn module_name(file: &str) -> String {
    let stem = if is_package_init(file) {
        dirname(file)
    } else {
        strip_extension(file)
    };
    stem.replace('/', ".")
}

/// Directory that anchors a module's definitions.
///
/// For a package initializer this is the parent of the package directory.
pub fn supermodule_path(module_file: &str) -> &str {
    if is_package_init(module_file) {
        dirname(dirname(module_file))
    } else {
        dirname(module_file)
    }
}

/// Name of the module itself, without its package prefix.
///
/// The engine roots its full names at this name: `mod` for `pkg/mod.py`,
/// `pkg` for `pkg/__init__.py`.
pub fn proximal_module_name(file: &Path) -> String {
    let normalized = normalize_path(file);
    let stem = if is_package_init(&normalized) {
        basename(dirname(&normalized))
    } else {
        basename(strip_extension(&normalized))
    };
    stem.to_string()
}

fn strip_extension(file: &str) -> &str {
    let name_start = file.rfind('/').map_or(0, |idx| idx + 1);
    match file[name_start..].rfind('.') {
        // A leading dot is a hidden file name, not an extension
        Some(dot) if dot > 0 => &file[..name_start + dot],
        _ => file,
    }
}
