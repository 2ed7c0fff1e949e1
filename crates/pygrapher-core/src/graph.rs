//! Definition and reference records, and the graph document.
//!
//! Field declarations are kept in ascending lexicographic order of their
//! serialized names, and [`crate::output`] additionally routes every record
//! through a sorted map before writing.

use serde::{Deserialize, Serialize};

use crate::facts::SymbolKind;

/// A named, located symbol binding site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Definition {
    /// Reserved extension slot, always `null`.
    pub data: Option<serde_json::Value>,
    /// End byte offset (exclusive) of the name token.
    pub def_end: usize,
    /// Start byte offset of the name token.
    pub def_start: usize,
    pub docstring: String,
    /// Always true.
    pub exported: bool,
    /// Root-relative file path, `/`-separated.
    pub file: String,
    pub kind: SymbolKind,
    pub name: String,
    /// Canonical `/`-delimited path.
    pub path: String,
}

impl Definition {
    /// The `Def = true` reference pointing back at this definition.
    pub fn self_reference(&self) -> Reference {
        Reference {
            def: true,
            def_file: self.file.clone(),
            def_path: self.path.clone(),
            end: self.def_end,
            file: self.file.clone(),
            start: self.def_start,
            to_builtin: false,
        }
    }
}

/// A located use of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Reference {
    /// True for a definition's own self-reference.
    pub def: bool,
    /// File holding the target definition. Empty for builtins.
    pub def_file: String,
    pub def_path: String,
    pub end: usize,
    pub file: String,
    pub start: usize,
    pub to_builtin: bool,
}

/// Uniqueness key of a reference: (DefPath, DefFile, File, Start, End).
pub type ReferenceKey<'a> = (&'a str, &'a str, &'a str, usize, usize);

impl Reference {
    pub fn key(&self) -> ReferenceKey<'_> {
        (
            &self.def_path,
            &self.def_file,
            &self.file,
            self.start,
            self.end,
        )
    }
}

/// The `{"Defs": [...], "Refs": [...]}` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(rename = "Defs")]
    pub defs: Vec<Definition>,
    #[serde(rename = "Refs")]
    pub refs: Vec<Reference>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    /// Append another graph's records after this graph's, without dedup.
    pub fn extend(&mut self, other: Graph) {
        self.defs.extend(other.defs);
        self.refs.extend(other.refs);
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty() && self.refs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foo_def() -> Definition {
        Definition {
            data: None,
            def_end: 7,
            def_start: 4,
            docstring: String::new(),
            exported: true,
            file: "m.py".to_string(),
            kind: SymbolKind::Function,
            name: "foo".to_string(),
            path: "m/foo".to_string(),
        }
    }

    #[test]
    fn self_reference_mirrors_definition_span() {
        let def = foo_def();
        let r = def.self_reference();
        assert!(r.def);
        assert!(!r.to_builtin);
        assert_eq!(r.def_path, def.path);
        assert_eq!(r.file, def.file);
        assert_eq!(r.def_file, def.file);
        assert_eq!((r.start, r.end), (def.def_start, def.def_end));
    }

    #[test]
    fn definition_field_names() {
        let value = serde_json::to_value(foo_def()).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec![
                "Data",
                "DefEnd",
                "DefStart",
                "Docstring",
                "Exported",
                "File",
                "Kind",
                "Name",
                "Path"
            ]
        );
        assert_eq!(value["Kind"], "function");
        assert!(value["Data"].is_null());
    }

    #[test]
    fn reference_field_names() {
        let value = serde_json::to_value(foo_def().self_reference()).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec!["Def", "DefFile", "DefPath", "End", "File", "Start", "ToBuiltin"]
        );
    }

    #[test]
    fn extend_concatenates_in_order() {
        let mut a = Graph::new();
        a.defs.push(foo_def());
        let mut b = Graph::new();
        let mut bar = foo_def();
        bar.path = "m/bar".to_string();
        b.defs.push(bar);
        b.refs.push(foo_def().self_reference());
        a.extend(b);
        assert_eq!(a.defs.len(), 2);
        assert_eq!(a.defs[1].path, "m/bar");
        assert_eq!(a.refs.len(), 1);
    }

    #[test]
    fn graph_round_trips_through_json() {
        let mut g = Graph::new();
        g.defs.push(foo_def());
        g.refs.push(foo_def().self_reference());
        let json = serde_json::to_string(&g).unwrap();
        let back: Graph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);
    }
}
