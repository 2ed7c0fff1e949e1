//! JSON emission for graph documents.
//!
//! Every object is routed through `serde_json::Value`, whose maps are
//! ordered by key, so records always serialize with their field names in
//! ascending lexicographic order. Same graph in, same bytes out.

use std::io::{self, Write};

use serde::Serialize;

use crate::graph::Graph;

/// Output layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputStyle {
    /// Single line.
    #[default]
    Compact,
    /// Two-space indented.
    Pretty,
}

/// Convert any serializable value into a key-sorted JSON tree.
///
/// The sorting comes from `serde_json::Map` being a `BTreeMap`, which holds
/// only while serde_json's `preserve_order` feature is off. Enabling that
/// feature anywhere in the dependency graph would make this keep insertion
/// order instead; `keys_sort_regardless_of_declaration_order` guards it.
pub fn to_sorted_value<T: Serialize>(value: &T) -> io::Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Serialize a graph to a string in the given style.
pub fn render_graph(graph: &Graph, style: OutputStyle) -> io::Result<String> {
    let value = to_sorted_value(graph)?;
    let json = match style {
        OutputStyle::Compact => serde_json::to_string(&value),
        OutputStyle::Pretty => serde_json::to_string_pretty(&value),
    };
    json.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Emit a graph to a writer, followed by a newline.
///
/// This is the single output path for the CLI.
pub fn emit_graph(graph: &Graph, style: OutputStyle, writer: &mut impl Write) -> io::Result<()> {
    let json = render_graph(graph, style)?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================
