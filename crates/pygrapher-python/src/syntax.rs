// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! tree-sitter helpers shared by the engine and the module index.

use tree_sitter::{Node, Parser};

use crate::analyzer::EngineError;

/// A parser configured for Python.
pub fn python_parser() -> Result<Parser, EngineError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| EngineError::Language {
            message: e.to_string(),
        })?;
    Ok(parser)
}

/// Source text of `node`. Empty if the bytes are not valid UTF-8.
pub fn node_text<'a>(node: Node<'_>, bytes: &'a [u8]) -> &'a str {
    node.utf8_text(bytes).unwrap_or("")
}

/// Named children, skipping comments.
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// All named children carrying `field`.
pub fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// Identifier-like leaf (soft keywords such as `match` or `type` included).
pub fn is_identifier(node: Node<'_>) -> bool {
    matches!(node.kind(), "identifier" | "keyword_identifier")
}

/// 1-indexed line and 0-indexed byte column of `node`.
pub fn position(node: Node<'_>) -> (u32, u32) {
    let point = node.start_position();
    (point.row as u32 + 1, point.column as u32)
}

/// Identifier nodes of a `dotted_name` (or a lone identifier).
pub fn dotted_parts(node: Node<'_>) -> Vec<Node<'_>> {
    if is_identifier(node) {
        return vec![node];
    }
    named_children(node)
        .into_iter()
        .filter(|child| is_identifier(*child))
        .collect()
}

/// Level and module name parts of a `relative_import` node.
///
/// `from ..pkg.mod import x` has level 2 and parts `pkg`, `mod`.
pub fn relative_import_parts<'t>(node: Node<'t>, bytes: &[u8]) -> (usize, Vec<Node<'t>>) {
    let mut level = 0;
    let mut parts = Vec::new();
    for child in named_children(node) {
        match child.kind() {
            "import_prefix" => level = node_text(child, bytes).matches('.').count(),
            "dotted_name" => parts = dotted_parts(child),
            _ => {}
        }
    }
    (level, parts)
}

/// Cleaned docstring of a definition body, or `""`.
pub fn body_docstring(body: Option<Node<'_>>, bytes: &[u8]) -> String {
    let Some(body) = body else {
        return String::new();
    };
    let Some(first) = named_children(body).into_iter().next() else {
        return String::new();
    };
    if first.kind() != "expression_statement" {
        return String::new();
    }
    let parts = named_children(first);
    match parts.as_slice() {
        [string] if string.kind() == "string" => clean_docstring(&string_literal_body(*string, bytes)),
        _ => String::new(),
    }
}

/// Text between a string literal's opening and closing quotes.
fn string_literal_body(node: Node<'_>, bytes: &[u8]) -> String {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    let start = children.iter().find(|c| c.kind() == "string_start");
    let end = children.iter().rev().find(|c| c.kind() == "string_end");
    if let (Some(start), Some(end)) = (start, end) {
        return bytes
            .get(start.end_byte()..end.start_byte())
            .and_then(|slice| std::str::from_utf8(slice).ok())
            .unwrap_or("")
            .to_string();
    }
    strip_quotes(node_text(node, bytes)).to_string()
}

fn strip_quotes(literal: &str) -> &str {
    let unprefixed = literal.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = unprefixed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    unprefixed
}

/// Normalize docstring indentation the way `inspect.cleandoc` does.
///
/// The first line loses its leading whitespace; later lines lose the
/// common indentation of the non-blank ones; leading and trailing empty
/// lines are dropped.
pub fn clean_docstring(raw: &str) -> String {
    let expanded = expand_tabs(raw);
    let lines: Vec<&str> = expanded.split('\n').collect();

    let margin = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<&str> = Vec::with_capacity(lines.len());
    if let Some(first) = lines.first() {
        cleaned.push(first.trim_start());
    }
    for line in lines.iter().skip(1) {
        cleaned.push(strip_leading_chars(line, margin));
    }

    while cleaned.last().is_some_and(|line| line.is_empty()) {
        cleaned.pop();
    }
    let first_content = cleaned
        .iter()
        .position(|line| !line.is_empty())
        .unwrap_or(cleaned.len());
    cleaned[first_content..].join("\n")
}

fn strip_leading_chars(line: &str, count: usize) -> &str {
    match line.char_indices().nth(count) {
        Some((idx, _)) => &line[idx..],
        None => "",
    }
}

fn expand_tabs(text: &str) -> String {
    const TAB_SIZE: usize = 8;
    let mut out = String::with_capacity(text.len());
    let mut column = 0;
    for c in text.chars() {
        match c {
            '\t' => {
                let pad = TAB_SIZE - column % TAB_SIZE;
                out.extend(std::iter::repeat_n(' ', pad));
                column += pad;
            }
            '\n' | '\r' => {
                out.push(c);
                column = 0;
            }
            _ => {
                out.push(c);
                column += 1;
            }
        }
    }
    out
}
