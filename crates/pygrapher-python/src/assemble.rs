//! Graph assembly: merge per-file records into one deduplicated graph.
//!
//! Order is part of the contract. The synthesized module definitions of
//! every file come first, in input order, followed by each file's own
//! definitions in engine order. The first definition seen at a path wins,
//! so a binding can never shadow a module sharing its path.
//! References start with one self-reference per kept definition, in
//! definition order, followed by the extracted references in extraction
//! order; the first reference seen with a given
//! (DefPath, DefFile, File, Start, End) key wins.

use std::collections::HashSet;
use std::path::PathBuf;

use pygrapher_core::facts::SymbolKind;
use pygrapher_core::graph::{Definition, Graph, Reference};
use tracing::{debug, warn};

use crate::analyzer::{EngineError, TreeSitterEngine};
use crate::extract::{Extractor, FileGraph};
use crate::naming::{basename, module_name};
use crate::resolve::ResolutionRoot;

type OwnedKey = (String, String, String, usize, usize);

fn owned_key(reference: &Reference) -> OwnedKey {
    let (path, def_file, file, start, end) = reference.key();
    (path.to_string(), def_file.to_string(), file.to_string(), start, end)
}

/// The module definition synthesized for a root-relative file.
///
/// Spans (0, 0). `None` for a root-level `__init__.py`, whose module name
/// is empty.
pub fn module_definition(file: &str) -> Option<Definition> {
    let dotted = module_name(file);
    if dotted.is_empty() {
        return None;
    }
    let path = dotted.replace('.', "/");
    Some(Definition {
        data: None,
        def_end: 0,
        def_start: 0,
        docstring: String::new(),
        exported: true,
        file: file.to_string(),
        kind: SymbolKind::Module,
        name: basename(&path).to_string(),
        path,
    })
}

/// Merge extracted files into one graph.
pub fn assemble(files: impl IntoIterator<Item = FileGraph>) -> Graph {
    let mut seen_paths: HashSet<String> = HashSet::new();
    let mut defs: Vec<Definition> = Vec::new();
    let mut extracted: Vec<Reference> = Vec::new();
    let mut dropped_defs = 0usize;

    let mut candidates: Vec<Definition> = Vec::new();
    let mut file_defs: Vec<Definition> = Vec::new();
    for file in files {
        candidates.extend(module_definition(&file.file));
        file_defs.extend(file.defs);
        extracted.extend(file.refs);
    }
    candidates.append(&mut file_defs);

    for def in candidates {
        if seen_paths.insert(def.path.clone()) {
            defs.push(def);
        } else {
            dropped_defs += 1;
        }
    }

    let mut seen_refs: HashSet<OwnedKey> = HashSet::new();
    let mut refs: Vec<Reference> = Vec::with_capacity(defs.len() + extracted.len());
    let self_refs = defs.iter().map(Definition::self_reference);
    for reference in self_refs.chain(extracted) {
        if seen_refs.insert(owned_key(&reference)) {
            refs.push(reference);
        }
    }

    debug!(
        "assembled {} defs ({} duplicates dropped), {} refs",
        defs.len(),
        dropped_defs,
        refs.len()
    );
    Graph { defs, refs }
}

/// Extract and assemble `files` with a fresh tree-sitter engine.
///
/// Files the engine cannot analyze are logged and contribute nothing.
pub fn build_graph(
    root: &ResolutionRoot,
    files: &[String],
    search_paths: &[PathBuf],
) -> Result<Graph, EngineError> {
    let engine = TreeSitterEngine::new(root.clone(), search_paths.to_vec())?;
    let mut extractor = Extractor::new(engine, root.clone());
    let mut extracted = Vec::with_capacity(files.len());
    for file in files {
        match extractor.extract_file(file) {
            Ok(graph) => extracted.push(graph),
            Err(err) => warn!("skipping source file {}: {}", file, err),
        }
    }
    debug!(
        "indexed {} imported modules",
        extractor.engine().cached_modules()
    );
    Ok(assemble(extracted))
}
