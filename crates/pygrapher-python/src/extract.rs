//! Per-file extraction of definition and reference records.
//!
//! The extractor drives an [`AnalysisEngine`] over one file, converts each
//! occurrence position to a byte offset with a single [`PositionConverter`]
//! per file, and resolves canonical paths with the [`PathResolver`].
//! Occurrences that fail to convert are logged and skipped; they never abort
//! the rest of the file.

use std::path::Path;

use pygrapher_core::adapter::{AnalysisEngine, FileAnalysis, NameOccurrence};
use pygrapher_core::graph::{Definition, Reference};
use pygrapher_core::text::PositionConverter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::resolve::{PathResolver, ResolutionRoot, ResolveError, ResolveMode, ResolveResult};

/// Raw records extracted from one file, before assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileGraph {
    /// Root-relative path of the file.
    pub file: String,
    /// Definitions in engine order.
    pub defs: Vec<Definition>,
    /// References in engine order.
    pub refs: Vec<Reference>,
    /// Occurrences dropped because they could not be converted.
    pub skipped: usize,
}

impl FileGraph {
    pub fn new(file: impl Into<String>) -> Self {
        FileGraph {
            file: file.into(),
            ..FileGraph::default()
        }
    }
}

/// Why a whole file produced no records.
#[derive(Debug, Error)]
pub enum ExtractError<E: std::error::Error + 'static> {
    /// The requested file is not under the analysis root.
    #[error(transparent)]
    Path(#[from] ResolveError),

    /// The engine could not analyze the file.
    #[error(transparent)]
    Engine(E),
}

/// Runs an engine over files and converts its occurrences into records.
pub struct Extractor<E> {
    engine: E,
    resolver: PathResolver,
}

impl<E: AnalysisEngine> Extractor<E> {
    pub fn new(engine: E, root: ResolutionRoot) -> Self {
        Extractor {
            engine,
            resolver: PathResolver::new(root),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn root(&self) -> &ResolutionRoot {
        self.resolver.root()
    }

    /// Extract the records of one file.
    ///
    /// `file` may be root-relative or absolute inside the root. A file
    /// outside the root and an engine failure (unreadable or unparsable
    /// file) are returned; per-occurrence failures are logged and counted
    /// in [`FileGraph::skipped`].
    pub fn extract_file(&mut self, file: &str) -> Result<FileGraph, ExtractError<E::Error>> {
        let rel = self.resolver.root().to_root_relative(Path::new(file))?;
        let analysis = self
            .engine
            .analyze(Path::new(&rel))
            .map_err(ExtractError::Engine)?;
        let converter = PositionConverter::new(&analysis.source);

        let mut graph = FileGraph::new(rel.as_str());
        for occurrence in &analysis.occurrences {
            let converted = if occurrence.is_definition() {
                self.definition(&rel, occurrence, &analysis, &converter)
                    .map(|def| graph.defs.push(def))
            } else {
                self.reference(&rel, occurrence, &analysis, &converter)
                    .map(|r| graph.refs.push(r))
            };
            if let Err(err) = converted {
                let role = if occurrence.is_definition() { "def" } else { "ref" };
                warn!(
                    "failed to convert {} '{}' at {}:{} in source file {}: {}",
                    role, occurrence.name, occurrence.line, occurrence.column, rel, err
                );
                graph.skipped += 1;
            }
        }

        debug!(
            "{}: {} defs, {} refs, {} skipped",
            rel,
            graph.defs.len(),
            graph.refs.len(),
            graph.skipped
        );
        Ok(graph)
    }

    fn definition(
        &self,
        file: &str,
        occurrence: &NameOccurrence,
        analysis: &FileAnalysis,
        converter: &PositionConverter,
    ) -> ResolveResult<Definition> {
        let handle = occurrence
            .symbol
            .as_ref()
            .ok_or_else(|| ResolveError::Unresolved {
                name: occurrence.name.clone(),
            })?;
        let resolved = self
            .resolver
            .canonical_path(handle, &analysis.scopes, ResolveMode::Definition)?;
        let start = converter.convert(occurrence.line, occurrence.column)?;
        Ok(Definition {
            data: None,
            def_end: start + occurrence.name.len(),
            def_start: start,
            docstring: handle.docstring.clone(),
            exported: true,
            file: file.to_string(),
            kind: handle.kind,
            name: handle.name.clone(),
            path: resolved.path,
        })
    }

    fn reference(
        &self,
        file: &str,
        occurrence: &NameOccurrence,
        analysis: &FileAnalysis,
        converter: &PositionConverter,
    ) -> ResolveResult<Reference> {
        let target = occurrence
            .symbol
            .as_ref()
            .ok_or_else(|| ResolveError::Unresolved {
                name: occurrence.name.clone(),
            })?;
        let resolved = self
            .resolver
            .canonical_path(target, &analysis.scopes, ResolveMode::Reference)?;
        let start = converter.convert(occurrence.line, occurrence.column)?;
        Ok(Reference {
            def: false,
            def_file: resolved.module_file,
            def_path: resolved.path,
            end: start + occurrence.name.len(),
            file: file.to_string(),
            start,
            to_builtin: target.builtin,
        })
    }
}
