//! pygrapher: deterministic definition/reference graphs for Python trees.
//!
//! The language-agnostic layer lives in `pygrapher-core` and the Python
//! engine, resolver, extractor and assembler in `pygrapher-python`. This
//! crate adds the batch coordinator and the command-line front end.

// Core infrastructure - re-exported from pygrapher-core
pub use pygrapher_core::config;
pub use pygrapher_core::error;
pub use pygrapher_core::graph;
pub use pygrapher_core::output;
pub use pygrapher_core::text;

// Language support
pub use pygrapher_python as python;

pub mod batch;
pub mod cli;
