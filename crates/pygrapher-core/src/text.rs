//! Line:column to byte offset conversion.
//!
//! ## Coordinate Conventions
//!
//! - Lines are **1-indexed**
//! - Columns are **0-indexed byte columns** (the unit tree-sitter reports)
//! - Byte offsets are **0-indexed**
//!
//! A [`PositionConverter`] is built once per file from its source text and
//! reused for every lookup in that file. Lines that do not exist in the
//! source are reported as [`PositionError::LineOutOfRange`], never clamped.

use thiserror::Error;

/// Errors raised by position conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    /// The requested line is not present in the source text.
    #[error("requested line out of bounds {line} > {lines}")]
    LineOutOfRange { line: u32, lines: usize },
}

/// Result type for position conversion.
pub type Result<T> = std::result::Result<T, PositionError>;

/// Per-file prefix-sum table mapping `(line, column)` to a byte offset.
///
/// Entry `i` holds the cumulative byte length of lines `1..=i`, each
/// counted with its line-feed terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionConverter {
    line_starts: Vec<usize>,
}

impl PositionConverter {
    /// Build the offset table for `source`.
    ///
    /// The source is split on `\n` only. A `\r` before the line feed stays
    /// part of the line, which matches byte columns reported by the parser.
    pub fn new(source: &str) -> Self {
        let mut line_starts = Vec::with_capacity(source.len() / 32 + 1);
        let mut offset = 0usize;
        for line in source.split('\n') {
            line_starts.push(offset);
            offset += line.len() + 1;
        }
        PositionConverter { line_starts }
    }

    /// Number of lines known to the table.
    ///
    /// Text without a final line feed still counts its last line, and a
    /// trailing line feed yields one more (empty) line. An empty source has
    /// one line.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Convert a 1-indexed line and 0-indexed byte column to a byte offset.
    pub fn convert(&self, line: u32, column: u32) -> Result<usize> {
        let index = (line as usize)
            .checked_sub(1)
            .filter(|idx| *idx < self.line_starts.len())
            .ok_or(PositionError::LineOutOfRange {
                line,
                lines: self.line_starts.len(),
            })?;
        Ok(self.line_starts[index] + column as usize)
    }
}

// ============================================================================
// Tests
// ============================================================================
