//! Source Locations
//!
//! Byte offsets plus 1-based line/column, shared by tokens, nodes and messages.

use std::fmt;
use std::sync::Arc;

/// A located slice of a source file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub filename: Arc<str>,
    /// Byte offset of the first character
    pub offset: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
    /// Length in bytes
    pub size: usize,
}

impl Location {
    pub fn new(filename: Arc<str>, offset: usize, line: usize, column: usize, size: usize) -> Self {
        Self {
            filename,
            offset,
            line,
            column,
            size,
        }
    }

    /// Location of the very first character of a file
    pub fn start_of(filename: Arc<str>) -> Self {
        Self::new(filename, 0, 1, 1, 0)
    }

    /// Byte offset one past the last character
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    /// Location of a sub-slice starting `skipped.len()` bytes into this one.
    ///
    /// `skipped` must be the exact source text between `self.offset` and the
    /// new offset so line and column can be advanced across newlines.
    pub fn advance(&self, skipped: &str, size: usize) -> Self {
        let mut line = self.line;
        let mut column = self.column;
        for ch in skipped.chars() {
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self::new(self.filename.clone(), self.offset + skipped.len(), line, column, size)
    }

    /// Widen this location so it ends where `other` ends
    pub fn extend_to(&mut self, other: &Location) {
        if other.end() > self.offset {
            self.size = other.end() - self.offset;
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}
