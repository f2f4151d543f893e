//! Source location tracking for error messages.

use std::fmt;

use serde::Serialize;

/// A location in source text (line, column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Location {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed, in characters not bytes)
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Location of the start of a line.
    pub fn line_start(line: usize) -> Self {
        Self { line, column: 1 }
    }

    /// Location reported by the YAML scanner, if it had one.
    pub fn from_yaml_error(error: &serde_yaml::Error) -> Option<Self> {
        error
            .location()
            .map(|loc| Self::new(loc.line(), loc.column()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
