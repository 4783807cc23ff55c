//! Source locations for elements and report entries
#![allow(clippy::must_use_candidate)] // Constructor helpers are clear at call sites without #[must_use].
#![allow(clippy::return_self_not_must_use)] // Fluent setters are designed for chaining.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an element sits in the message, both structurally and in the source text
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Dotted position path (e.g. `PID[1]-3[2].1[1]`)
    pub path: String,

    /// Human readable description of the element
    pub description: String,

    /// Line number (1-indexed)
    pub line: usize,

    /// Column number (1-indexed)
    pub column: usize,
}

impl Location {
    /// Create a new location
    pub fn new(
        path: impl Into<String>,
        description: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
            line,
            column,
        }
    }

    /// Location of a child element, inheriting the source position
    pub fn child(&self, path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
            line: self.line,
            column: self.column,
        }
    }

    /// Override the source position
    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{} at {}:{}", self.path, self.line, self.column)
        } else {
            write!(
                f,
                "{} ({}) at {}:{}",
                self.path, self.description, self.line, self.column
            )
        }
    }
}
