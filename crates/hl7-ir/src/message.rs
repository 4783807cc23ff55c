//! Message container for one parsed HL7 v2 message
#![allow(clippy::must_use_candidate)] // Builder/constructor API intentionally omits pervasive #[must_use].
#![allow(clippy::return_self_not_must_use)] // Fluent builder methods return Self for ergonomics.

use crate::element::{Complex, Element};
use crate::separators::Separators;
use serde::{Deserialize, Serialize};

/// A source line kept aside by the parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Line number (1-indexed)
    pub number: usize,

    /// Raw line content
    pub content: String,
}

impl Line {
    /// Create a new line
    pub fn new(number: usize, content: impl Into<String>) -> Self {
        Self {
            number,
            content: content.into(),
        }
    }
}

/// A message in instance tree form
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Message profile identifier (e.g. `ADT_A01`)
    pub id: String,

    /// Root group of the message (always complex once bound)
    pub root: Element,

    /// Encoding characters of the message
    pub separators: Separators,

    /// Lines that failed low-level parsing
    pub invalid: Vec<Line>,

    /// Lines that could not be placed in the structure
    pub unexpected: Vec<Line>,
}

impl Message {
    /// Create a new message
    pub fn new(id: impl Into<String>, root: Complex, separators: Separators) -> Self {
        Self {
            id: id.into(),
            root: Element::Complex(root),
            separators,
            invalid: Vec::new(),
            unexpected: Vec::new(),
        }
    }

    /// The root as a complex element
    pub fn root_complex(&self) -> Option<&Complex> {
        self.root.as_complex()
    }

    /// Set the invalid lines
    pub fn with_invalid(mut self, invalid: Vec<Line>) -> Self {
        self.invalid = invalid;
        self
    }

    /// Set the unexpected lines
    pub fn with_unexpected(mut self, unexpected: Vec<Line>) -> Self {
        self.unexpected = unexpected;
        self
    }
}
