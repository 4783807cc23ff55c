//! Evaluation outcomes and their traces

use hl7_ir::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One elementary cause, pointing at the element it concerns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub location: Location,
    pub message: String,
}

impl Reason {
    /// Create a new reason
    pub fn new(location: Location, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// An expression that did not pass, with the reasons found while evaluating it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub expression: String,
    pub reasons: Vec<Reason>,
}

impl Trace {
    /// Create a new trace
    pub fn new(expression: impl ToString, reasons: Vec<Reason>) -> Self {
        Self {
            expression: expression.to_string(),
            reasons,
        }
    }

    /// Trace with a single reason
    pub fn single(expression: impl ToString, location: Location, message: impl Into<String>) -> Self {
        Self::new(expression, vec![Reason::new(location, message)])
    }
}

/// Outcome of evaluating an expression against a context element
///
/// Both a failure and an inconclusive result carry their stack of traces,
/// outermost expression first. The stack of an inconclusive result ends with
/// the sub-expression that could not be decided (missing path, incomparable
/// values, malformed path) and keeps the traces of operands that failed on
/// the way to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalResult {
    Pass,
    Fail(Vec<Trace>),
    Inconclusive(Vec<Trace>),
}

impl EvalResult {
    #[must_use]
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    #[must_use]
    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail(_))
    }

    #[must_use]
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Self::Inconclusive(_))
    }

    /// The trace stack of a result that did not pass, empty for a pass
    #[must_use]
    pub fn into_traces(self) -> Vec<Trace> {
        match self {
            Self::Pass => Vec::new(),
            Self::Fail(stack) | Self::Inconclusive(stack) => stack,
        }
    }
}
