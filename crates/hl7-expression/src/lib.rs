#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # hl7-expression
//!
//! Boolean predicate language used by content constraints.
//!
//! An [`Expression`] is an immutable tree of leaves (presence, comparisons,
//! membership, patterns), boolean combinators and quantifiers. It is
//! evaluated against one context element of the instance tree and yields an
//! [`EvalResult`]: `Pass`, `Fail` or `Inconclusive`, the last two with a
//! trace explaining the outcome.
//!
//! Expressions are usually stored as attribute trees ([`ExprNode`]), either
//! embedded in a profile document or written as XML, and turned into the AST
//! by [`deserialize`].

pub mod ast;
pub mod compare;
pub mod deserialize;
pub mod eval;
pub mod result;

pub use ast::{Expression, Operator, Pattern};
pub use deserialize::{ExprNode, deserialize};
pub use eval::{Evaluator, evaluate};
pub use result::{EvalResult, Reason, Trace};

use thiserror::Error;

/// Errors raised while building an expression from its declarative form
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown expression node '{0}'")]
    UnknownNode(String),

    #[error("Expression node '{node}' is missing attribute '{attribute}'")]
    MissingAttribute { node: String, attribute: String },

    #[error("Invalid boolean '{value}' for attribute '{attribute}' (expected true, false, 1 or 0)")]
    InvalidBoolean { attribute: String, value: String },

    #[error("Invalid number '{value}': {reason}")]
    InvalidNumber { value: String, reason: String },

    #[error("Invalid operator '{0}' (expected EQ, NE, GT, GE, LT or LE)")]
    InvalidOperator(String),

    #[error("Invalid {data_type} literal '{value}': {reason}")]
    InvalidLiteral {
        data_type: String,
        value: String,
        reason: String,
    },

    #[error("Invalid data type '{0}'")]
    InvalidType(String),

    #[error("Invalid regular expression '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Expression node '{node}' expects {expected} child expression(s), found {found}")]
    ChildCount {
        node: String,
        expected: usize,
        found: usize,
    },

    #[error("XML parse error: {0}")]
    Xml(String),
}

impl Error {
    /// Build a missing-attribute error for a node.
    pub fn missing_attribute(node: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            node: node.into(),
            attribute: attribute.into(),
        }
    }

    /// Build a child-count error for a node.
    pub fn child_count(node: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::ChildCount {
            node: node.into(),
            expected,
            found,
        }
    }
}

/// Crate-local result type for expression construction.
pub type Result<T> = std::result::Result<T, Error>;
