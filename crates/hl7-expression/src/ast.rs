//! Expression AST
//!
//! Paths are kept as written and parsed at evaluation time, so a malformed
//! path makes its leaf inconclusive instead of rejecting the whole profile.
#![allow(clippy::must_use_candidate)] // Constructor helpers are plain data builders.

use crate::{Error, Result};
use hl7_ir::Value;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Operator {
    /// Parse the operator name used by the declarative form
    ///
    /// # Errors
    ///
    /// Returns an error for names other than `EQ`, `NE`, `GT`, `GE`, `LT`, `LE`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "EQ" => Ok(Self::Eq),
            "NE" => Ok(Self::Ne),
            "GT" => Ok(Self::Gt),
            "GE" => Ok(Self::Ge),
            "LT" => Ok(Self::Lt),
            "LE" => Ok(Self::Le),
            other => Err(Error::InvalidOperator(other.to_string())),
        }
    }

    /// Whether the operator needs an ordered type
    pub fn is_ordering(self) -> bool {
        !matches!(self, Self::Eq | Self::Ne)
    }

    /// Apply the operator to the outcome of a comparison
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::Lt => "LT",
            Self::Le => "LE",
        };
        f.write_str(s)
    }
}

/// Regular expression that must match a whole value
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern; the match is anchored at both ends
    ///
    /// # Errors
    ///
    /// Returns an error when the pattern is not a valid regular expression.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|e| Error::InvalidPattern {
            pattern: source.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { source, regex })
    }

    /// Pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the whole value matches
    pub fn is_full_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// A content expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// At least one non-null element exists at the path
    Presence { path: String },

    /// Compare the single values found at two paths
    PathValue {
        path1: String,
        operator: Operator,
        path2: String,
    },

    /// Values equal a literal text
    PlainText {
        path: String,
        text: String,
        ignore_case: bool,
    },

    /// Values fully match a regular expression
    Format { path: String, pattern: Pattern },

    /// Values are numerically equal to one of the numbers
    NumberList { path: String, numbers: Vec<f64> },

    /// Values are equal to one of the strings
    StringList { path: String, values: Vec<String> },

    /// Compare values with a literal
    SimpleValue {
        path: String,
        operator: Operator,
        value: Value,
    },

    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Xor(Box<Expression>, Box<Expression>),
    Imply(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),

    /// The inner expression passes for at least one element at the path
    Exist {
        path: String,
        expression: Box<Expression>,
    },

    /// The inner expression passes for every element at the path
    ForAll {
        path: String,
        expression: Box<Expression>,
    },
}

impl Expression {
    pub fn presence(path: impl Into<String>) -> Self {
        Self::Presence { path: path.into() }
    }

    pub fn path_value(path1: impl Into<String>, operator: Operator, path2: impl Into<String>) -> Self {
        Self::PathValue {
            path1: path1.into(),
            operator,
            path2: path2.into(),
        }
    }

    pub fn plain_text(path: impl Into<String>, text: impl Into<String>, ignore_case: bool) -> Self {
        Self::PlainText {
            path: path.into(),
            text: text.into(),
            ignore_case,
        }
    }

    /// # Errors
    ///
    /// Returns an error when the pattern does not compile.
    pub fn format(path: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(Self::Format {
            path: path.into(),
            pattern: Pattern::new(pattern)?,
        })
    }

    pub fn number_list(path: impl Into<String>, numbers: Vec<f64>) -> Self {
        Self::NumberList {
            path: path.into(),
            numbers,
        }
    }

    pub fn string_list(path: impl Into<String>, values: Vec<String>) -> Self {
        Self::StringList {
            path: path.into(),
            values,
        }
    }

    pub fn simple_value(path: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self::SimpleValue {
            path: path.into(),
            operator,
            value,
        }
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    pub fn xor(left: Expression, right: Expression) -> Self {
        Self::Xor(Box::new(left), Box::new(right))
    }

    pub fn imply(left: Expression, right: Expression) -> Self {
        Self::Imply(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)] // Mirrors the NOT node, not std::ops::Not.
    pub fn not(inner: Expression) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn exist(path: impl Into<String>, expression: Expression) -> Self {
        Self::Exist {
            path: path.into(),
            expression: Box::new(expression),
        }
    }

    pub fn for_all(path: impl Into<String>, expression: Expression) -> Self {
        Self::ForAll {
            path: path.into(),
            expression: Box::new(expression),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Presence { path } => write!(f, "Presence({path})"),
            Self::PathValue {
                path1,
                operator,
                path2,
            } => write!(f, "PathValue({path1} {operator} {path2})"),
            Self::PlainText {
                path,
                text,
                ignore_case,
            } => write!(f, "PlainText({path}, '{text}', ignore_case={ignore_case})"),
            Self::Format { path, pattern } => write!(f, "Format({path}, /{}/)", pattern.as_str()),
            Self::NumberList { path, numbers } => {
                let items: Vec<String> = numbers.iter().map(ToString::to_string).collect();
                write!(f, "NumberList({path}, [{}])", items.join(", "))
            }
            Self::StringList { path, values } => {
                write!(f, "StringList({path}, [{}])", values.join(", "))
            }
            Self::SimpleValue {
                path,
                operator,
                value,
            } => write!(f, "SimpleValue({path} {operator} {value})"),
            Self::And(l, r) => write!(f, "AND({l}, {r})"),
            Self::Or(l, r) => write!(f, "OR({l}, {r})"),
            Self::Xor(l, r) => write!(f, "XOR({l}, {r})"),
            Self::Imply(l, r) => write!(f, "IMPLY({l}, {r})"),
            Self::Not(inner) => write!(f, "NOT({inner})"),
            Self::Exist { path, expression } => write!(f, "EXIST({path}, {expression})"),
            Self::ForAll { path, expression } => write!(f, "FORALL({path}, {expression})"),
        }
    }
}
