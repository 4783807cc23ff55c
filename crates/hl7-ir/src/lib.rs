#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # hl7-ir
//!
//! Instance tree model for position-addressed HL7 v2 messages.
//!
//! A parsed message is a tree of [`Element`]s: simple elements carry a typed
//! [`Value`], complex elements carry ordered children together with the
//! requirements ([`Req`]) their children must satisfy. Every element knows
//! its [`Location`] so that validation findings can point back at the source.

/// Source locations attached to elements and report entries.
pub mod location;
/// Encoding characters and escape sequence handling.
pub mod separators;
/// Typed values and their declared data types.
pub mod value;
/// Lexical validators and parsers for numeric and temporal values.
pub mod format;
/// Requirement model: usage, cardinality and length ranges.
pub mod requirement;
/// Simple and complex elements of the instance tree.
pub mod element;
/// Message container with separators and side lists.
pub mod message;
/// Position paths and their resolution against an element.
pub mod path;

pub use element::{Complex, Element, Simple};
pub use location::Location;
pub use message::{Line, Message};
pub use path::{Instance, Path, Step};
pub use requirement::{Max, Range, Req, Usage};
pub use separators::Separators;
pub use value::{DataType, NULL_LITERAL, Value};

use thiserror::Error;

/// Errors that can occur when working with the instance model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid range [{min}, {max}]: minimum exceeds maximum")]
    InvalidRange { min: u32, max: u32 },

    #[error("Invalid requirement at '{context}': {reason}")]
    InvalidRequirement { context: String, reason: String },

    #[error("Invalid separators '{encoding}': {reason}")]
    InvalidSeparators { encoding: String, reason: String },
}

impl Error {
    /// Build an invalid-path error with input path and parsing reason.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build an invalid-requirement error for a requirement tree node.
    pub fn invalid_requirement(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequirement {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Build an invalid-separators error with the offending encoding characters.
    pub fn invalid_separators(encoding: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSeparators {
            encoding: encoding.into(),
            reason: reason.into(),
        }
    }
}

/// Crate-local result type for instance model operations.
pub type Result<T> = std::result::Result<T, Error>;
