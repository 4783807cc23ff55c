#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # hl7-profile
//!
//! Message profiles and the data they are checked against.
//!
//! A [`MessageProfile`] holds the requirement tree of one message type, its
//! content constraints and predicates, and its value-set bindings. Profiles
//! are loaded from YAML or JSON by the [`ProfileLoader`] and cached in a
//! concurrent [`ProfileRegistry`]. The [`Binder`] turns an already split
//! message into the instance tree the validators walk.

pub mod binder;
pub mod loader;
pub mod model;
pub mod registry;
pub mod valueset;

pub use binder::{Binder, RawMessage, RawNode};
pub use loader::ProfileLoader;
pub use model::{ContentConstraint, MessageProfile, Predicate};
pub use registry::ProfileRegistry;
pub use valueset::{
    BindingLocation, BindingStrength, Code, CodeUsage, Extensibility, InMemoryValueSetLibrary,
    Stability, ValueSet, ValueSetBinding, ValueSetLibrary, ValueSetSpec,
};

use thiserror::Error;

/// Errors that can occur when loading, registering or binding profiles
#[derive(Error, Debug)]
pub enum Error {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Invalid profile format: {0}")]
    InvalidFormat(String),

    #[error("Invalid profile '{profile}': {reason}")]
    Invalid { profile: String, reason: String },

    #[error("Invalid expression in '{id}': {source}")]
    Expression {
        id: String,
        #[source]
        source: hl7_expression::Error,
    },

    #[error("Binding error: {0}")]
    Binding(String),

    #[error(transparent)]
    Ir(#[from] hl7_ir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an invalid-profile error.
    pub fn invalid(profile: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            profile: profile.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
