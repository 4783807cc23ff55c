#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # hl7-validation
//!
//! Validation of bound HL7 v2 messages against their message profile.
//!
//! Three independent checks produce report entries: the structure check
//! walks the requirement tree (usage, cardinality, length, format), the
//! content check evaluates the profile's constraints and predicates, and
//! the value-set check looks coded values up in a [`ValueSetLibrary`].
//! The [`ValidationEngine`] runs them concurrently and merges the results
//! into one [`Report`].
//!
//! ## Example Usage
//!
//! ```rust
//! use hl7_validation::check_structure;
//! use hl7_ir::{Complex, Location, Message, Range, Req, Separators, Usage};
//! use std::sync::Arc;
//!
//! let reqs: Arc<[Req]> = Arc::from(vec![
//!     Req::new(1, Usage::R, Range::unbounded(1)).named("MSH"),
//! ]);
//! let root = Complex::new(1, 1, Location::new("", "ADT_A01", 1, 1), reqs);
//! let message = Message::new("ADT_A01", root, Separators::default());
//!
//! let entries = check_structure(&message);
//! assert_eq!(entries.len(), 1);
//! ```
//!
//! [`ValueSetLibrary`]: hl7_profile::ValueSetLibrary

pub mod content;
pub mod engine;
pub mod report;
pub mod structure;
pub mod vs;

pub use content::check_content;
pub use engine::{ValidationConfig, ValidationEngine};
pub use report::{CEntry, Classification, Report, SEntry, VSEntry};
pub use structure::{StructureValidator, check_structure};
pub use vs::check_value_sets;

use thiserror::Error;

/// Errors that prevent a validation run from producing a report
#[derive(Error, Debug)]
pub enum Error {
    #[error("No profile registered for message '{0}'")]
    UnknownMessage(String),

    #[error("Profile error: {0}")]
    Profile(#[from] hl7_profile::Error),

    #[error("Validation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
