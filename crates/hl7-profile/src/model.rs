//! Profile model definitions
#![allow(clippy::must_use_candidate)] // Builder/constructor API intentionally omits pervasive #[must_use].
#![allow(clippy::return_self_not_must_use)] // Fluent builder methods return Self for ergonomics.

use crate::valueset::ValueSetBinding;
use crate::{Error, Result};
use hl7_expression::Expression;
use hl7_ir::{Path, Req, Usage};
use std::sync::Arc;

/// A content rule, evaluated once per element found at `context`
#[derive(Debug, Clone, PartialEq)]
pub struct ContentConstraint {
    pub id: String,
    pub description: String,
    /// Path from the message root; empty for the root itself
    pub context: String,
    pub expression: Expression,
}

impl ContentConstraint {
    pub fn new(id: impl Into<String>, context: impl Into<String>, expression: Expression) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            context: context.into(),
            expression,
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Conditional usage: `target` takes `true_usage` when `condition` passes,
/// `false_usage` when it fails
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub id: String,
    pub description: String,
    /// Path from the message root the condition and target are relative to
    pub context: String,
    pub target: String,
    pub condition: Expression,
    pub true_usage: Usage,
    pub false_usage: Usage,
}

impl Predicate {
    pub fn new(
        id: impl Into<String>,
        context: impl Into<String>,
        target: impl Into<String>,
        condition: Expression,
        true_usage: Usage,
        false_usage: Usage,
    ) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            context: context.into(),
            target: target.into(),
            condition,
            true_usage,
            false_usage,
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Usage in force for a condition outcome
    pub fn usage(&self, condition_passed: bool) -> Usage {
        if condition_passed {
            self.true_usage
        } else {
            self.false_usage
        }
    }
}

/// Everything a message of one type is checked against
#[derive(Debug, Clone, PartialEq)]
pub struct MessageProfile {
    /// Message identifier (e.g. `ADT_A01`)
    pub id: String,
    pub description: String,
    /// Requirements of the root's children (segments and groups)
    pub structure: Arc<[Req]>,
    pub constraints: Vec<ContentConstraint>,
    pub predicates: Vec<Predicate>,
    pub value_set_bindings: Vec<ValueSetBinding>,
}

impl MessageProfile {
    /// Create a new profile with a structure and no content rules
    pub fn new(id: impl Into<String>, structure: Vec<Req>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            structure: Arc::from(structure),
            constraints: Vec::new(),
            predicates: Vec::new(),
            value_set_bindings: Vec::new(),
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_constraint(mut self, constraint: ContentConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn with_binding(mut self, binding: ValueSetBinding) -> Self {
        self.value_set_bindings.push(binding);
        self
    }

    /// Check the profile before it is used
    ///
    /// The requirement tree must be well formed and every context and target
    /// path must parse. Expression paths are not checked here: a malformed
    /// one only makes its constraint inconclusive.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        Req::validate_all(&self.structure, &self.id)?;

        let mut ids = std::collections::HashSet::new();
        for constraint in &self.constraints {
            if !ids.insert(constraint.id.as_str()) {
                return Err(Error::invalid(
                    &self.id,
                    format!("constraint id '{}' is used more than once", constraint.id),
                ));
            }
            Path::parse(&constraint.context)?;
        }
        for predicate in &self.predicates {
            Path::parse(&predicate.context)?;
            Path::parse(&predicate.target)?;
        }
        for binding in &self.value_set_bindings {
            Path::parse(&binding.target)?;
        }
        Ok(())
    }
}
