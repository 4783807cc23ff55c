//! Content check: constraints and conditional usage predicates

use crate::report::CEntry;
use hl7_expression::{EvalResult, Evaluator, Trace};
use hl7_ir::{Element, Message, Path, Usage};
use hl7_profile::{ContentConstraint, MessageProfile, Predicate};
use tracing::debug;

/// Evaluate every constraint and predicate of a profile against a message
#[must_use]
pub fn check_content(message: &Message, profile: &MessageProfile) -> Vec<CEntry> {
    let evaluator = Evaluator::new(&message.separators);
    let mut entries = Vec::new();

    for constraint in &profile.constraints {
        entries.extend(check_constraint(&evaluator, &message.root, constraint));
    }
    for predicate in &profile.predicates {
        entries.extend(check_predicate(&evaluator, &message.root, predicate));
    }

    debug!(
        "Content check of {}: {} constraints, {} predicates, {} entries",
        message.id,
        profile.constraints.len(),
        profile.predicates.len(),
        entries.len()
    );
    entries
}

/// One entry per element the constraint's context resolves to
///
/// A context that resolves to nothing yields no entry: the constraint does
/// not apply to this message.
#[must_use]
pub fn check_constraint(
    evaluator: &Evaluator<'_>,
    root: &Element,
    constraint: &ContentConstraint,
) -> Vec<CEntry> {
    let contexts = match Path::parse(&constraint.context) {
        Ok(path) => path.resolve(root),
        Err(e) => {
            return vec![CEntry::SpecError {
                location: root.location().clone(),
                id: constraint.id.clone(),
                description: constraint.description.clone(),
                stack: vec![Trace::single(&constraint.expression, root.location().clone(), e.to_string())],
            }];
        }
    };

    contexts
        .into_iter()
        .map(|context| {
            let location = context.location().clone();
            let id = constraint.id.clone();
            let description = constraint.description.clone();
            match evaluator.evaluate(&constraint.expression, context) {
                EvalResult::Pass => CEntry::Success { location, id, description },
                EvalResult::Fail(stack) => CEntry::Failure {
                    location,
                    id,
                    description,
                    stack,
                },
                EvalResult::Inconclusive(stack) => CEntry::SpecError {
                    location,
                    id,
                    description,
                    stack,
                },
            }
        })
        .collect()
}

/// Enforce the usage a predicate's condition selects on its target
///
/// `R` needs at least one non-null target element, `X` forbids any; other
/// usages are always satisfied.
#[must_use]
pub fn check_predicate(evaluator: &Evaluator<'_>, root: &Element, predicate: &Predicate) -> Vec<CEntry> {
    let spec_error = |location: &hl7_ir::Location, stack: Vec<Trace>| CEntry::PredicateSpecError {
        location: location.clone(),
        id: predicate.id.clone(),
        description: predicate.description.clone(),
        stack,
    };

    let (context, target) = match (Path::parse(&predicate.context), Path::parse(&predicate.target)) {
        (Ok(context), Ok(target)) => (context, target),
        (Err(e), _) | (_, Err(e)) => {
            let location = root.location();
            let trace = Trace::single(&predicate.condition, location.clone(), e.to_string());
            return vec![spec_error(location, vec![trace])];
        }
    };

    context
        .resolve(root)
        .into_iter()
        .map(|element| {
            let location = element.location();
            let passed = match evaluator.evaluate(&predicate.condition, element) {
                EvalResult::Pass => true,
                EvalResult::Fail(_) => false,
                EvalResult::Inconclusive(stack) => return spec_error(location, stack),
            };

            let usage = predicate.usage(passed);
            let present = target.resolve(element).iter().any(|e| !e.is_null());
            let violated = match usage {
                Usage::R => !present,
                Usage::X => present,
                Usage::RE | Usage::W | Usage::O => false,
            };

            if violated {
                CEntry::PredicateFailure {
                    location: location.clone(),
                    id: predicate.id.clone(),
                    description: predicate.description.clone(),
                    usage,
                    target: predicate.target.clone(),
                }
            } else {
                CEntry::PredicateSuccess {
                    location: location.clone(),
                    id: predicate.id.clone(),
                    description: predicate.description.clone(),
                    usage,
                }
            }
        })
        .collect()
}
