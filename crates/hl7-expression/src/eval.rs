//! Expression evaluator
//!
//! Evaluation is a single exhaustive match over the AST. Leaves resolve their
//! path against the context element and must hold for every element found.
//! Combinators evaluate left to right: `AND` and `OR` stop at the first side
//! that decides them (or that cannot be decided), `XOR` and `IMPLY` always
//! evaluate both sides. A combinator that cannot be decided puts its own
//! trace on top of the traces of the operands that did not pass.

use crate::ast::{Expression, Operator};
use crate::compare::compare;
use crate::result::{EvalResult, Reason, Trace};
use hl7_ir::format::parse_number;
use hl7_ir::{DataType, Element, Location, Path, Separators, Value};
use std::cmp::Ordering;
use tracing::trace;

/// Evaluate an expression against a context element
pub fn evaluate(expression: &Expression, context: &Element, separators: &Separators) -> EvalResult {
    let result = Evaluator::new(separators).evaluate(expression, context);
    trace!(
        expression = %expression,
        context = %context.location(),
        pass = result.is_pass(),
        "evaluated expression"
    );
    result
}

/// Evaluator bound to the separators of one message
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'s> {
    separators: &'s Separators,
}

/// Outcome of a leaf check on one value: `Ok(None)` holds, `Ok(Some)` is a
/// violation message, `Err` is the reason the value cannot be checked.
type Check = Result<Option<String>, String>;

impl<'s> Evaluator<'s> {
    /// Create a new evaluator
    #[must_use]
    pub fn new(separators: &'s Separators) -> Self {
        Self { separators }
    }

    /// Evaluate an expression against a context element
    #[must_use]
    pub fn evaluate(&self, expression: &Expression, context: &Element) -> EvalResult {
        match expression {
            Expression::Presence { path } => self.presence(expression, path, context),
            Expression::PathValue {
                path1,
                operator,
                path2,
            } => self.path_value(expression, path1, *operator, path2, context),
            Expression::PlainText {
                path,
                text,
                ignore_case,
            } => self.each_value(expression, path, context, |value| {
                let raw = value.raw();
                let equal = if *ignore_case {
                    raw.to_lowercase() == text.to_lowercase()
                } else {
                    raw == text
                };
                Ok((!equal).then(|| format!("{} is not equal to '{text}'", self.describe(raw))))
            }),
            Expression::Format { path, pattern } => self.each_value(expression, path, context, |value| {
                let raw = value.raw();
                Ok((!pattern.is_full_match(raw))
                    .then(|| format!("{} does not match /{}/", self.describe(raw), pattern.as_str())))
            }),
            Expression::NumberList { path, numbers } => {
                self.each_value(expression, path, context, |value| {
                    let number = parse_number(value.raw())?;
                    let found = numbers
                        .iter()
                        .any(|n| n.partial_cmp(&number) == Some(Ordering::Equal));
                    Ok((!found).then(|| format!("{number} is not in the list of allowed numbers")))
                })
            }
            Expression::StringList { path, values } => {
                self.each_value(expression, path, context, |value| {
                    let raw = value.raw();
                    let found = values.iter().any(|v| v.trim() == raw);
                    Ok((!found).then(|| {
                        format!("{} is not in the list of allowed values", self.describe(raw))
                    }))
                })
            }
            Expression::SimpleValue {
                path,
                operator,
                value: literal,
            } => self.each_value(expression, path, context, |value| {
                let typed = value.coerce(literal.data_type().unwrap_or(DataType::Text));
                let holds = compare(&typed, *operator, literal)?;
                Ok((!holds).then(|| format!("{typed} {operator} {literal} does not hold")))
            }),
            Expression::And(left, right) => self.and(expression, left, right, context),
            Expression::Or(left, right) => self.or(expression, left, right, context),
            Expression::Xor(left, right) => self.xor(expression, left, right, context),
            Expression::Imply(left, right) => self.imply(expression, left, right, context),
            Expression::Not(inner) => match self.evaluate(inner, context) {
                EvalResult::Pass => EvalResult::Fail(vec![Trace::single(
                    expression,
                    context.location().clone(),
                    "the negated expression passed",
                )]),
                EvalResult::Fail(_) => EvalResult::Pass,
                EvalResult::Inconclusive(stack) => EvalResult::Inconclusive(nest(expression, stack)),
            },
            Expression::Exist {
                path,
                expression: inner,
            } => self.exist(expression, path, inner, context),
            Expression::ForAll {
                path,
                expression: inner,
            } => self.for_all(expression, path, inner, context),
        }
    }

    /// Raw lexeme, followed by its unescaped form when they differ
    fn describe(&self, raw: &str) -> String {
        let unescaped = self.separators.unescape(raw);
        if unescaped == raw {
            format!("'{raw}'")
        } else {
            format!("'{raw}' ('{unescaped}')")
        }
    }

    fn presence(&self, expression: &Expression, path: &str, context: &Element) -> EvalResult {
        let elements = match resolve(expression, path, context) {
            Ok(elements) => elements,
            Err(inconclusive) => return inconclusive,
        };

        if elements.iter().any(|e| !e.is_null()) {
            return EvalResult::Pass;
        }

        let message = if elements.is_empty() {
            format!("no element found at {path}")
        } else {
            format!("only null values found at {path}")
        };
        EvalResult::Fail(vec![Trace::single(
            expression,
            context.location().clone(),
            message,
        )])
    }

    fn path_value(
        &self,
        expression: &Expression,
        path1: &str,
        operator: Operator,
        path2: &str,
        context: &Element,
    ) -> EvalResult {
        let left = match single_value(expression, path1, context) {
            Ok(found) => found,
            Err(inconclusive) => return inconclusive,
        };
        let right = match single_value(expression, path2, context) {
            Ok(found) => found,
            Err(inconclusive) => return inconclusive,
        };

        match compare(left.1, operator, right.1) {
            Ok(true) => EvalResult::Pass,
            Ok(false) => EvalResult::Fail(vec![Trace::new(
                expression,
                vec![
                    Reason::new(
                        left.0.location().clone(),
                        format!("{} {operator} {} does not hold", left.1, right.1),
                    ),
                    Reason::new(right.0.location().clone(), format!("compared value {}", right.1)),
                ],
            )]),
            Err(message) => undecided(expression, left.0.location().clone(), message),
        }
    }

    /// Apply `check` to every value found at `path`
    fn each_value<F>(&self, expression: &Expression, path: &str, context: &Element, check: F) -> EvalResult
    where
        F: Fn(&Value) -> Check,
    {
        let elements = match resolve(expression, path, context) {
            Ok(elements) => elements,
            Err(inconclusive) => return inconclusive,
        };
        if elements.is_empty() {
            return not_found(expression, path, context);
        }

        let mut reasons = Vec::new();
        for element in elements {
            let location = element.location().clone();
            let Some(value) = element.value() else {
                return undecided(expression, location, "complex element found where a value is expected");
            };
            match check(value) {
                Ok(None) => {}
                Ok(Some(message)) => reasons.push(Reason::new(location, message)),
                Err(message) => {
                    return undecided(expression, location, message);
                }
            }
        }

        if reasons.is_empty() {
            EvalResult::Pass
        } else {
            EvalResult::Fail(vec![Trace::new(expression, reasons)])
        }
    }

    fn and(&self, expression: &Expression, left: &Expression, right: &Expression, context: &Element) -> EvalResult {
        match self.evaluate(left, context) {
            EvalResult::Pass => match self.evaluate(right, context) {
                EvalResult::Pass => EvalResult::Pass,
                EvalResult::Fail(stack) => EvalResult::Fail(nest(expression, stack)),
                EvalResult::Inconclusive(stack) => EvalResult::Inconclusive(nest(expression, stack)),
            },
            EvalResult::Fail(stack) => EvalResult::Fail(nest(expression, stack)),
            EvalResult::Inconclusive(stack) => EvalResult::Inconclusive(nest(expression, stack)),
        }
    }

    fn or(&self, expression: &Expression, left: &Expression, right: &Expression, context: &Element) -> EvalResult {
        match self.evaluate(left, context) {
            EvalResult::Pass => EvalResult::Pass,
            EvalResult::Fail(mut stack) => match self.evaluate(right, context) {
                EvalResult::Pass => EvalResult::Pass,
                EvalResult::Fail(right_stack) => {
                    stack.extend(right_stack);
                    EvalResult::Fail(nest(expression, stack))
                }
                EvalResult::Inconclusive(right_stack) => {
                    stack.extend(right_stack);
                    EvalResult::Inconclusive(nest(expression, stack))
                }
            },
            EvalResult::Inconclusive(stack) => EvalResult::Inconclusive(nest(expression, stack)),
        }
    }

    fn xor(&self, expression: &Expression, left: &Expression, right: &Expression, context: &Element) -> EvalResult {
        match (self.evaluate(left, context), self.evaluate(right, context)) {
            (l, r) if l.is_inconclusive() || r.is_inconclusive() => undecided_pair(expression, l, r),
            (EvalResult::Pass, EvalResult::Pass) => EvalResult::Fail(vec![Trace::single(
                expression,
                context.location().clone(),
                "both sides passed",
            )]),
            (EvalResult::Fail(mut stack), EvalResult::Fail(right_stack)) => {
                stack.extend(right_stack);
                EvalResult::Fail(nest(expression, stack))
            }
            _ => EvalResult::Pass,
        }
    }

    fn imply(&self, expression: &Expression, left: &Expression, right: &Expression, context: &Element) -> EvalResult {
        match (self.evaluate(left, context), self.evaluate(right, context)) {
            (l, r) if l.is_inconclusive() || r.is_inconclusive() => undecided_pair(expression, l, r),
            (EvalResult::Pass, EvalResult::Fail(stack)) => EvalResult::Fail(nest(expression, stack)),
            _ => EvalResult::Pass,
        }
    }

    fn exist(&self, expression: &Expression, path: &str, inner: &Expression, context: &Element) -> EvalResult {
        let candidates = match resolve(expression, path, context) {
            Ok(candidates) => candidates,
            Err(inconclusive) => return inconclusive,
        };
        if candidates.is_empty() {
            return not_found(expression, path, context);
        }

        // Any passing candidate decides, otherwise one undecided candidate
        // leaves the whole expression undecided.
        let mut stack = Vec::new();
        let mut inconclusive = None;
        for candidate in candidates {
            match self.evaluate(inner, candidate) {
                EvalResult::Pass => return EvalResult::Pass,
                EvalResult::Fail(traces) => stack.extend(traces),
                EvalResult::Inconclusive(traces) => {
                    inconclusive.get_or_insert(traces);
                }
            }
        }

        match inconclusive {
            Some(traces) => {
                stack.extend(traces);
                EvalResult::Inconclusive(nest(expression, stack))
            }
            None => EvalResult::Fail(nest(expression, stack)),
        }
    }

    fn for_all(&self, expression: &Expression, path: &str, inner: &Expression, context: &Element) -> EvalResult {
        let candidates = match resolve(expression, path, context) {
            Ok(candidates) => candidates,
            Err(inconclusive) => return inconclusive,
        };

        // Any failing candidate decides, otherwise one undecided candidate
        // leaves the whole expression undecided.
        let mut stack = Vec::new();
        let mut inconclusive = None;
        for candidate in candidates {
            match self.evaluate(inner, candidate) {
                EvalResult::Pass => {}
                EvalResult::Fail(traces) => stack.extend(traces),
                EvalResult::Inconclusive(traces) => {
                    inconclusive.get_or_insert(traces);
                }
            }
        }

        match inconclusive {
            _ if !stack.is_empty() => EvalResult::Fail(nest(expression, stack)),
            Some(traces) => EvalResult::Inconclusive(nest(expression, traces)),
            // Vacuously true when nothing is found.
            None => EvalResult::Pass,
        }
    }
}

fn resolve<'e>(expression: &Expression, path: &str, context: &'e Element) -> Result<Vec<&'e Element>, EvalResult> {
    Path::parse(path)
        .map(|p| p.resolve(context))
        .map_err(|e| undecided(expression, context.location().clone(), e.to_string()))
}

/// The element and value at a path that must designate exactly one simple element
fn single_value<'e>(
    expression: &Expression,
    path: &str,
    context: &'e Element,
) -> Result<(&'e Element, &'e Value), EvalResult> {
    let elements = resolve(expression, path, context)?;
    match elements.as_slice() {
        [] => Err(not_found(expression, path, context)),
        [element] => element.value().map(|v| (*element, v)).ok_or_else(|| {
            undecided(
                expression,
                element.location().clone(),
                "complex element found where a value is expected",
            )
        }),
        many => Err(undecided(
            expression,
            context.location().clone(),
            format!("{path} resolves to {} elements, expected exactly one", many.len()),
        )),
    }
}

fn not_found(expression: &Expression, path: &str, context: &Element) -> EvalResult {
    undecided(expression, context.location().clone(), format!("path not found: {path}"))
}

/// Inconclusive leaf with a single reason
fn undecided(expression: &Expression, location: Location, message: impl Into<String>) -> EvalResult {
    EvalResult::Inconclusive(vec![Trace::single(expression, location, message)])
}

/// Inconclusive binary combinator, keeping the traces of both operands that did not pass
fn undecided_pair(expression: &Expression, left: EvalResult, right: EvalResult) -> EvalResult {
    let mut stack = left.into_traces();
    stack.extend(right.into_traces());
    EvalResult::Inconclusive(nest(expression, stack))
}

/// Put the trace of a combinator on top of the traces of its operands
fn nest(expression: &Expression, stack: Vec<Trace>) -> Vec<Trace> {
    let mut nested = Vec::with_capacity(stack.len() + 1);
    nested.push(Trace::new(expression, Vec::new()));
    nested.extend(stack);
    nested
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl7_ir::{Complex, Simple};
    use std::sync::Arc;

    fn leaf(position: u32, instance: u32, value: Value) -> Element {
        Simple::new(
            position,
            instance,
            Location::new(format!("SEG-{position}[{instance}]"), "", 1, 1),
            value,
        )
        .into()
    }

    /// SEG with 1 = "XX", 2 = Number 5, 3 = null, 4 repeated ("a", "b"), 5 complex
    fn segment() -> Element {
        let mut field5 = Complex::new(5, 1, Location::new("SEG-5[1]", "", 1, 1), Arc::from(Vec::new()));
        field5.add_child(leaf(1, 1, Value::text("c1")));

        let mut seg = Complex::new(1, 1, Location::new("SEG[1]", "", 1, 1), Arc::from(Vec::new()));
        seg.add_child(leaf(1, 1, Value::text("XX")))
            .add_child(leaf(2, 1, Value::new(DataType::Number, "5")))
            .add_child(leaf(3, 1, Value::Null))
            .add_child(leaf(4, 1, Value::text("a")))
            .add_child(leaf(4, 2, Value::text("b")))
            .add_child(field5);
        seg.into()
    }

    fn eval(expression: &Expression) -> EvalResult {
        evaluate(expression, &segment(), &Separators::default())
    }

    #[test]
    fn test_presence() {
        assert!(eval(&Expression::presence("1[1]")).is_pass());
        assert!(eval(&Expression::presence("9[1]")).is_fail());
        assert!(eval(&Expression::presence("3[1]")).is_fail());
        assert!(eval(&Expression::presence("5[1].1[1]")).is_pass());
        assert!(eval(&Expression::presence("x")).is_inconclusive());
    }

    #[test]
    fn test_plain_text() {
        assert!(eval(&Expression::plain_text("1[1]", "XX", false)).is_pass());
        assert!(eval(&Expression::plain_text("1[1]", "xx", false)).is_fail());
        assert!(eval(&Expression::plain_text("1[1]", "xx", true)).is_pass());
        assert!(eval(&Expression::plain_text("9[1]", "XX", false)).is_inconclusive());
        assert!(eval(&Expression::plain_text("5[1]", "XX", false)).is_inconclusive());
    }

    #[test]
    fn test_every_repetition_must_hold() {
        assert!(eval(&Expression::plain_text("4[*]", "a", false)).is_fail());
        assert!(eval(&Expression::string_list("4", vec!["a".into(), "b".into()])).is_pass());
    }

    #[test]
    fn test_format_and_lists() {
        assert!(eval(&Expression::format("1[1]", "[A-Z]+").unwrap()).is_pass());
        assert!(eval(&Expression::format("1[1]", "[A-Z]").unwrap()).is_fail());
        assert!(eval(&Expression::number_list("2[1]", vec![1.0, 5.0])).is_pass());
        assert!(eval(&Expression::number_list("2[1]", vec![1.0])).is_fail());
        assert!(eval(&Expression::number_list("1[1]", vec![1.0])).is_inconclusive());
    }

    #[test]
    fn test_simple_value() {
        let five = Value::new(DataType::Number, "5.0");
        assert!(eval(&Expression::simple_value("2[1]", Operator::Eq, five.clone())).is_pass());
        assert!(eval(&Expression::simple_value("2[1]", Operator::Gt, five)).is_fail());
        assert!(eval(&Expression::simple_value("1[1]", Operator::Lt, Value::text("ZZ"))).is_inconclusive());
        assert!(eval(&Expression::simple_value("3[1]", Operator::Eq, Value::text("x"))).is_inconclusive());
    }

    #[test]
    fn test_path_value() {
        assert!(eval(&Expression::path_value("1[1]", Operator::Eq, "1[1]")).is_pass());
        assert!(eval(&Expression::path_value("1[1]", Operator::Eq, "4[1]")).is_fail());
        assert!(eval(&Expression::path_value("1[1]", Operator::Eq, "4[*]")).is_inconclusive());
    }

    #[test]
    fn test_failure_stack_is_nested() {
        let expr = Expression::and(
            Expression::presence("1[1]"),
            Expression::plain_text("1[1]", "YY", false),
        );
        let EvalResult::Fail(stack) = eval(&expr) else {
            panic!("expected failure");
        };
        assert_eq!(stack.len(), 2);
        assert!(stack[0].expression.starts_with("AND("));
        assert_eq!(stack[1].reasons[0].location.path, "SEG-1[1]");
    }

    #[test]
    fn test_quantifiers() {
        let is_a = Expression::plain_text(".", "a", false);
        assert!(eval(&Expression::exist("4[*]", is_a.clone())).is_pass());
        assert!(eval(&Expression::for_all("4[*]", is_a.clone())).is_fail());
        assert!(eval(&Expression::for_all("9[*]", is_a.clone())).is_pass());
        assert!(eval(&Expression::exist("9[*]", is_a)).is_inconclusive());
    }

    #[test]
    fn test_not_passes_inconclusive_through() {
        assert!(eval(&Expression::not(Expression::presence("9"))).is_pass());
        assert!(eval(&Expression::not(Expression::presence("1"))).is_fail());
        assert!(eval(&Expression::not(Expression::plain_text("9", "x", false))).is_inconclusive());
    }

    #[test]
    fn test_quantifiers_with_undecided_candidates() {
        // On 4[1] = "a" the text check passes and the number check is
        // undecided; on 4[2] = "b" the text check fails.
        let inner = Expression::and(
            Expression::plain_text(".", "a", false),
            Expression::number_list(".", vec![1.0]),
        );
        let EvalResult::Fail(stack) = eval(&Expression::for_all("4[*]", inner.clone())) else {
            panic!("a failing candidate must decide FORALL");
        };
        assert!(stack[0].expression.starts_with("FORALL"));
        assert!(stack.iter().any(|t| t.reasons.iter().any(|r| r.location.path == "SEG-4[2]")));

        let EvalResult::Inconclusive(stack) = eval(&Expression::exist("4[*]", inner)) else {
            panic!("an undecided candidate keeps EXIST undecided");
        };
        assert!(stack[0].expression.starts_with("EXIST"));

        let undecided_only = Expression::number_list(".", vec![1.0]);
        assert!(eval(&Expression::for_all("4[*]", undecided_only)).is_inconclusive());
    }

    #[test]
    fn test_and_fails_when_the_decided_operand_fails() {
        let expr = Expression::and(
            Expression::plain_text("1[1]", "YY", false),
            Expression::presence("x"),
        );
        assert!(eval(&expr).is_fail());
    }

    #[test]
    fn test_inconclusive_keeps_operand_traces() {
        let expr = Expression::or(
            Expression::plain_text("1[1]", "YY", false),
            Expression::plain_text("9[1]", "x", false),
        );
        let EvalResult::Inconclusive(stack) = eval(&expr) else {
            panic!("expected an inconclusive result");
        };
        assert_eq!(stack.len(), 3);
        assert!(stack[0].expression.starts_with("OR("));
        assert!(stack[1].reasons[0].message.contains("is not equal to 'YY'"));
        assert!(stack[2].reasons[0].message.contains("path not found: 9[1]"));

        let expr = Expression::and(
            Expression::presence("1[1]"),
            Expression::plain_text("9[1]", "x", false),
        );
        let EvalResult::Inconclusive(stack) = eval(&expr) else {
            panic!("expected an inconclusive result");
        };
        assert!(stack[0].expression.starts_with("AND("));
        assert!(stack[1].reasons[0].message.contains("path not found"));

        let EvalResult::Inconclusive(stack) = eval(&Expression::not(Expression::presence("x"))) else {
            panic!("expected an inconclusive result");
        };
        assert!(stack[0].expression.starts_with("NOT"));
        assert_eq!(stack.len(), 2);
    }
}
