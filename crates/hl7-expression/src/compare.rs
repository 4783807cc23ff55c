//! Typed comparison of values
//!
//! Both sides are compared in a common type. A text side is read in the type
//! of the other side, and a date is placed on the calendar of a date time.
//! Any other pair of different types, a null side, an ordering operator on
//! text or a malformed lexeme make the comparison undecidable.
//! Undecidable comparisons are reported as `Err` with a message and become
//! `Inconclusive` results, never failures.

use crate::ast::Operator;
use hl7_ir::format::{parse_number, parse_temporal};
use hl7_ir::{DataType, Value};
use std::cmp::Ordering;

/// Compare two values with an operator
///
/// # Errors
///
/// Returns the reason why the values cannot be compared.
pub fn compare(left: &Value, operator: Operator, right: &Value) -> Result<bool, String> {
    let (Some(left_type), Some(right_type)) = (left.data_type(), right.data_type()) else {
        return Err("a null value cannot be compared".to_string());
    };

    let (left_type, right_type) = match (left_type, right_type) {
        (l, r) if l == r => (l, r),
        (DataType::Text, typed) | (typed, DataType::Text) => (typed, typed),
        (l @ (DataType::Date | DataType::DateTime), r @ (DataType::Date | DataType::DateTime)) => (l, r),
        (l, r) => return Err(format!("cannot compare {l} with {r}")),
    };

    if operator.is_ordering() && !left_type.is_ordered() {
        return Err(format!("operator {operator} is not defined for {left_type} values"));
    }

    let ordering = order((left_type, left.raw()), (right_type, right.raw()))?;
    Ok(operator.holds(ordering))
}

/// Order two lexemes, each read in its own type
fn order(left: (DataType, &str), right: (DataType, &str)) -> Result<Ordering, String> {
    match (left, right) {
        ((DataType::Text, l), (DataType::Text, r)) => Ok(l.cmp(r)),
        ((DataType::Number, l), (DataType::Number, r)) => {
            let (a, b) = (parse_number(l)?, parse_number(r)?);
            a.partial_cmp(&b)
                .ok_or_else(|| format!("cannot order {l} and {r}"))
        }
        ((l_type, l), (r_type, r)) => {
            let a = parse_temporal(l_type, l)?;
            let b = parse_temporal(r_type, r)?;
            Ok(a.cmp(&b))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(raw: &str) -> Value {
        Value::new(DataType::Number, raw)
    }

    #[test]
    fn test_text_equality() {
        let a = Value::text("abc");
        assert_eq!(compare(&a, Operator::Eq, &Value::text("abc")), Ok(true));
        assert_eq!(compare(&a, Operator::Ne, &Value::text("ABC")), Ok(true));
    }

    #[test]
    fn test_text_ordering_is_undecidable() {
        let a = Value::text("a");
        assert!(compare(&a, Operator::Lt, &Value::text("b")).is_err());
    }

    #[test]
    fn test_numbers_compare_numerically() {
        assert_eq!(compare(&num("2.0"), Operator::Eq, &num("2")), Ok(true));
        assert_eq!(compare(&num("10"), Operator::Gt, &num("9.5")), Ok(true));
        assert_eq!(compare(&num("-1"), Operator::Ge, &num("0")), Ok(false));
    }

    #[test]
    fn test_text_side_takes_typed_side() {
        assert_eq!(compare(&Value::text("3"), Operator::Lt, &num("4")), Ok(true));
        assert!(compare(&Value::text("x"), Operator::Eq, &num("4")).is_err());
    }

    #[test]
    fn test_mixed_types_and_null() {
        let date = Value::new(DataType::Date, "20240101");
        assert!(compare(&num("1"), Operator::Eq, &date).is_err());
        assert!(compare(&Value::Null, Operator::Eq, &num("1")).is_err());
    }

    #[test]
    fn test_temporal_ordering() {
        let a = Value::new(DataType::DateTime, "202401151200");
        let b = Value::new(DataType::DateTime, "202401151300+0100");
        assert_eq!(compare(&a, Operator::Eq, &b), Ok(true));

        let early = Value::new(DataType::Date, "2023");
        let late = Value::new(DataType::Date, "20240301");
        assert_eq!(compare(&early, Operator::Lt, &late), Ok(true));
        assert!(compare(&Value::new(DataType::Date, "2024-03"), Operator::Lt, &late).is_err());
    }

    #[test]
    fn test_date_against_date_time() {
        let date = Value::new(DataType::Date, "20240115");
        let noon = Value::new(DataType::DateTime, "202401151200");
        assert_eq!(compare(&date, Operator::Lt, &noon), Ok(true));
        assert_eq!(compare(&noon, Operator::Gt, &date), Ok(true));
        assert_eq!(
            compare(&date, Operator::Eq, &Value::new(DataType::DateTime, "202401150000")),
            Ok(true)
        );
        assert_eq!(
            compare(&Value::new(DataType::Date, "2024"), Operator::Eq, &Value::new(DataType::DateTime, "2024")),
            Ok(true)
        );
    }

    #[test]
    fn test_time_of_day_has_no_calendar_position() {
        let time = Value::new(DataType::Time, "1200");
        assert!(compare(&time, Operator::Lt, &Value::new(DataType::DateTime, "202401151300")).is_err());
        assert!(compare(&time, Operator::Eq, &Value::new(DataType::Date, "20240115")).is_err());
    }
}
