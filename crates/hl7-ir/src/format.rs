//! Lexical forms of HL7 numeric and temporal values
//!
//! Each validator returns the violation message, or `None` when the lexeme is
//! well formed. The parsers used for comparison share the same rules so that
//! a value accepted by the structure check is always comparable.

use crate::value::{DataType, Value};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)$").expect("valid number pattern"));

static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(?:(\d{2})(\d{2})?)?$").expect("valid date pattern"));

static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2})(?:(\d{2})(?:(\d{2})(?:\.(\d{1,4}))?)?)?([+-]\d{4})?$")
        .expect("valid time pattern")
});

static DATE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})(?:(\d{2})(?:(\d{2})(?:(\d{2})(?:(\d{2})(?:(\d{2})(?:\.(\d{1,4}))?)?)?)?)?)?([+-]\d{4})?$",
    )
    .expect("valid date time pattern")
});

/// Check the lexeme of a typed value
#[must_use]
pub fn check(value: &Value) -> Option<String> {
    match value {
        Value::Number(raw) => check_number(raw),
        Value::Date(raw) => check_date(raw),
        Value::Time(raw) => check_time(raw),
        Value::DateTime(raw) => check_date_time(raw),
        Value::Text(_) | Value::Null => None,
    }
}

/// Validate an HL7 number (`[+-]digits[.digits]`)
#[must_use]
pub fn check_number(raw: &str) -> Option<String> {
    parse_number(raw).err()
}

/// Validate an HL7 date (`YYYY[MM[DD]]`)
#[must_use]
pub fn check_date(raw: &str) -> Option<String> {
    parse_date(raw).err()
}

/// Validate an HL7 time (`HH[MM[SS[.S[S[S[S]]]]]][+/-ZZZZ]`)
#[must_use]
pub fn check_time(raw: &str) -> Option<String> {
    parse_time(raw).err()
}

/// Validate an HL7 date time (`YYYY[MM[DD[HH[MM[SS[.S[S[S[S]]]]]]]]][+/-ZZZZ]`)
#[must_use]
pub fn check_date_time(raw: &str) -> Option<String> {
    parse_date_time(raw).err()
}

/// Parse a number lexeme
///
/// # Errors
///
/// Returns the violation message for malformed lexemes.
pub fn parse_number(raw: &str) -> Result<f64, String> {
    if !NUMBER.is_match(raw) {
        return Err(format!("'{raw}' is not a valid number"));
    }
    raw.parse::<f64>()
        .map_err(|e| format!("'{raw}' is not a valid number: {e}"))
}

/// Parse a temporal lexeme of the given type into a comparable UTC instant
///
/// Missing components default to their minimum; `Time` values are anchored
/// on 1970-01-01.
///
/// # Errors
///
/// Returns the violation message for malformed lexemes or non-temporal types.
pub fn parse_temporal(data_type: DataType, raw: &str) -> Result<NaiveDateTime, String> {
    match data_type {
        DataType::Date => parse_date(raw),
        DataType::Time => parse_time(raw),
        DataType::DateTime => parse_date_time(raw),
        DataType::Text | DataType::Number => {
            Err(format!("{data_type} is not a temporal data type"))
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDateTime, String> {
    let caps = DATE
        .captures(raw)
        .ok_or_else(|| format!("'{raw}' is not a valid date (expected YYYY[MM[DD]])"))?;
    instant(
        raw,
        Parts {
            year: component(&caps, 1, 0),
            month: component(&caps, 2, 1),
            day: component(&caps, 3, 1),
            ..Parts::default()
        },
    )
}

fn parse_time(raw: &str) -> Result<NaiveDateTime, String> {
    let caps = TIME.captures(raw).ok_or_else(|| {
        format!("'{raw}' is not a valid time (expected HH[MM[SS[.S[S[S[S]]]]]][+/-ZZZZ])")
    })?;
    instant(
        raw,
        Parts {
            year: 1970,
            month: 1,
            day: 1,
            hour: component(&caps, 1, 0),
            minute: component(&caps, 2, 0),
            second: component(&caps, 3, 0),
            fraction: caps.get(4).map(|m| m.as_str()),
            offset: caps.get(5).map(|m| m.as_str()),
        },
    )
}

fn parse_date_time(raw: &str) -> Result<NaiveDateTime, String> {
    let caps = DATE_TIME.captures(raw).ok_or_else(|| {
        format!(
            "'{raw}' is not a valid date time (expected YYYY[MM[DD[HH[MM[SS[.S[S[S[S]]]]]]]]][+/-ZZZZ])"
        )
    })?;
    instant(
        raw,
        Parts {
            year: component(&caps, 1, 0),
            month: component(&caps, 2, 1),
            day: component(&caps, 3, 1),
            hour: component(&caps, 4, 0),
            minute: component(&caps, 5, 0),
            second: component(&caps, 6, 0),
            fraction: caps.get(7).map(|m| m.as_str()),
            offset: caps.get(8).map(|m| m.as_str()),
        },
    )
}

#[derive(Default)]
struct Parts<'a> {
    year: u32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    fraction: Option<&'a str>,
    offset: Option<&'a str>,
}

fn component(caps: &Captures<'_>, index: usize, default: u32) -> u32 {
    caps.get(index)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(default)
}

fn instant(raw: &str, parts: Parts<'_>) -> Result<NaiveDateTime, String> {
    let year = i32::try_from(parts.year).map_err(|_| format!("'{raw}' has an invalid year"))?;
    let date = NaiveDate::from_ymd_opt(year, parts.month, parts.day)
        .ok_or_else(|| format!("'{raw}' is not a valid calendar date"))?;

    let nanos = match parts.fraction {
        Some(fraction) => format!("{fraction:0<9}")
            .parse::<u32>()
            .map_err(|_| format!("'{raw}' has an invalid fraction of second"))?,
        None => 0,
    };
    let time = NaiveTime::from_hms_nano_opt(parts.hour, parts.minute, parts.second, nanos)
        .ok_or_else(|| format!("'{raw}' is not a valid time of day"))?;

    let local = NaiveDateTime::new(date, time);
    match parts.offset {
        Some(offset) => {
            let shift = offset_minutes(offset)
                .ok_or_else(|| format!("'{raw}' has an invalid time zone offset '{offset}'"))?;
            local
                .checked_sub_signed(TimeDelta::minutes(shift))
                .ok_or_else(|| format!("'{raw}' is out of the representable range"))
        }
        None => Ok(local),
    }
}

/// Signed offset in minutes for `+HHMM` / `-HHMM`
fn offset_minutes(offset: &str) -> Option<i64> {
    let (sign, digits) = match offset.split_at(1) {
        ("+", digits) => (1, digits),
        ("-", digits) => (-1, digits),
        _ => return None,
    };
    let hours: i64 = digits.get(..2)?.parse().ok()?;
    let minutes: i64 = digits.get(2..4)?.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 60 + minutes))
}
