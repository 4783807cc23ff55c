//! Typed values carried by simple elements

use serde::{Deserialize, Serialize};
use std::fmt;

/// The HL7 explicit null (`""`), meaning "no content present"
pub const NULL_LITERAL: &str = "\"\"";

/// Declared data type of a simple element or literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    Text,
    Number,
    Date,
    Time,
    DateTime,
}

impl DataType {
    /// Parse a data type name as used in profiles (`Number`, `DateTime`, ...)
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Text" | "String" | "ST" => Some(Self::Text),
            "Number" | "NM" => Some(Self::Number),
            "Date" | "DT" => Some(Self::Date),
            "Time" | "TM" => Some(Self::Time),
            "DateTime" | "DTM" => Some(Self::DateTime),
            _ => None,
        }
    }

    /// Whether values of this type have a total order (GT/LT comparisons)
    #[must_use]
    pub fn is_ordered(self) -> bool {
        !matches!(self, Self::Text)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "Text",
            Self::Number => "Number",
            Self::Date => "Date",
            Self::Time => "Time",
            Self::DateTime => "DateTime",
        };
        f.write_str(name)
    }
}

/// A value as found in the message; lexemes are kept raw and escaped
///
/// Numeric and temporal lexemes are not checked here. The structure
/// validator reports malformed ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "raw")]
pub enum Value {
    Text(String),
    Number(String),
    Date(String),
    Time(String),
    DateTime(String),
    Null,
}

impl Value {
    /// Create a value of the given type; the HL7 null literal yields [`Value::Null`]
    pub fn new(data_type: DataType, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw == NULL_LITERAL {
            return Self::Null;
        }
        match data_type {
            DataType::Text => Self::Text(raw),
            DataType::Number => Self::Number(raw),
            DataType::Date => Self::Date(raw),
            DataType::Time => Self::Time(raw),
            DataType::DateTime => Self::DateTime(raw),
        }
    }

    /// Create a text value
    pub fn text(raw: impl Into<String>) -> Self {
        Self::new(DataType::Text, raw)
    }

    /// Raw (possibly escaped) lexeme; the null literal for [`Value::Null`]
    #[must_use]
    pub fn raw(&self) -> &str {
        match self {
            Self::Text(s) | Self::Number(s) | Self::Date(s) | Self::Time(s) | Self::DateTime(s) => {
                s
            }
            Self::Null => NULL_LITERAL,
        }
    }

    /// Data type tag, `None` for null
    #[must_use]
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Text(_) => Some(DataType::Text),
            Self::Number(_) => Some(DataType::Number),
            Self::Date(_) => Some(DataType::Date),
            Self::Time(_) => Some(DataType::Time),
            Self::DateTime(_) => Some(DataType::DateTime),
            Self::Null => None,
        }
    }

    /// Re-tag the raw lexeme with another data type
    #[must_use]
    pub fn coerce(&self, data_type: DataType) -> Self {
        match self {
            Self::Null => Self::Null,
            other => Self::new(data_type, other.raw()),
        }
    }

    /// Check if value is null
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data_type() {
            Some(data_type) => write!(f, "{data_type}('{}')", self.raw()),
            None => f.write_str("Null"),
        }
    }
}
