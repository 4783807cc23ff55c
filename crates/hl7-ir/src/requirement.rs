//! Requirement model shared by the profile and the instance tree

use crate::value::DataType;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Usage contract of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Usage {
    /// Required
    R,
    /// Required, but may be empty
    RE,
    /// Forbidden
    X,
    /// Present is a warning
    W,
    /// Optional
    O,
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::R => "R",
            Self::RE => "RE",
            Self::X => "X",
            Self::W => "W",
            Self::O => "O",
        };
        f.write_str(s)
    }
}

/// Upper bound of a range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Max {
    Finite(u32),
    Unbounded,
}

impl fmt::Display for Max {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(n) => write!(f, "{n}"),
            Self::Unbounded => f.write_str("*"),
        }
    }
}

impl Serialize for Max {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Finite(n) => serializer.serialize_u32(*n),
            Self::Unbounded => serializer.serialize_str("*"),
        }
    }
}

impl<'de> Deserialize<'de> for Max {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u32),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(Self::Finite(n)),
            Repr::Text(s) if s == "*" => Ok(Self::Unbounded),
            Repr::Text(s) => s.parse().map(Self::Finite).map_err(|_| {
                serde::de::Error::custom(format!("invalid range maximum '{s}', expected a number or '*'"))
            }),
        }
    }
}

/// Inclusive range with an optionally unbounded maximum
///
/// The `min <= max` invariant is enforced by [`Range::new`] and on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RangeRepr")]
pub struct Range {
    pub min: u32,
    pub max: Max,
}

#[derive(Deserialize)]
struct RangeRepr {
    min: u32,
    max: Max,
}

impl TryFrom<RangeRepr> for Range {
    type Error = Error;

    fn try_from(repr: RangeRepr) -> Result<Self> {
        Self::new(repr.min, repr.max)
    }
}

impl Range {
    /// Create a range
    ///
    /// # Errors
    ///
    /// Returns an error when a finite maximum is lower than the minimum.
    pub fn new(min: u32, max: Max) -> Result<Self> {
        if let Max::Finite(max) = max {
            if min > max {
                return Err(Error::InvalidRange { min, max });
            }
        }
        Ok(Self { min, max })
    }

    /// Range with a finite maximum
    ///
    /// # Errors
    ///
    /// Returns an error when `min > max`.
    pub fn bounded(min: u32, max: u32) -> Result<Self> {
        Self::new(min, Max::Finite(max))
    }

    /// Range without upper bound
    #[must_use]
    pub fn unbounded(min: u32) -> Self {
        Self {
            min,
            max: Max::Unbounded,
        }
    }

    /// `n >= min` and, when bounded, `n <= max`
    #[must_use]
    pub fn contains(&self, n: usize) -> bool {
        n >= self.min as usize && !self.is_exceeded_by(n)
    }

    /// `n > max` for a finite maximum; never true for an unbounded range
    #[must_use]
    pub fn is_exceeded_by(&self, n: usize) -> bool {
        match self.max {
            Max::Finite(max) => n > max as usize,
            Max::Unbounded => false,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Contract of one child position, as declared by the profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Req {
    /// 1-based position within the parent
    pub position: u32,

    /// Short name (segment or group id); empty for fields and components
    #[serde(default)]
    pub name: String,

    /// Human readable description
    #[serde(default)]
    pub description: String,

    /// Usage contract
    pub usage: Usage,

    /// Allowed repetitions
    pub cardinality: Range,

    /// Allowed value length (simple elements only)
    #[serde(default)]
    pub length: Option<Range>,

    /// Declared data type of simple elements
    #[serde(default)]
    pub data_type: DataType,

    /// Requirements of the element's own children; empty for simple elements
    #[serde(default)]
    pub children: Arc<[Req]>,
}

impl Req {
    /// Create a requirement for a simple position
    pub fn new(position: u32, usage: Usage, cardinality: Range) -> Self {
        Self {
            position,
            name: String::new(),
            description: String::new(),
            usage,
            cardinality,
            length: None,
            data_type: DataType::Text,
            children: Arc::from(Vec::new()),
        }
    }

    /// Set the short name
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the description
    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the length range
    #[must_use]
    pub fn with_length(mut self, length: Range) -> Self {
        self.length = Some(length);
        self
    }

    /// Set the declared data type
    #[must_use]
    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Set the child requirements, making this a complex position
    #[must_use]
    pub fn with_children(mut self, children: Vec<Req>) -> Self {
        self.children = Arc::from(children);
        self
    }

    /// Whether this position holds complex elements
    #[must_use]
    pub fn is_complex(&self) -> bool {
        !self.children.is_empty()
    }

    /// Label used in messages: the name when present, else the position
    #[must_use]
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.position.to_string()
        } else {
            self.name.clone()
        }
    }

    /// Check a requirement list recursively: positions are non-zero and unique
    ///
    /// Ranges cannot be malformed once built, so only positions are checked here.
    ///
    /// # Errors
    ///
    /// Returns the first malformed requirement found.
    pub fn validate_all(reqs: &[Req], context: &str) -> Result<()> {
        let mut seen = HashSet::new();
        for req in reqs {
            if req.position == 0 {
                return Err(Error::invalid_requirement(
                    context,
                    format!("requirement '{}' has position 0", req.label()),
                ));
            }
            if !seen.insert(req.position) {
                return Err(Error::invalid_requirement(
                    context,
                    format!("position {} is declared more than once", req.position),
                ));
            }
            if req.is_complex() && req.length.is_some() {
                return Err(Error::invalid_requirement(
                    context,
                    format!("complex position {} declares a length", req.position),
                ));
            }
            let child_context = if context.is_empty() {
                req.label()
            } else {
                format!("{context}.{}", req.label())
            };
            Self::validate_all(&req.children, &child_context)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_invariant() {
        assert!(Range::bounded(1, 4).is_ok());
        assert!(Range::bounded(2, 2).is_ok());
        assert_eq!(
            Range::bounded(3, 1),
            Err(Error::InvalidRange { min: 3, max: 1 })
        );
        assert!(Range::new(5, Max::Unbounded).is_ok());
    }

    #[test]
    fn test_range_semantics() {
        let r = Range::bounded(1, 4).unwrap();
        assert!(!r.contains(0));
        assert!(r.contains(1));
        assert!(r.contains(4));
        assert!(!r.contains(5));
        assert!(r.is_exceeded_by(5));
        assert!(!r.is_exceeded_by(4));

        let open = Range::unbounded(3);
        assert!(!open.contains(2));
        assert!(open.contains(3_000));
        assert!(!open.is_exceeded_by(usize::MAX));
    }

    #[test]
    fn test_range_display() {
        assert_eq!(Range::bounded(0, 1).unwrap().to_string(), "[0, 1]");
        assert_eq!(Range::unbounded(1).to_string(), "[1, *]");
    }

    #[test]
    fn test_range_deserialize() {
        let r: Range = serde_json::from_str(r#"{"min": 1, "max": "*"}"#).unwrap();
        assert_eq!(r, Range::unbounded(1));

        let r: Range = serde_json::from_str(r#"{"min": 0, "max": 3}"#).unwrap();
        assert_eq!(r, Range::bounded(0, 3).unwrap());

        let r: Range = serde_json::from_str(r#"{"min": 0, "max": "3"}"#).unwrap();
        assert_eq!(r.max, Max::Finite(3));

        assert!(serde_json::from_str::<Range>(r#"{"min": 4, "max": 3}"#).is_err());
        assert!(serde_json::from_str::<Range>(r#"{"min": 1, "max": "many"}"#).is_err());
    }

    #[test]
    fn test_range_serialize() {
        let json = serde_json::to_string(&Range::unbounded(2)).unwrap();
        assert_eq!(json, r#"{"min":2,"max":"*"}"#);
    }

    #[test]
    fn test_req_builder() {
        let req = Req::new(3, Usage::R, Range::bounded(1, 1).unwrap())
            .named("PID")
            .described("Patient Identification")
            .with_children(vec![Req::new(1, Usage::O, Range::unbounded(0))]);

        assert_eq!(req.label(), "PID");
        assert!(req.is_complex());
        assert_eq!(req.children.len(), 1);
        assert_eq!(Req::new(7, Usage::O, Range::unbounded(0)).label(), "7");
    }

    #[test]
    fn test_validate_all() {
        let one = Range::bounded(1, 1).unwrap();
        let good = vec![
            Req::new(1, Usage::R, one),
            Req::new(2, Usage::O, one).with_children(vec![Req::new(1, Usage::O, one)]),
        ];
        assert!(Req::validate_all(&good, "").is_ok());

        let zero = vec![Req::new(0, Usage::R, one)];
        assert!(Req::validate_all(&zero, "").is_err());

        let duplicate = vec![Req::new(1, Usage::R, one), Req::new(1, Usage::O, one)];
        assert!(Req::validate_all(&duplicate, "").is_err());

        let nested = vec![Req::new(1, Usage::R, one).named("PID").with_children(vec![
            Req::new(2, Usage::O, one),
            Req::new(2, Usage::O, one),
        ])];
        let err = Req::validate_all(&nested, "ADT_A01").unwrap_err();
        assert!(err.to_string().contains("ADT_A01.PID"));
    }

    #[test]
    fn test_usage_serde() {
        let u: Usage = serde_json::from_str(r#""RE""#).unwrap();
        assert_eq!(u, Usage::RE);
        assert_eq!(Usage::X.to_string(), "X");
    }
}
