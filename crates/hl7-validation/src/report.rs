//! Report entries and the merged validation report
//!
//! Entries are plain data: the checks never fail on a finding, they emit an
//! entry. Each entry knows its [`Classification`], which is what decides
//! whether a report is valid.

use hl7_expression::Trace;
use hl7_ir::{Line, Location, Range, Usage};
use hl7_profile::BindingStrength;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How much an entry matters to the receiver of the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Error,
    Warning,
    Informational,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Informational => "informational",
        };
        f.write_str(s)
    }
}

/// Structural finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SEntry {
    /// Required position without any element; located at the parent
    RUsage {
        location: Location,
        position: u32,
        description: String,
    },
    /// Required-but-may-be-empty position without any element
    REUsage {
        location: Location,
        position: u32,
        description: String,
    },
    /// Element present at a forbidden position
    XUsage { location: Location },
    /// Element present at a position that should not be used
    WUsage { location: Location },
    MinCard {
        location: Location,
        instance: u32,
        range: Range,
    },
    MaxCard {
        location: Location,
        instance: u32,
        range: Range,
    },
    /// Unescaped value whose length is out of range
    Length {
        location: Location,
        value: String,
        range: Range,
    },
    /// Complex element with children at undeclared positions
    Extra { location: Location },
    UnescapedSeparators { location: Location, value: String },
    Format { location: Location, details: String },
    UnexpectedLines { lines: Vec<Line> },
    InvalidLines { lines: Vec<Line> },
}

impl SEntry {
    /// Location of the entry; line lists have none
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::RUsage { location, .. }
            | Self::REUsage { location, .. }
            | Self::XUsage { location }
            | Self::WUsage { location }
            | Self::MinCard { location, .. }
            | Self::MaxCard { location, .. }
            | Self::Length { location, .. }
            | Self::Extra { location }
            | Self::UnescapedSeparators { location, .. }
            | Self::Format { location, .. } => Some(location),
            Self::UnexpectedLines { .. } | Self::InvalidLines { .. } => None,
        }
    }

    #[must_use]
    pub fn classification(&self) -> Classification {
        match self {
            Self::REUsage { .. } | Self::WUsage { .. } => Classification::Warning,
            _ => Classification::Error,
        }
    }
}

impl fmt::Display for SEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RUsage { location, position, description } => {
                write!(f, "{description} ({position}) is required but missing in {location}")
            }
            Self::REUsage { location, position, description } => {
                write!(f, "{description} ({position}) is required but may be empty, missing in {location}")
            }
            Self::XUsage { location } => write!(f, "{location} is present but forbidden"),
            Self::WUsage { location } => write!(f, "{location} is present but should not be"),
            Self::MinCard { location, instance, range } => write!(
                f,
                "{location} occurs {instance} time(s), expected cardinality {range}"
            ),
            Self::MaxCard { location, instance, range } => write!(
                f,
                "{location} is instance {instance}, beyond cardinality {range}"
            ),
            Self::Length { location, value, range } => write!(
                f,
                "{location} value '{value}' has length {}, expected {range}",
                value.chars().count()
            ),
            Self::Extra { location } => write!(f, "{location} has undeclared children"),
            Self::UnescapedSeparators { location, value } => {
                write!(f, "{location} value '{value}' contains unescaped separators")
            }
            Self::Format { location, details } => write!(f, "{location}: {details}"),
            Self::UnexpectedLines { lines } => write!(f, "{} unexpected line(s)", lines.len()),
            Self::InvalidLines { lines } => write!(f, "{} invalid line(s)", lines.len()),
        }
    }
}

/// Content finding, for a constraint or a predicate at one context element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CEntry {
    Success {
        location: Location,
        id: String,
        description: String,
    },
    Failure {
        location: Location,
        id: String,
        description: String,
        stack: Vec<Trace>,
    },
    /// The constraint could not be decided
    ///
    /// The stack ends with the sub-expression that could not be decided.
    SpecError {
        location: Location,
        id: String,
        description: String,
        stack: Vec<Trace>,
    },
    PredicateSuccess {
        location: Location,
        id: String,
        description: String,
        usage: Usage,
    },
    /// The usage chosen by the condition is not honoured by the target
    PredicateFailure {
        location: Location,
        id: String,
        description: String,
        usage: Usage,
        target: String,
    },
    PredicateSpecError {
        location: Location,
        id: String,
        description: String,
        stack: Vec<Trace>,
    },
}

impl CEntry {
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            Self::Success { location, .. }
            | Self::Failure { location, .. }
            | Self::SpecError { location, .. }
            | Self::PredicateSuccess { location, .. }
            | Self::PredicateFailure { location, .. }
            | Self::PredicateSpecError { location, .. } => location,
        }
    }

    /// Id of the constraint or predicate
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Success { id, .. }
            | Self::Failure { id, .. }
            | Self::SpecError { id, .. }
            | Self::PredicateSuccess { id, .. }
            | Self::PredicateFailure { id, .. }
            | Self::PredicateSpecError { id, .. } => id,
        }
    }

    #[must_use]
    pub fn classification(&self) -> Classification {
        match self {
            Self::Success { .. } | Self::PredicateSuccess { .. } => Classification::Informational,
            Self::Failure { .. } | Self::PredicateFailure { .. } => Classification::Error,
            Self::SpecError { .. } | Self::PredicateSpecError { .. } => Classification::Warning,
        }
    }
}

impl fmt::Display for CEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { location, id, .. } => write!(f, "{id} passed at {location}"),
            Self::Failure { location, id, stack, .. } => {
                write!(f, "{id} failed at {location}")?;
                if let Some(reason) = stack.first().and_then(|t| t.reasons.first()) {
                    write!(f, ": {reason}")?;
                }
                Ok(())
            }
            Self::SpecError { location, id, stack, .. }
            | Self::PredicateSpecError { location, id, stack, .. } => {
                write!(f, "{id} could not be evaluated at {location}")?;
                if let Some(reason) = stack.last().and_then(|t| t.reasons.first()) {
                    write!(f, ": {reason}")?;
                }
                Ok(())
            }
            Self::PredicateSuccess { location, id, usage, .. } => {
                write!(f, "{id} satisfied at {location} (usage {usage})")
            }
            Self::PredicateFailure { location, id, usage, target, .. } => {
                write!(f, "{id} violated at {location}: {target} has usage {usage}")
            }
        }
    }
}

/// Value-set finding
///
/// Every entry carries the binding strength of the binding that produced
/// it. Entries of `S` or `U` bindings never count as errors.
#[allow(clippy::upper_case_acronyms)] // EVS and PVS are the conventional names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum VSEntry {
    /// Code excluded from the value set
    EVS {
        location: Location,
        value: String,
        value_set_id: String,
        strength: BindingStrength,
    },
    /// Code permitted but not required
    PVS {
        location: Location,
        value: String,
        value_set_id: String,
        strength: BindingStrength,
    },
    CodeNotFound {
        location: Location,
        value: String,
        value_set_id: String,
        strength: BindingStrength,
    },
    VSNotFound {
        location: Location,
        value_set_id: String,
        strength: BindingStrength,
    },
    EmptyVS {
        location: Location,
        value_set_id: String,
        strength: BindingStrength,
    },
    /// The binding cannot be applied to the element it targets
    VSSpecError {
        location: Location,
        value_set_id: String,
        strength: BindingStrength,
        reason: String,
    },
    /// No binding location of a coded element holds an allowed code
    CodedElement {
        location: Location,
        value_set_id: String,
        strength: BindingStrength,
        detections: Vec<VSEntry>,
    },
}

impl VSEntry {
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            Self::EVS { location, .. }
            | Self::PVS { location, .. }
            | Self::CodeNotFound { location, .. }
            | Self::VSNotFound { location, .. }
            | Self::EmptyVS { location, .. }
            | Self::VSSpecError { location, .. }
            | Self::CodedElement { location, .. } => location,
        }
    }

    #[must_use]
    pub fn strength(&self) -> BindingStrength {
        match self {
            Self::EVS { strength, .. }
            | Self::PVS { strength, .. }
            | Self::CodeNotFound { strength, .. }
            | Self::VSNotFound { strength, .. }
            | Self::EmptyVS { strength, .. }
            | Self::VSSpecError { strength, .. }
            | Self::CodedElement { strength, .. } => *strength,
        }
    }

    #[must_use]
    pub fn classification(&self) -> Classification {
        let classification = match self {
            Self::EVS { .. } | Self::CodeNotFound { .. } | Self::CodedElement { .. } => {
                Classification::Error
            }
            Self::PVS { .. }
            | Self::VSNotFound { .. }
            | Self::EmptyVS { .. }
            | Self::VSSpecError { .. } => Classification::Warning,
        };
        match (classification, self.strength()) {
            (Classification::Error, BindingStrength::S | BindingStrength::U) => {
                Classification::Warning
            }
            (c, _) => c,
        }
    }
}

impl fmt::Display for VSEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EVS { location, value, value_set_id, .. } => {
                write!(f, "{location}: code '{value}' is excluded from {value_set_id}")
            }
            Self::PVS { location, value, value_set_id, .. } => {
                write!(f, "{location}: code '{value}' is only permitted in {value_set_id}")
            }
            Self::CodeNotFound { location, value, value_set_id, .. } => {
                write!(f, "{location}: code '{value}' not found in {value_set_id}")
            }
            Self::VSNotFound { location, value_set_id, .. } => {
                write!(f, "{location}: value set {value_set_id} not found")
            }
            Self::EmptyVS { location, value_set_id, .. } => {
                write!(f, "{location}: value set {value_set_id} is empty")
            }
            Self::VSSpecError { location, value_set_id, reason, .. } => {
                write!(f, "{location}: binding to {value_set_id} cannot be applied: {reason}")
            }
            Self::CodedElement { location, value_set_id, detections, .. } => write!(
                f,
                "{location}: no allowed code of {value_set_id} ({} detection(s))",
                detections.len()
            ),
        }
    }
}

/// Outcome of one validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub structure: Vec<SEntry>,
    pub content: Vec<CEntry>,
    pub value_set: Vec<VSEntry>,
}

impl Report {
    /// Create a report from the entries of the three checks
    #[must_use]
    pub fn new(structure: Vec<SEntry>, content: Vec<CEntry>, value_set: Vec<VSEntry>) -> Self {
        Self {
            structure,
            content,
            value_set,
        }
    }

    /// Classification of every entry, structure first
    pub fn classifications(&self) -> impl Iterator<Item = Classification> + '_ {
        self.structure
            .iter()
            .map(SEntry::classification)
            .chain(self.content.iter().map(CEntry::classification))
            .chain(self.value_set.iter().map(VSEntry::classification))
    }

    /// True when no entry is classified as an error
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count(Classification::Error)
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count(Classification::Warning)
    }

    /// Total number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.structure.len() + self.content.len() + self.value_set.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn count(&self, classification: Classification) -> usize {
        self.classifications().filter(|c| *c == classification).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(path: &str) -> Location {
        Location::new(path, "test", 1, 1)
    }

    #[test]
    fn test_structure_classification() {
        let warning = SEntry::WUsage { location: loc("PID[1]") };
        let error = SEntry::Extra { location: loc("PID[1]") };
        assert_eq!(warning.classification(), Classification::Warning);
        assert_eq!(error.classification(), Classification::Error);
        assert_eq!(SEntry::InvalidLines { lines: vec![] }.location(), None);
    }

    #[test]
    fn test_weak_binding_downgrades_errors() {
        let entry = |strength| VSEntry::CodeNotFound {
            location: loc("PID[1]-8[1]"),
            value: "Q".into(),
            value_set_id: "HL70001".into(),
            strength,
        };
        assert_eq!(entry(BindingStrength::R).classification(), Classification::Error);
        assert_eq!(entry(BindingStrength::S).classification(), Classification::Warning);
        assert_eq!(entry(BindingStrength::U).classification(), Classification::Warning);
    }

    #[test]
    fn test_report_counts() {
        let report = Report::new(
            vec![SEntry::WUsage { location: loc("1[1]") }],
            vec![
                CEntry::Success {
                    location: loc(""),
                    id: "C1".into(),
                    description: String::new(),
                },
                CEntry::Failure {
                    location: loc(""),
                    id: "C2".into(),
                    description: String::new(),
                    stack: vec![Trace::single("Presence(1)", loc("1[1]"), "absent")],
                },
            ],
            vec![],
        );
        assert_eq!(report.len(), 3);
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 1);
        assert!(!report.is_valid());
        assert!(Report::default().is_valid());
    }

    #[test]
    fn test_entries_serialize_with_kind_tag() {
        let entry = SEntry::Format {
            location: loc("PID[1]-7[1]"),
            details: "bad date".into(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "Format");
        assert_eq!(json["location"]["path"], "PID[1]-7[1]");

        let back: SEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_failure_display_shows_first_reason() {
        let entry = CEntry::Failure {
            location: loc("PID[1]"),
            id: "C2".into(),
            description: String::new(),
            stack: vec![Trace::single("Presence(3)", loc("PID[1]-3[1]"), "absent")],
        };
        let text = entry.to_string();
        assert!(text.starts_with("C2 failed at"));
        assert!(text.contains("absent"));
    }
}
