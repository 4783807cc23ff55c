//! Structure check
//!
//! Walks every complex element together with the requirements of its
//! children. For each declared position, usage is checked first; a usage
//! finding ends the position. Otherwise cardinality is checked and the
//! elements found there are visited: simple ones for format and length,
//! complex ones recursively. Entries come out in declared position order.

use crate::report::SEntry;
use hl7_ir::{Complex, Element, Message, Req, Separators, Simple, Usage, Value, format};
use tracing::{debug, trace};

/// Check a message's structure with default options
#[must_use]
pub fn check_structure(message: &Message) -> Vec<SEntry> {
    StructureValidator::new().check(message)
}

/// Structure check with its options
#[derive(Debug, Clone, Copy, Default)]
pub struct StructureValidator {
    report_re_usage: bool,
}

impl StructureValidator {
    /// Create a new validator; `RE` positions are not reported
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report empty `RE` positions as [`SEntry::REUsage`]
    #[must_use]
    pub fn with_re_usage(mut self, enabled: bool) -> Self {
        self.report_re_usage = enabled;
        self
    }

    /// Check a message
    #[must_use]
    pub fn check(&self, message: &Message) -> Vec<SEntry> {
        let mut entries = Vec::new();
        if !message.invalid.is_empty() {
            entries.push(SEntry::InvalidLines {
                lines: message.invalid.clone(),
            });
        }
        if !message.unexpected.is_empty() {
            entries.push(SEntry::UnexpectedLines {
                lines: message.unexpected.clone(),
            });
        }

        if let Some(root) = message.root_complex() {
            self.check_complex(root, &message.separators, &mut entries);
        }

        debug!("Structure check of {}: {} entries", message.id, entries.len());
        entries
    }

    fn check_complex(&self, complex: &Complex, separators: &Separators, entries: &mut Vec<SEntry>) {
        trace!("Checking structure of '{}'", complex.location.path);
        let by_position = complex.children_by_position();

        for req in complex.reqs.iter() {
            let children = by_position.get(&req.position).map_or(&[][..], Vec::as_slice);

            let mut usage = check_usage(req, children, complex);
            if !self.report_re_usage {
                usage.retain(|e| !matches!(e, SEntry::REUsage { .. }));
            }
            if !usage.is_empty() {
                entries.extend(usage);
                continue;
            }

            entries.extend(check_cardinality(req, children));
            for child in children {
                match child {
                    Element::Simple(simple) => entries.extend(check_value(simple, req, separators)),
                    Element::Complex(inner) => self.check_complex(inner, separators, entries),
                }
            }
        }

        if complex.has_extra {
            entries.push(SEntry::Extra {
                location: complex.location.clone(),
            });
        }
    }
}

/// Usage of one position
///
/// `R` without elements gives one `RUsage` and `RE` without elements one
/// `REUsage`, both located at `parent`. `X` and `W` give one entry per
/// element present.
#[must_use]
pub fn check_usage(req: &Req, children: &[&Element], parent: &Complex) -> Vec<SEntry> {
    let description = if req.description.is_empty() {
        req.label()
    } else {
        req.description.clone()
    };

    match req.usage {
        Usage::R if children.is_empty() => vec![SEntry::RUsage {
            location: parent.location.clone(),
            position: req.position,
            description,
        }],
        Usage::RE if children.is_empty() => vec![SEntry::REUsage {
            location: parent.location.clone(),
            position: req.position,
            description,
        }],
        Usage::X => children
            .iter()
            .map(|c| SEntry::XUsage {
                location: c.location().clone(),
            })
            .collect(),
        Usage::W => children
            .iter()
            .map(|c| SEntry::WUsage {
                location: c.location().clone(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Cardinality of one position, judged on instance numbers
///
/// When the highest instance is below the minimum, one `MinCard` is keyed
/// at that element. Otherwise every element whose instance is beyond a
/// finite maximum gets a `MaxCard`.
#[must_use]
pub fn check_cardinality(req: &Req, children: &[&Element]) -> Vec<SEntry> {
    let Some(highest) = children.iter().max_by_key(|e| e.instance()) else {
        return Vec::new();
    };

    let range = req.cardinality;
    if highest.instance() < range.min {
        return vec![SEntry::MinCard {
            location: highest.location().clone(),
            instance: highest.instance(),
            range,
        }];
    }

    children
        .iter()
        .filter(|e| range.is_exceeded_by(e.instance() as usize))
        .map(|e| SEntry::MaxCard {
            location: e.location().clone(),
            instance: e.instance(),
            range,
        })
        .collect()
}

/// Format then length of a simple element; nothing for null values
#[must_use]
pub fn check_value(simple: &Simple, req: &Req, separators: &Separators) -> Vec<SEntry> {
    if simple.value.is_null() {
        return Vec::new();
    }
    check_format(simple, separators)
        .into_iter()
        .chain(check_length(simple, req, separators))
        .collect()
}

/// Lexical form of typed values, unescaped separators in text values
#[must_use]
pub fn check_format(simple: &Simple, separators: &Separators) -> Option<SEntry> {
    match &simple.value {
        Value::Null => None,
        Value::Text(raw) => separators.has_unescaped_separator(raw).then(|| {
            SEntry::UnescapedSeparators {
                location: simple.location.clone(),
                value: raw.clone(),
            }
        }),
        typed => format::check(typed).map(|details| SEntry::Format {
            location: simple.location.clone(),
            details,
        }),
    }
}

/// Length of the unescaped value against the declared length range
#[must_use]
pub fn check_length(simple: &Simple, req: &Req, separators: &Separators) -> Option<SEntry> {
    let range = req.length?;
    if simple.value.is_null() {
        return None;
    }

    let value = separators.unescape(simple.value.raw());
    if range.contains(value.chars().count()) {
        return None;
    }
    Some(SEntry::Length {
        location: simple.location.clone(),
        value,
        range,
    })
}
