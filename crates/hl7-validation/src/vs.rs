//! Value-set check
//!
//! Simple targets are looked up directly. Complex targets are coded
//! elements: their binding locations say which components hold the code and
//! its code system, and the element passes when any location holds an
//! allowed code of the right system.

use crate::report::VSEntry;
use hl7_ir::{Complex, Element, Location, Message, Path, Separators, Simple};
use hl7_profile::{CodeUsage, MessageProfile, ValueSet, ValueSetBinding, ValueSetLibrary, ValueSetSpec};
use tracing::{debug, trace};

/// Check every value-set binding of a profile against a message
#[must_use]
pub fn check_value_sets(
    message: &Message,
    profile: &MessageProfile,
    library: &dyn ValueSetLibrary,
) -> Vec<VSEntry> {
    let entries: Vec<VSEntry> = profile
        .value_set_bindings
        .iter()
        .flat_map(|binding| check_binding(&message.root, &message.separators, binding, library))
        .collect();

    debug!(
        "Value-set check of {}: {} bindings, {} entries",
        message.id,
        profile.value_set_bindings.len(),
        entries.len()
    );
    entries
}

/// Check one binding against every element its target resolves to
#[must_use]
pub fn check_binding(
    root: &Element,
    separators: &Separators,
    binding: &ValueSetBinding,
    library: &dyn ValueSetLibrary,
) -> Vec<VSEntry> {
    let spec = &binding.spec;
    let targets = match Path::parse(&binding.target) {
        Ok(path) => path.resolve(root),
        Err(e) => return vec![spec_error(root.location(), spec, e.to_string())],
    };
    trace!("Binding {} matched {} elements", binding.target, targets.len());

    targets
        .into_iter()
        .filter_map(|element| match element {
            Element::Simple(simple) => check_simple(simple, separators, spec, library),
            Element::Complex(complex) => check_coded(complex, separators, spec, library),
        })
        .collect()
}

/// Look the value of a simple element up in its value set
#[must_use]
pub fn check_simple(
    simple: &Simple,
    separators: &Separators,
    spec: &ValueSetSpec,
    library: &dyn ValueSetLibrary,
) -> Option<VSEntry> {
    if simple.value.is_null() {
        return None;
    }
    let set = match lookup(&simple.location, spec, library) {
        Ok(set) => set,
        Err(entry) => return Some(entry),
    };

    let value = separators.unescape(simple.value.raw());
    let codes = set.codes_for(&value);
    let location = simple.location.clone();
    let value_set_id = spec.value_set_id.clone();
    let strength = spec.binding_strength;

    if codes.is_empty() {
        return Some(VSEntry::CodeNotFound {
            location,
            value,
            value_set_id,
            strength,
        });
    }
    if codes.iter().any(|c| c.usage == CodeUsage::R) {
        return None;
    }
    if codes.iter().any(|c| c.usage == CodeUsage::P) {
        return Some(VSEntry::PVS {
            location,
            value,
            value_set_id,
            strength,
        });
    }
    Some(VSEntry::EVS {
        location,
        value,
        value_set_id,
        strength,
    })
}

/// Check a coded element through its binding locations
///
/// Locations without a code are skipped; an element with no code at any
/// location yields nothing.
#[must_use]
pub fn check_coded(
    complex: &Complex,
    separators: &Separators,
    spec: &ValueSetSpec,
    library: &dyn ValueSetLibrary,
) -> Option<VSEntry> {
    let location = &complex.location;
    let pairs = match spec.binding_location.as_deref() {
        Some(pairs) if !pairs.is_empty() => pairs,
        _ => {
            return Some(spec_error(
                location,
                spec,
                "coded element bound without binding location".into(),
            ));
        }
    };
    if let Some(pair) = pairs
        .iter()
        .find(|p| complex.req_at(p.code).is_none() || complex.req_at(p.code_system).is_none())
    {
        return Some(spec_error(
            location,
            spec,
            format!("binding location {pair} is not declared for {}", location.path),
        ));
    }

    let set = match lookup(location, spec, library) {
        Ok(set) => set,
        Err(entry) => return Some(entry),
    };

    let mut detections = Vec::new();
    for pair in pairs {
        let Some((code_location, code)) = component(complex, pair.code, separators) else {
            continue;
        };
        let system = component(complex, pair.code_system, separators)
            .map(|(_, system)| system)
            .unwrap_or_default();

        let matching: Vec<_> = set
            .codes_for(&code)
            .into_iter()
            .filter(|c| c.code_system == system)
            .collect();
        if matching.iter().any(|c| c.usage != CodeUsage::E) {
            return None;
        }

        let value_set_id = spec.value_set_id.clone();
        let strength = spec.binding_strength;
        detections.push(if matching.is_empty() {
            VSEntry::CodeNotFound {
                location: code_location.clone(),
                value: code,
                value_set_id,
                strength,
            }
        } else {
            VSEntry::EVS {
                location: code_location.clone(),
                value: code,
                value_set_id,
                strength,
            }
        });
    }

    if detections.is_empty() {
        return None;
    }
    Some(VSEntry::CodedElement {
        location: location.clone(),
        value_set_id: spec.value_set_id.clone(),
        strength: spec.binding_strength,
        detections,
    })
}

fn lookup<'l>(
    location: &Location,
    spec: &ValueSetSpec,
    library: &'l dyn ValueSetLibrary,
) -> Result<&'l ValueSet, VSEntry> {
    match library.get(&spec.value_set_id) {
        None => Err(VSEntry::VSNotFound {
            location: location.clone(),
            value_set_id: spec.value_set_id.clone(),
            strength: spec.binding_strength,
        }),
        Some(set) if set.is_empty() => Err(VSEntry::EmptyVS {
            location: location.clone(),
            value_set_id: spec.value_set_id.clone(),
            strength: spec.binding_strength,
        }),
        Some(set) => Ok(set),
    }
}

/// First non-null simple child at a position, unescaped
fn component<'c>(complex: &'c Complex, position: u32, separators: &Separators) -> Option<(&'c Location, String)> {
    let child = complex.children.iter().find(|c| c.position() == position)?;
    let value = child.value().filter(|v| !v.is_null())?;
    Some((child.location(), separators.unescape(value.raw())))
}

fn spec_error(location: &Location, spec: &ValueSetSpec, reason: String) -> VSEntry {
    VSEntry::VSSpecError {
        location: location.clone(),
        value_set_id: spec.value_set_id.clone(),
        strength: spec.binding_strength,
        reason,
    }
}
