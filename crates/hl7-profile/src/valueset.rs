//! Value sets, their bindings and the library they are looked up in

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Usage of a code within its value set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeUsage {
    /// Required (allowed)
    R,
    /// Permitted
    P,
    /// Excluded
    E,
}

/// One code of a value set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    pub value: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub code_system: String,

    #[serde(default = "default_code_usage")]
    pub usage: CodeUsage,
}

fn default_code_usage() -> CodeUsage {
    CodeUsage::R
}

impl Code {
    /// Create a required code
    pub fn new(value: impl Into<String>, code_system: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: String::new(),
            code_system: code_system.into(),
            usage: CodeUsage::R,
        }
    }

    /// Set the usage
    #[must_use]
    pub fn with_usage(mut self, usage: CodeUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Stability {
    #[default]
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Extensibility {
    Open,
    #[default]
    Closed,
}

/// A named set of codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSet {
    pub id: String,

    #[serde(default)]
    pub stability: Stability,

    #[serde(default)]
    pub extensibility: Extensibility,

    #[serde(default)]
    pub codes: Vec<Code>,
}

impl ValueSet {
    /// Create an empty value set
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stability: Stability::default(),
            extensibility: Extensibility::default(),
            codes: Vec::new(),
        }
    }

    /// Add a code
    #[must_use]
    pub fn with_code(mut self, code: Code) -> Self {
        self.codes.push(code);
        self
    }

    /// Codes whose value is `value`, whatever their code system
    #[must_use]
    pub fn codes_for(&self, value: &str) -> Vec<&Code> {
        self.codes.iter().filter(|c| c.value == value).collect()
    }

    /// Check if the value set has no codes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// How strongly an element is bound to its value set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BindingStrength {
    /// Required
    #[default]
    R,
    /// Suggested
    S,
    /// Unspecified
    U,
}

impl fmt::Display for BindingStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::R => "R",
            Self::S => "S",
            Self::U => "U",
        };
        f.write_str(s)
    }
}

/// Positions of the code and its code system inside a coded element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingLocation {
    pub code: u32,
    pub code_system: u32,
}

impl BindingLocation {
    /// Create a new binding location
    #[must_use]
    pub fn new(code: u32, code_system: u32) -> Self {
        Self { code, code_system }
    }
}

impl fmt::Display for BindingLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.code, self.code_system)
    }
}

/// Value set a target is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSetSpec {
    pub value_set_id: String,

    #[serde(default)]
    pub binding_strength: BindingStrength,

    /// Where code and code system sit in a complex target
    #[serde(default)]
    pub binding_location: Option<Vec<BindingLocation>>,
}

impl ValueSetSpec {
    /// Create a spec with required strength and no binding location
    pub fn new(value_set_id: impl Into<String>) -> Self {
        Self {
            value_set_id: value_set_id.into(),
            binding_strength: BindingStrength::R,
            binding_location: None,
        }
    }

    /// Set the binding strength
    #[must_use]
    pub fn with_strength(mut self, strength: BindingStrength) -> Self {
        self.binding_strength = strength;
        self
    }

    /// Set the binding locations
    #[must_use]
    pub fn with_locations(mut self, locations: Vec<BindingLocation>) -> Self {
        self.binding_location = Some(locations);
        self
    }
}

/// A path from the message root bound to a value set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSetBinding {
    pub target: String,
    pub spec: ValueSetSpec,
}

impl ValueSetBinding {
    /// Create a new binding
    pub fn new(target: impl Into<String>, spec: ValueSetSpec) -> Self {
        Self {
            target: target.into(),
            spec,
        }
    }
}

/// Source of value sets, keyed by id
pub trait ValueSetLibrary: Send + Sync {
    /// Look up a value set
    fn get(&self, id: &str) -> Option<&ValueSet>;

    /// Check if a value set exists
    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

/// Value-set library held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryValueSetLibrary {
    sets: HashMap<String, ValueSet>,
}

impl InMemoryValueSetLibrary {
    /// Create an empty library
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value set, replacing any set with the same id
    pub fn insert(&mut self, set: ValueSet) {
        self.sets.insert(set.id.clone(), set);
    }

    /// Get number of value sets
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Check if the library is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl FromIterator<ValueSet> for InMemoryValueSetLibrary {
    fn from_iter<I: IntoIterator<Item = ValueSet>>(iter: I) -> Self {
        let mut library = Self::new();
        for set in iter {
            library.insert(set);
        }
        library
    }
}

impl ValueSetLibrary for InMemoryValueSetLibrary {
    fn get(&self, id: &str) -> Option<&ValueSet> {
        self.sets.get(id)
    }
}
