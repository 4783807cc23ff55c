//! Profile and value-set loader
//!
//! Profiles are YAML or JSON documents, picked by file extension. Content
//! expressions are embedded either as an attribute tree
//! (`{ name, attributes, children }`) or as an XML string.

use crate::model::{ContentConstraint, MessageProfile, Predicate};
use crate::registry::ProfileRegistry;
use crate::valueset::{InMemoryValueSetLibrary, ValueSet, ValueSetBinding};
use crate::{Error, Result};
use hl7_expression::{ExprNode, Expression, deserialize};
use hl7_ir::{Req, Usage};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Serializable profile format for loading from files
#[derive(Debug, Deserialize)]
struct ProfileFile {
    id: String,
    #[serde(default)]
    description: String,
    structure: Vec<Req>,
    #[serde(default)]
    constraints: Vec<ConstraintFile>,
    #[serde(default)]
    predicates: Vec<PredicateFile>,
    #[serde(default)]
    value_set_bindings: Vec<ValueSetBinding>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpressionSource {
    Xml(String),
    Tree(ExprNode),
}

#[derive(Debug, Deserialize)]
struct ConstraintFile {
    id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    context: String,
    expression: ExpressionSource,
}

#[derive(Debug, Deserialize)]
struct PredicateFile {
    id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    context: String,
    target: String,
    condition: ExpressionSource,
    true_usage: Usage,
    false_usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ValueSetFile {
    #[serde(default)]
    value_sets: Vec<ValueSet>,
}

/// Profile loader backed by a shared registry
pub struct ProfileLoader {
    registry: Arc<ProfileRegistry>,
    search_paths: Vec<PathBuf>,
}

impl ProfileLoader {
    /// Create a new profile loader with the given search paths
    #[must_use]
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            registry: Arc::new(ProfileRegistry::new()),
            search_paths,
        }
    }

    /// Create a new profile loader with a pre-configured registry
    #[must_use]
    pub fn with_registry(registry: Arc<ProfileRegistry>, search_paths: Vec<PathBuf>) -> Self {
        Self {
            registry,
            search_paths,
        }
    }

    /// The registry loaded profiles are cached in
    #[must_use]
    pub fn registry(&self) -> &Arc<ProfileRegistry> {
        &self.registry
    }

    /// Load a profile by message id
    /// First checks the registry, then searches the paths on disk
    ///
    /// # Errors
    ///
    /// Returns an error when no file is found or the file is malformed.
    pub fn load(&self, id: &str) -> Result<Arc<MessageProfile>> {
        if let Some(cached) = self.registry.get(id) {
            debug!("Cache hit for profile: {}", id);
            return Ok(cached);
        }

        trace!("Cache miss for profile: {}", id);
        let profile = self.load_from_disk(id)?;
        if profile.id != id {
            return Err(Error::invalid(
                id,
                format!("file declares profile '{}'", profile.id),
            ));
        }
        self.registry.register(profile)
    }

    /// Load a profile from a file and register it
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or the profile is malformed.
    pub fn register_file(&self, path: &Path) -> Result<Arc<MessageProfile>> {
        let profile = self.load_from_file(path)?;
        info!("Loaded profile {} from {}", profile.id, path.display());
        self.registry.register(profile)
    }

    /// Load a profile from a specific file path
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load_from_file(&self, path: &Path) -> Result<MessageProfile> {
        trace!("Loading profile from file: {:?}", path);
        let file: ProfileFile = read_document(path)?;
        convert_profile_file(file)
    }

    /// Load a profile from JSON string
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or profile content.
    pub fn load_from_json(&self, json: &str) -> Result<MessageProfile> {
        let file: ProfileFile = serde_json::from_str(json)
            .map_err(|e| Error::InvalidFormat(format!("JSON parse error: {e}")))?;
        convert_profile_file(file)
    }

    /// Load a profile from YAML string
    ///
    /// # Errors
    ///
    /// Returns an error for malformed YAML or profile content.
    pub fn load_from_yaml(&self, yaml: &str) -> Result<MessageProfile> {
        let file: ProfileFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidFormat(format!("YAML parse error: {e}")))?;
        convert_profile_file(file)
    }

    /// Load a value-set library from a YAML or JSON file
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load_value_sets(&self, path: &Path) -> Result<InMemoryValueSetLibrary> {
        let file: ValueSetFile = read_document(path)?;
        let library: InMemoryValueSetLibrary = file.value_sets.into_iter().collect();
        info!("Loaded {} value sets from {}", library.len(), path.display());
        Ok(library)
    }

    fn load_from_disk(&self, id: &str) -> Result<MessageProfile> {
        let stem = id.to_lowercase();
        let variations = [
            format!("{stem}.yaml"),
            format!("{stem}.yml"),
            format!("{stem}.json"),
            format!("{id}.yaml"),
            format!("{id}.json"),
        ];

        for path in &self.search_paths {
            for variation in &variations {
                let file_path = path.join(variation);
                if file_path.exists() {
                    trace!("Found profile file: {:?}", file_path);
                    return self.load_from_file(&file_path);
                }
            }
        }

        Err(Error::NotFound(format!(
            "Profile {} not found in search paths: {:?}",
            id, self.search_paths
        )))
    }
}

impl Default for ProfileLoader {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Read a YAML (`.yaml`/`.yml`) or JSON document
fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .is_some_and(|e| e == "yaml" || e == "yml");

    if is_yaml {
        serde_yaml::from_str(&content)
            .map_err(|e| Error::InvalidFormat(format!("YAML parse error in {}: {e}", path.display())))
    } else {
        serde_json::from_str(&content)
            .map_err(|e| Error::InvalidFormat(format!("JSON parse error in {}: {e}", path.display())))
    }
}

fn build_expression(id: &str, source: ExpressionSource) -> Result<Expression> {
    let node = match source {
        ExpressionSource::Tree(node) => node,
        ExpressionSource::Xml(xml) => ExprNode::from_xml(&xml).map_err(|source| Error::Expression {
            id: id.to_string(),
            source,
        })?,
    };
    deserialize(&node).map_err(|source| Error::Expression {
        id: id.to_string(),
        source,
    })
}

fn convert_profile_file(file: ProfileFile) -> Result<MessageProfile> {
    let mut profile = MessageProfile::new(file.id, file.structure).described(file.description);

    for c in file.constraints {
        let expression = build_expression(&c.id, c.expression)?;
        profile = profile.with_constraint(
            ContentConstraint::new(c.id, c.context, expression).described(c.description),
        );
    }

    for p in file.predicates {
        let condition = build_expression(&p.id, p.condition)?;
        profile = profile.with_predicate(
            Predicate::new(p.id, p.context, p.target, condition, p.true_usage, p.false_usage)
                .described(p.description),
        );
    }

    for binding in file.value_set_bindings {
        profile = profile.with_binding(binding);
    }

    debug!(
        "Converted profile {}: {} constraints, {} predicates, {} bindings",
        profile.id,
        profile.constraints.len(),
        profile.predicates.len(),
        profile.value_set_bindings.len()
    );
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valueset::ValueSetLibrary;
    use hl7_ir::Max;
    use std::io::Write;

    const PROFILE_YAML: &str = r#"
id: ADT_A01
description: Admit a patient
structure:
  - position: 1
    name: MSH
    usage: R
    cardinality: { min: 1, max: 1 }
    children:
      - position: 9
        usage: R
        cardinality: { min: 1, max: 1 }
        length: { min: 3, max: 15 }
  - position: 2
    name: PID
    usage: R
    cardinality: { min: 1, max: "*" }
    children:
      - position: 7
        usage: O
        cardinality: { min: 0, max: 1 }
        data_type: Date
constraints:
  - id: PID-7-present
    context: "2[1]"
    expression:
      name: Presence
      attributes: { Path: "7[1]" }
  - id: MSH-9-value
    context: "1[1]"
    expression: '<PlainText Path="9[1]" Text="ADT^A01" IgnoreCase="false"/>'
predicates:
  - id: PID-7-when-sex
    context: "2[1]"
    target: "7[1]"
    condition: '<Presence Path="8[1]"/>'
    true_usage: R
    false_usage: O
value_set_bindings:
  - target: "2[1].8[1]"
    spec: { value_set_id: HL70001 }
"#;

    #[test]
    fn test_load_from_yaml() {
        let loader = ProfileLoader::default();
        let profile = loader.load_from_yaml(PROFILE_YAML).unwrap();

        assert_eq!(profile.id, "ADT_A01");
        assert_eq!(profile.structure.len(), 2);
        assert_eq!(profile.structure[1].cardinality.max, Max::Unbounded);
        assert_eq!(profile.structure[1].children[0].data_type, hl7_ir::DataType::Date);
        assert_eq!(profile.constraints.len(), 2);
        assert_eq!(profile.constraints[0].expression, Expression::presence("7[1]"));
        assert_eq!(
            profile.constraints[1].expression,
            Expression::plain_text("9[1]", "ADT^A01", false)
        );
        assert_eq!(profile.predicates[0].true_usage, Usage::R);
        assert_eq!(profile.value_set_bindings[0].spec.value_set_id, "HL70001");
    }

    #[test]
    fn test_load_from_yaml_invalid() {
        let loader = ProfileLoader::default();
        assert!(matches!(
            loader.load_from_yaml("id: X\nstructure: ["),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_invalid_expression_is_reported_with_id() {
        let yaml = r#"
id: X
structure: []
constraints:
  - id: broken
    expression: { name: Unknown }
"#;
        let err = ProfileLoader::default().load_from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{
            "id": "ORU_R01",
            "structure": [
                {"position": 1, "name": "MSH", "usage": "R", "cardinality": {"min": 1, "max": 1}}
            ]
        }"#;
        let profile = ProfileLoader::default().load_from_json(json).unwrap();
        assert_eq!(profile.id, "ORU_R01");
        assert!(profile.constraints.is_empty());
    }

    #[test]
    fn test_load_by_id_from_search_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("adt_a01.yaml"), PROFILE_YAML).unwrap();

        let loader = ProfileLoader::new(vec![dir.path().to_path_buf()]);
        let first = loader.load("ADT_A01").unwrap();
        let second = loader.load("ADT_A01").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(loader.registry().contains("ADT_A01"));

        assert!(matches!(loader.load("ORU_R01"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_load_value_sets() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "value_sets:\n  - id: HL70001\n    codes:\n      - {{ value: F, code_system: HL70001 }}\n      - {{ value: U, code_system: HL70001, usage: E }}"
        )
        .unwrap();

        let library = ProfileLoader::default().load_value_sets(file.path()).unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library.get("HL70001").unwrap().codes.len(), 2);
    }
}
