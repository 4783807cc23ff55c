//! Validation engine
//!
//! The engine looks the message's profile up in the registry and runs the
//! structure, content and value-set checks as three blocking tasks over the
//! same shared message. The checks are pure, so running them one after the
//! other gives the same report.

use crate::content::check_content;
use crate::report::{CEntry, Report, SEntry, VSEntry};
use crate::structure::StructureValidator;
use crate::vs::check_value_sets;
use crate::{Error, Result};
use hl7_ir::Message;
use hl7_profile::{Binder, MessageProfile, ProfileRegistry, RawMessage, ValueSetLibrary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task;
use tracing::{debug, info};

/// Validation configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Run the structure check
    pub structure: bool,
    /// Run constraints and predicates
    pub content: bool,
    /// Run value-set bindings
    pub value_sets: bool,
    /// Report empty `RE` positions
    pub report_re_usage: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            structure: true,
            content: true,
            value_sets: true,
            report_re_usage: false,
        }
    }
}

/// Main validation engine
pub struct ValidationEngine {
    registry: Arc<ProfileRegistry>,
    library: Arc<dyn ValueSetLibrary>,
    config: ValidationConfig,
}

impl ValidationEngine {
    /// Create a new validation engine with the default configuration
    pub fn new(registry: Arc<ProfileRegistry>, library: Arc<dyn ValueSetLibrary>) -> Self {
        Self {
            registry,
            library,
            config: ValidationConfig::default(),
        }
    }

    /// Use a specific configuration
    #[must_use]
    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProfileRegistry> {
        &self.registry
    }

    /// Bind a split message with the profile registered for `message_id`
    ///
    /// # Errors
    ///
    /// Returns an error when no profile is registered for the id or the
    /// message cannot be bound.
    pub fn bind(&self, message_id: &str, raw: RawMessage) -> Result<Message> {
        let profile = self.profile(message_id)?;
        Ok(Binder::new(&profile).bind(raw)?)
    }

    /// Validate a message, running the three checks concurrently
    ///
    /// # Errors
    ///
    /// Returns an error when no profile is registered for the message id or
    /// a check task panics.
    pub async fn validate(&self, message: Arc<Message>) -> Result<Report> {
        let profile = self.profile(&message.id)?;
        let config = self.config;
        info!("Validating message {}", message.id);

        let structure = {
            let message = Arc::clone(&message);
            task::spawn_blocking(move || run_structure(config, &message))
        };
        let content = {
            let message = Arc::clone(&message);
            let profile = Arc::clone(&profile);
            task::spawn_blocking(move || run_content(config, &message, &profile))
        };
        let value_set = {
            let message = Arc::clone(&message);
            let library = Arc::clone(&self.library);
            task::spawn_blocking(move || run_value_sets(config, &message, &profile, library.as_ref()))
        };

        let (structure, content, value_set) = tokio::try_join!(structure, content, value_set)?;
        Ok(finish(&message, Report::new(structure, content, value_set)))
    }

    /// Validate a message on the current thread
    ///
    /// # Errors
    ///
    /// Returns an error when no profile is registered for the message id.
    pub fn validate_blocking(&self, message: &Message) -> Result<Report> {
        let profile = self.profile(&message.id)?;
        let config = self.config;
        info!("Validating message {}", message.id);

        let report = Report::new(
            run_structure(config, message),
            run_content(config, message, &profile),
            run_value_sets(config, message, &profile, self.library.as_ref()),
        );
        Ok(finish(message, report))
    }

    fn profile(&self, id: &str) -> Result<Arc<MessageProfile>> {
        self.registry
            .get(id)
            .ok_or_else(|| Error::UnknownMessage(id.to_string()))
    }
}

fn run_structure(config: ValidationConfig, message: &Message) -> Vec<SEntry> {
    if !config.structure {
        debug!("Structure check disabled");
        return Vec::new();
    }
    StructureValidator::new()
        .with_re_usage(config.report_re_usage)
        .check(message)
}

fn run_content(config: ValidationConfig, message: &Message, profile: &MessageProfile) -> Vec<CEntry> {
    if !config.content {
        debug!("Content check disabled");
        return Vec::new();
    }
    check_content(message, profile)
}

fn run_value_sets(
    config: ValidationConfig,
    message: &Message,
    profile: &MessageProfile,
    library: &dyn ValueSetLibrary,
) -> Vec<VSEntry> {
    if !config.value_sets {
        debug!("Value-set check disabled");
        return Vec::new();
    }
    check_value_sets(message, profile, library)
}

fn finish(message: &Message, report: Report) -> Report {
    info!(
        "Validated message {}: {} errors, {} warnings",
        message.id,
        report.error_count(),
        report.warning_count()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl7_expression::Expression;
    use hl7_ir::{Range, Req, Usage};
    use hl7_profile::{
        Code, ContentConstraint, InMemoryValueSetLibrary, RawNode, ValueSet, ValueSetBinding,
        ValueSetSpec,
    };

    fn engine() -> ValidationEngine {
        let one = Range::bounded(1, 1).unwrap();
        let profile = MessageProfile::new(
            "ADT_A01",
            vec![Req::new(1, Usage::R, one).named("PID").with_children(vec![
                Req::new(3, Usage::R, one),
                Req::new(8, Usage::O, one),
                Req::new(9, Usage::RE, one),
            ])],
        )
        .with_constraint(ContentConstraint::new("C1", "1[1]", Expression::presence("8[1]")))
        .with_binding(ValueSetBinding::new("1[1].8[1]", ValueSetSpec::new("HL70001")));

        let registry = Arc::new(ProfileRegistry::new());
        registry.register(profile).unwrap();
        let library: InMemoryValueSetLibrary =
            std::iter::once(ValueSet::new("HL70001").with_code(Code::new("F", "HL70001"))).collect();
        ValidationEngine::new(registry, Arc::new(library))
    }

    fn raw(pid: Vec<RawNode>) -> RawMessage {
        RawMessage {
            id: Some("ADT_A01".into()),
            separators: "|^~\\&".into(),
            segments: vec![RawNode::node(1, 1, pid)],
            invalid: Vec::new(),
            unexpected: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_validate_collects_all_checks() {
        let engine = engine();
        let message = engine.bind("ADT_A01", raw(vec![RawNode::leaf(8, 1, "Q")])).unwrap();

        let report = engine.validate(Arc::new(message)).await.unwrap();
        assert!(matches!(report.structure.as_slice(), [SEntry::RUsage { position: 3, .. }]));
        assert!(matches!(report.content.as_slice(), [CEntry::Success { .. }]));
        assert!(matches!(report.value_set.as_slice(), [VSEntry::CodeNotFound { .. }]));
        assert_eq!(report.error_count(), 2);
        assert!(!report.is_valid());
    }

    #[tokio::test]
    async fn test_concurrent_and_sequential_reports_match() {
        let engine = engine();
        let message = engine
            .bind("ADT_A01", raw(vec![RawNode::leaf(3, 1, "1"), RawNode::leaf(8, 1, "F")]))
            .unwrap();

        let sequential = engine.validate_blocking(&message).unwrap();
        let concurrent = engine.validate(Arc::new(message)).await.unwrap();
        assert_eq!(sequential, concurrent);
        assert!(concurrent.is_valid());
    }

    #[tokio::test]
    async fn test_unknown_message_is_an_error() {
        let engine = engine();
        let mut message = engine.bind("ADT_A01", raw(vec![RawNode::leaf(3, 1, "1")])).unwrap();
        message.id = "ORU_R01".into();

        let err = engine.validate(Arc::new(message)).await.unwrap_err();
        assert!(matches!(err, Error::UnknownMessage(id) if id == "ORU_R01"));
        assert!(matches!(engine.bind("ORU_R01", raw(vec![])), Err(Error::UnknownMessage(_))));
    }

    #[test]
    fn test_disabled_checks_are_skipped() {
        let config = ValidationConfig {
            structure: false,
            value_sets: false,
            ..ValidationConfig::default()
        };
        let engine = engine().with_config(config);
        let message = engine.bind("ADT_A01", raw(vec![RawNode::leaf(8, 1, "Q")])).unwrap();

        let report = engine.validate_blocking(&message).unwrap();
        assert!(report.structure.is_empty());
        assert!(report.value_set.is_empty());
        assert_eq!(report.content.len(), 1);
    }

    #[test]
    fn test_re_usage_option() {
        let engine = engine().with_config(ValidationConfig {
            report_re_usage: true,
            ..ValidationConfig::default()
        });
        let message = engine
            .bind("ADT_A01", raw(vec![RawNode::leaf(3, 1, "1"), RawNode::leaf(8, 1, "F")]))
            .unwrap();

        let report = engine.validate_blocking(&message).unwrap();
        assert!(matches!(report.structure.as_slice(), [SEntry::REUsage { position: 9, .. }]));
        assert!(report.is_valid());
    }

    #[test]
    fn test_config_defaults_when_deserialized() {
        let config: ValidationConfig = serde_yaml::from_str("value_sets: false").unwrap();
        assert!(config.structure);
        assert!(config.content);
        assert!(!config.value_sets);
        assert!(!config.report_re_usage);
    }
}
