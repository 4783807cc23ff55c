//! Concurrent profile registry

use crate::Result;
use crate::model::MessageProfile;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Profiles by message id, shared read-only across validation runs
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: DashMap<String, Arc<MessageProfile>>,
}

impl ProfileRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a profile, replacing any profile with the same id
    ///
    /// # Errors
    ///
    /// Returns an error when the profile is malformed.
    pub fn register(&self, profile: MessageProfile) -> Result<Arc<MessageProfile>> {
        profile.validate()?;
        let profile = Arc::new(profile);
        debug!("Registered profile: {}", profile.id);
        self.profiles.insert(profile.id.clone(), Arc::clone(&profile));
        Ok(profile)
    }

    /// Get a profile by message id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<MessageProfile>> {
        let found = self.profiles.get(id).map(|p| Arc::clone(p.value()));
        if found.is_none() {
            trace!("No profile registered for: {}", id);
        }
        found
    }

    /// Check if a profile exists
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.profiles.contains_key(id)
    }

    /// Registered message ids, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.profiles.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Get number of registered profiles
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Check if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
