//! The root persisted document.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, Slug, StagingEnvironmentRecord};

/// Current schema version of `staging.json`.
pub const STATE_VERSION: u32 = 1;

/// Every environment this project is tracking, keyed by slug.
///
/// A plain value: loaded fresh at the start of every command, modified in
/// memory, written back whole. Never cached across invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingState {
    pub version: u32,
    #[serde(default)]
    pub environments: BTreeMap<String, StagingEnvironmentRecord>,
}

impl Default for StagingState {
    fn default() -> Self {
        Self::empty()
    }
}

impl StagingState {
    /// The canonical empty state `{ version: 1, environments: {} }`.
    pub fn empty() -> Self {
        Self {
            version: STATE_VERSION,
            environments: BTreeMap::new(),
        }
    }

    /// Reject documents this build cannot safely interpret.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.version != STATE_VERSION {
            return Err(DomainError::UnsupportedStateVersion {
                found: self.version,
                supported: STATE_VERSION,
            });
        }
        for (key, record) in &self.environments {
            if key != record.slug.as_str() {
                return Err(DomainError::SlugKeyMismatch {
                    key: key.clone(),
                    slug: record.slug.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Insert or fully replace the record under its slug.
    ///
    /// Returns the record that was replaced, if any.
    pub fn upsert(&mut self, record: StagingEnvironmentRecord) -> Option<StagingEnvironmentRecord> {
        self.environments
            .insert(record.slug.as_str().to_owned(), record)
    }

    /// Remove a record; absent slugs are a no-op.
    pub fn remove(&mut self, slug: &Slug) -> Option<StagingEnvironmentRecord> {
        self.environments.remove(slug.as_str())
    }

    pub fn get(&self, slug: &Slug) -> Option<&StagingEnvironmentRecord> {
        self.environments.get(slug.as_str())
    }

    pub fn get_mut(&mut self, slug: &Slug) -> Option<&mut StagingEnvironmentRecord> {
        self.environments.get_mut(slug.as_str())
    }

    pub fn records(&self) -> impl Iterator<Item = &StagingEnvironmentRecord> {
        self.environments.values()
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }

    /// Union of every port assigned to any environment.
    pub fn ports_in_use(&self) -> HashSet<u16> {
        self.records()
            .flat_map(StagingEnvironmentRecord::assigned_ports)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PortTriple;

    fn rec(slug: &str) -> StagingEnvironmentRecord {
        StagingEnvironmentRecord::new(Slug::from_branch(slug).unwrap(), slug, "docker-compose")
    }

    #[test]
    fn empty_state_is_version_one() {
        let state = StagingState::empty();
        assert_eq!(state.version, 1);
        assert!(state.is_empty());
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            serde_json::json!({ "version": 1, "environments": {} })
        );
    }

    #[test]
    fn upsert_replaces_instead_of_duplicating() {
        let mut state = StagingState::empty();
        assert!(state.upsert(rec("test")).is_none());
        let mut newer = rec("test");
        newer.branch = "other".into();
        assert!(state.upsert(newer).is_some());
        assert_eq!(state.len(), 1);
        assert_eq!(state.records().next().unwrap().branch, "other");
    }

    #[test]
    fn ports_in_use_skips_missing_roles() {
        let mut state = StagingState::empty();
        state.upsert(rec("a").with_ports(PortTriple::starting_at(4001)));
        let mut partial = rec("b");
        partial.ports = Some(crate::domain::EnvironmentPorts {
            api: Some(5000),
            app: None,
            db: None,
        });
        state.upsert(partial);
        state.upsert(rec("c"));

        let used = state.ports_in_use();
        assert_eq!(used.len(), 4);
        assert!(used.contains(&5000));
        assert!(used.contains(&4003));
    }

    #[test]
    fn validate_rejects_unknown_version() {
        let state = StagingState {
            version: 2,
            ..StagingState::empty()
        };
        assert!(matches!(
            state.validate(),
            Err(DomainError::UnsupportedStateVersion { found: 2, .. })
        ));
    }

    #[test]
    fn validate_rejects_mismatched_keys() {
        let mut state = StagingState::empty();
        state.environments.insert("wrong".into(), rec("right"));
        assert!(matches!(
            state.validate(),
            Err(DomainError::SlugKeyMismatch { .. })
        ));
    }

    #[test]
    fn removing_missing_slug_is_noop() {
        let mut state = StagingState::empty();
        assert!(state.remove(&Slug::parse("nope").unwrap()).is_none());
    }
}
