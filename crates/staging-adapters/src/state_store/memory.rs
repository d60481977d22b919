//! In-memory state store for tests and dry runs.

use std::sync::{Arc, RwLock};

use staging_core::{
    application::{ApplicationError, ports::StateStore},
    domain::StagingState,
    error::StagingResult,
};

/// Thread-safe in-memory state store. Clones share the same document.
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    inner: Arc<RwLock<StagingState>>,
}

impl InMemoryStateStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStateStore {
    fn load(&self) -> StagingResult<StagingState> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner.clone())
    }

    fn save(&self, state: &StagingState) -> StagingResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        *inner = state.clone();
        Ok(())
    }

    fn update(
        &self,
        change: &mut dyn FnMut(&mut StagingState) -> StagingResult<()>,
    ) -> StagingResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        let mut next = inner.clone();
        change(&mut next)?;
        *inner = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use staging_core::domain::{Slug, StagingEnvironmentRecord};

    #[test]
    fn clones_share_state() {
        let store = InMemoryStateStore::new();
        let other = store.clone();
        store
            .add_environment(StagingEnvironmentRecord::new(
                Slug::parse("a").unwrap(),
                "a",
                "memory",
            ))
            .unwrap();
        assert_eq!(other.list_environments().unwrap().len(), 1);
    }

    #[test]
    fn listing_contains_both_slugs() {
        let store = InMemoryStateStore::new();
        for slug in ["b", "a"] {
            store
                .add_environment(StagingEnvironmentRecord::new(
                    Slug::parse(slug).unwrap(),
                    slug,
                    "memory",
                ))
                .unwrap();
        }
        let slugs: Vec<_> = store
            .list_environments()
            .unwrap()
            .into_iter()
            .map(|r| r.slug.into_string())
            .collect();
        assert_eq!(slugs, vec!["a", "b"]);
    }
}
