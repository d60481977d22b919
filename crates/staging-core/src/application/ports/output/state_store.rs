//! Port for the durable environment registry.

use crate::domain::{
    PortRange, PortTriple, Slug, StagingEnvironmentRecord, StagingState, allocate_ports,
};
use crate::error::StagingResult;

/// Whole-document persistence of [`StagingState`].
///
/// Implemented by:
/// - `staging_adapters::state_store::JsonFileStateStore` (production)
/// - `staging_adapters::state_store::InMemoryStateStore` (testing)
///
/// Implementations only provide `load`, `save` and `update`; the record
/// operations are built on top of them so every store gets identical
/// upsert/idempotent-remove semantics.
pub trait StateStore: Send + Sync {
    /// Current document; the canonical empty state when nothing is stored yet.
    fn load(&self) -> StagingResult<StagingState>;

    /// Overwrite the whole document.
    fn save(&self, state: &StagingState) -> StagingResult<()>;

    /// Load, apply `change`, save - as one critical section.
    ///
    /// Nothing is written when `change` fails.
    fn update(
        &self,
        change: &mut dyn FnMut(&mut StagingState) -> StagingResult<()>,
    ) -> StagingResult<()>;

    /// Insert or fully replace `record` under its slug.
    fn add_environment(&self, record: StagingEnvironmentRecord) -> StagingResult<()> {
        self.update(&mut |state| {
            state.upsert(record.clone());
            Ok(())
        })
    }

    /// Delete `slug`; missing slugs are not an error.
    fn remove_environment(&self, slug: &Slug) -> StagingResult<Option<StagingEnvironmentRecord>> {
        let mut removed = None;
        self.update(&mut |state| {
            removed = state.remove(slug);
            Ok(())
        })?;
        Ok(removed)
    }

    fn get_environment(&self, slug: &Slug) -> StagingResult<Option<StagingEnvironmentRecord>> {
        Ok(self.load()?.get(slug).cloned())
    }

    fn list_environments(&self) -> StagingResult<Vec<StagingEnvironmentRecord>> {
        Ok(self.load()?.records().cloned().collect())
    }

    /// First free port triple in `range` against the stored state.
    ///
    /// Read-only: the triple is not reserved until a record holding it is saved.
    fn allocate_port(&self, range: PortRange) -> StagingResult<PortTriple> {
        Ok(allocate_ports(&self.load()?, range)?)
    }
}
