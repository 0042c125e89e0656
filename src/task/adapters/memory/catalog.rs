//! In-memory spec catalog.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::task::{
    domain::{Spec, SpecId, Task, TaskKey},
    ports::{SpecRepository, SpecRepositoryError, SpecRepositoryResult, TaskQuery},
};

/// Thread-safe in-memory catalog of specs.
///
/// Specs are kept in identifier order so listings are deterministic.
#[derive(Debug, Clone, Default)]
pub struct InMemorySpecRepository {
    state: Arc<RwLock<BTreeMap<SpecId, Spec>>>,
}

fn lock_poisoned(err: impl std::fmt::Display) -> SpecRepositoryError {
    SpecRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

impl InMemorySpecRepository {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding `specs`.
    ///
    /// # Errors
    ///
    /// Returns [`SpecRepositoryError::DuplicateSpec`] when two specs share an
    /// identifier.
    pub fn with_specs(specs: impl IntoIterator<Item = Spec>) -> SpecRepositoryResult<Self> {
        let repository = Self::new();
        for spec in specs {
            repository.insert(spec)?;
        }
        Ok(repository)
    }

    /// Registers a new spec.
    ///
    /// # Errors
    ///
    /// Returns [`SpecRepositoryError::DuplicateSpec`] when the identifier is
    /// already registered.
    pub fn insert(&self, spec: Spec) -> SpecRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        if state.contains_key(spec.id()) {
            return Err(SpecRepositoryError::DuplicateSpec(spec.id().clone()));
        }
        state.insert(spec.id().clone(), spec);
        Ok(())
    }

    /// Replaces an existing spec definition.
    ///
    /// # Errors
    ///
    /// Returns [`SpecRepositoryError::SpecNotFound`] when the spec is not
    /// registered.
    pub fn replace(&self, spec: Spec) -> SpecRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        let slot = state
            .get_mut(spec.id())
            .ok_or_else(|| SpecRepositoryError::SpecNotFound(spec.id().clone()))?;
        *slot = spec;
        Ok(())
    }
}

#[async_trait]
impl SpecRepository for InMemorySpecRepository {
    async fn list_tasks(&self, query: &TaskQuery) -> SpecRepositoryResult<Vec<Task>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        Ok(state
            .values()
            .flat_map(Spec::tasks)
            .filter(|task| query.matches(task))
            .cloned()
            .collect())
    }

    async fn get_task(&self, key: &TaskKey) -> SpecRepositoryResult<Task> {
        let state = self.state.read().map_err(lock_poisoned)?;
        state
            .get(key.spec_id())
            .and_then(|spec| spec.task(key.task_id()))
            .cloned()
            .ok_or_else(|| SpecRepositoryError::TaskNotFound(key.clone()))
    }

    async fn get_spec(&self, id: &SpecId) -> SpecRepositoryResult<Spec> {
        let state = self.state.read().map_err(lock_poisoned)?;
        state
            .get(id)
            .cloned()
            .ok_or_else(|| SpecRepositoryError::SpecNotFound(id.clone()))
    }

    async fn list_specs(&self) -> SpecRepositoryResult<Vec<Spec>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        Ok(state.values().cloned().collect())
    }
}
