//! Catalog view with committed lifecycle state overlaid.

use async_trait::async_trait;
use std::sync::Arc;

use crate::task::{
    domain::{Spec, SpecId, Task, TaskKey},
    ports::{SpecRepository, SpecRepositoryError, SpecRepositoryResult, TaskQuery},
};
use crate::workflow::ports::StateView;

/// Wraps a catalog and overlays status, readiness time and assignment
/// from the machine-readable state view.
///
/// Tasks that were never persisted keep their catalog state.
#[derive(Clone)]
pub struct StateOverlayRepository {
    catalog: Arc<dyn SpecRepository>,
    machine: Arc<dyn StateView>,
}

impl StateOverlayRepository {
    /// Creates an overlay of `machine` onto `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<dyn SpecRepository>, machine: Arc<dyn StateView>) -> Self {
        Self { catalog, machine }
    }

    async fn overlay(&self, spec: Spec) -> SpecRepositoryResult<Spec> {
        let persisted = self
            .machine
            .load(spec.id())
            .await
            .map_err(SpecRepositoryError::persistence)?;
        let Some(snapshot) = persisted else {
            return Ok(spec);
        };
        Ok(snapshot.apply_to(spec))
    }
}

#[async_trait]
impl SpecRepository for StateOverlayRepository {
    async fn list_tasks(&self, query: &TaskQuery) -> SpecRepositoryResult<Vec<Task>> {
        let specs = self.list_specs().await?;
        Ok(specs
            .iter()
            .flat_map(Spec::tasks)
            .filter(|task| query.matches(task))
            .cloned()
            .collect())
    }

    async fn get_task(&self, key: &TaskKey) -> SpecRepositoryResult<Task> {
        let spec = match self.get_spec(key.spec_id()).await {
            Ok(spec) => spec,
            Err(SpecRepositoryError::SpecNotFound(_)) => {
                return Err(SpecRepositoryError::TaskNotFound(key.clone()));
            }
            Err(err) => return Err(err),
        };
        spec.task(key.task_id())
            .cloned()
            .ok_or_else(|| SpecRepositoryError::TaskNotFound(key.clone()))
    }

    async fn get_spec(&self, id: &SpecId) -> SpecRepositoryResult<Spec> {
        let spec = self.catalog.get_spec(id).await?;
        self.overlay(spec).await
    }

    async fn list_specs(&self) -> SpecRepositoryResult<Vec<Spec>> {
        let mut overlaid = Vec::new();
        for spec in self.catalog.list_specs().await? {
            overlaid.push(self.overlay(spec).await?);
        }
        Ok(overlaid)
    }
}
