//! Read port over the catalog of specifications and their tasks.

use crate::task::domain::{Spec, SpecId, Task, TaskKey, TaskStatus};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for spec repository operations.
pub type SpecRepositoryResult<T> = Result<T, SpecRepositoryError>;

/// Filter for [`SpecRepository::list_tasks`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    statuses: Vec<TaskStatus>,
    spec_id: Option<SpecId>,
}

impl TaskQuery {
    /// Matches every task.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            statuses: Vec::new(),
            spec_id: None,
        }
    }

    /// Restricts the query to a single status.
    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        if !self.statuses.contains(&status) {
            self.statuses.push(status);
        }
        self
    }

    /// Restricts the query to one spec.
    #[must_use]
    pub fn in_spec(mut self, spec_id: SpecId) -> Self {
        self.spec_id = Some(spec_id);
        self
    }

    /// Returns `true` when `task` satisfies the query.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&task.status());
        let spec_ok = self.spec_id.as_ref().is_none_or(|id| task.spec_id() == id);
        status_ok && spec_ok
    }
}

/// Read access to specifications and tasks.
///
/// Implementations return a point-in-time snapshot; callers must not cache
/// results across a lock acquisition.
#[async_trait]
pub trait SpecRepository: Send + Sync {
    /// Lists tasks matching `query`, ordered by spec then authoring order.
    async fn list_tasks(&self, query: &TaskQuery) -> SpecRepositoryResult<Vec<Task>>;

    /// Fetches one task.
    ///
    /// # Errors
    ///
    /// Returns [`SpecRepositoryError::TaskNotFound`] when the task does not
    /// exist.
    async fn get_task(&self, key: &TaskKey) -> SpecRepositoryResult<Task>;

    /// Fetches one spec with its tasks.
    ///
    /// # Errors
    ///
    /// Returns [`SpecRepositoryError::SpecNotFound`] when the spec does not
    /// exist.
    async fn get_spec(&self, id: &SpecId) -> SpecRepositoryResult<Spec>;

    /// Lists every spec.
    async fn list_specs(&self) -> SpecRepositoryResult<Vec<Spec>>;

    /// Returns every task, across specs, that depends on `key`.
    async fn dependents_of(&self, key: &TaskKey) -> SpecRepositoryResult<Vec<Task>> {
        let tasks = self.list_tasks(&TaskQuery::all()).await?;
        Ok(tasks.into_iter().filter(|task| task.depends_on(key)).collect())
    }
}

/// Errors returned by spec repository implementations.
#[derive(Debug, Clone, Error)]
pub enum SpecRepositoryError {
    /// The spec was not found.
    #[error("spec not found: {0}")]
    SpecNotFound(SpecId),

    /// The task was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskKey),

    /// A spec with the same identifier is already registered.
    #[error("duplicate spec identifier: {0}")]
    DuplicateSpec(SpecId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl SpecRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Returns `true` for the two not-found variants.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::SpecNotFound(_) | Self::TaskNotFound(_))
    }
}
