//! Persisted state view ports.

use crate::task::domain::{Assignment, SpecId};
use crate::workflow::domain::SpecStateSnapshot;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for state view operations.
pub type StateViewResult<T> = Result<T, StateViewError>;

/// One persisted representation of per-spec task state.
///
/// Only the workflow state manager writes through this port.
#[async_trait]
pub trait StateView: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Loads a spec's snapshot, or `None` when nothing was persisted.
    async fn load(&self, spec_id: &SpecId) -> StateViewResult<Option<SpecStateSnapshot>>;

    /// Replaces a spec's persisted state with `snapshot`.
    async fn store(&self, snapshot: &SpecStateSnapshot) -> StateViewResult<()>;

    /// Removes everything persisted for a spec.
    async fn clear(&self, spec_id: &SpecId) -> StateViewResult<()>;

    /// Restores a previously loaded state, clearing when there was none.
    async fn restore(
        &self,
        spec_id: &SpecId,
        previous: Option<&SpecStateSnapshot>,
    ) -> StateViewResult<()> {
        match previous {
            Some(snapshot) => self.store(snapshot).await,
            None => self.clear(spec_id).await,
        }
    }
}

/// Bulk queries answered by the machine-readable view.
#[async_trait]
pub trait AssignmentIndex: Send + Sync {
    /// Returns every live assignment held by `agent_type`, across specs.
    async fn in_progress_for_agent(&self, agent_type: &str) -> StateViewResult<Vec<Assignment>>;
}

/// Errors returned by state views.
#[derive(Debug, Clone, Error)]
pub enum StateViewError {
    /// Persisted content could not be decoded.
    #[error("corrupt {view} view: {reason}")]
    Corrupt {
        /// Name of the view.
        view: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl StateViewError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Builds a corruption error.
    pub fn corrupt(view: &'static str, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            view,
            reason: reason.into(),
        }
    }
}
