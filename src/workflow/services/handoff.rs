//! Eager dependency cascade run when a task completes.

use async_trait::async_trait;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audit::{
    domain::{AuditEntry, AuditEventType},
    ports::AuditSink,
};
use crate::task::{
    domain::{Task, TaskKey, TaskStatus},
    ports::{SpecRepository, SpecRepositoryResult},
};
use crate::workflow::domain::{ErrorKind, WorkflowError, WorkflowResult};

/// Performs the `blocked -> ready` transition for one dependent.
///
/// The state manager implements this so that dependents in the spec it
/// already holds are written under that lock, and dependents elsewhere
/// take their own spec lock.
#[async_trait]
pub trait TaskUnblocker: Send {
    /// Moves `key` from `blocked` to `ready`.
    async fn unblock(&mut self, key: &TaskKey) -> WorkflowResult<()>;
}

/// A dependent that could not be unblocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeFailure {
    /// The dependent, or the completed task when the scan itself failed.
    pub task_key: TaskKey,
    /// Classification of the failure.
    pub error_kind: ErrorKind,
    /// Rendered error.
    pub error: String,
}

impl CascadeFailure {
    fn new(task_key: TaskKey, err: &WorkflowError) -> Self {
        Self {
            task_key,
            error_kind: err.kind(),
            error: err.to_string(),
        }
    }
}

/// What a cascade achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffReport {
    /// Dependents moved to `ready`, in scan order.
    pub unblocked: Vec<TaskKey>,
    /// Dependents whose transition failed.
    pub failures: Vec<CascadeFailure>,
}

/// Scans dependents of a completed task and unblocks the ones whose
/// dependencies are now all complete.
#[derive(Clone)]
pub struct HandoffEngine {
    repository: Arc<dyn SpecRepository>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl HandoffEngine {
    /// Creates an engine. `repository` must reflect committed state.
    #[must_use]
    pub fn new(
        repository: Arc<dyn SpecRepository>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            repository,
            audit,
            clock,
        }
    }

    /// Unblocks every `blocked` dependent of `completed`, across specs,
    /// whose dependencies are all complete.
    ///
    /// The cascade never fails as a whole: individual failures, including
    /// a failed dependent scan, are reported in [`HandoffReport::failures`]
    /// and audited as `cascade_failed`.
    pub async fn on_task_completed(
        &self,
        completed: &TaskKey,
        unblocker: &mut dyn TaskUnblocker,
    ) -> HandoffReport {
        let mut report = HandoffReport::default();
        let dependents = match self.repository.dependents_of(completed).await {
            Ok(dependents) => dependents,
            Err(err) => {
                let failure = WorkflowError::from(err);
                self.record_failure(completed, completed, &failure).await;
                report
                    .failures
                    .push(CascadeFailure::new(completed.clone(), &failure));
                return report;
            }
        };
        for dependent in dependents
            .iter()
            .filter(|task| task.status() == TaskStatus::Blocked)
        {
            match self.try_unblock(dependent, unblocker).await {
                Ok(true) => {
                    self.record_unblocked(completed, dependent.key()).await;
                    report.unblocked.push(dependent.key().clone());
                }
                Ok(false) => {}
                Err(err) => {
                    self.record_failure(completed, dependent.key(), &err).await;
                    report
                        .failures
                        .push(CascadeFailure::new(dependent.key().clone(), &err));
                }
            }
        }
        info!(
            task = %completed,
            unblocked = report.unblocked.len(),
            failures = report.failures.len(),
            "dependency cascade finished"
        );
        report
    }

    async fn try_unblock(
        &self,
        dependent: &Task,
        unblocker: &mut dyn TaskUnblocker,
    ) -> WorkflowResult<bool> {
        if !self.dependencies_complete(dependent).await? {
            debug!(task = %dependent.key(), "dependent still waiting on other work");
            return Ok(false);
        }
        unblocker.unblock(dependent.key()).await?;
        Ok(true)
    }

    async fn dependencies_complete(&self, task: &Task) -> SpecRepositoryResult<bool> {
        for dependency in task.dependencies() {
            match self.repository.get_task(dependency).await {
                Ok(found) if found.status() == TaskStatus::Complete => {}
                Ok(_) => return Ok(false),
                Err(err) if err.is_not_found() => {
                    warn!(task = %task.key(), dependency = %dependency, "dependency not in catalog");
                    return Ok(false);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(true)
    }

    async fn record_unblocked(&self, completed: &TaskKey, dependent: &TaskKey) {
        let entry = AuditEntry::new(AuditEventType::TaskUnblocked, self.clock.utc())
            .for_task(dependent)
            .with_payload(json!({ "completed": completed.to_string() }));
        if let Err(err) = self.audit.record(entry).await {
            warn!(task = %dependent, error = %err, "failed to audit unblock");
        }
    }

    async fn record_failure(&self, completed: &TaskKey, dependent: &TaskKey, err: &WorkflowError) {
        warn!(task = %dependent, completed = %completed, error = %err, "cascade step failed");
        let entry = AuditEntry::new(AuditEventType::CascadeFailed, self.clock.utc())
            .for_task(dependent)
            .with_payload(json!({
                "completed": completed.to_string(),
                "error_kind": err.kind(),
                "error": err.to_string(),
            }));
        if let Err(audit_err) = self.audit.record(entry).await {
            warn!(task = %dependent, error = %audit_err, "failed to audit cascade failure");
        }
    }
}
