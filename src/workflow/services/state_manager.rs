//! Commits task transitions to both state views under a per-spec lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::dual_write::{DualWrite, ViewPair};
use super::handoff::{CascadeFailure, HandoffEngine, TaskUnblocker};
use crate::audit::{
    domain::{AuditEntry, AuditEventType},
    ports::AuditSink,
};
use crate::task::{
    domain::{Assignment, Spec, SpecId, Task, TaskKey, TaskStatus},
    ports::SpecRepository,
};
use crate::validation::{
    domain::{ProposedAssignment, ValidationOptions, ValidationReport},
    services::AssignmentValidator,
};
use crate::workflow::{
    domain::{Divergence, SpecStateSnapshot, TaskStateEntry, WorkflowError, WorkflowResult},
    ports::{SpecLease, SpecLocker},
};

/// Caller choices for [`WorkflowStateManager::assign_task`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignOptions {
    /// Confirms top-tier work.
    pub confirm_critical: bool,
    /// Downgrades a workload violation to a warning.
    pub override_workload: bool,
    /// When the task was recommended, for the staleness warning.
    pub recommended_at: Option<DateTime<Utc>>,
    /// Who requested the assignment; defaults to the agent itself.
    pub assigned_by: Option<String>,
}

impl AssignOptions {
    /// Sets critical-work confirmation.
    #[must_use]
    pub const fn confirming_critical(mut self, confirm: bool) -> Self {
        self.confirm_critical = confirm;
        self
    }

    /// Sets the workload override.
    #[must_use]
    pub const fn overriding_workload(mut self, override_workload: bool) -> Self {
        self.override_workload = override_workload;
        self
    }

    /// Records when the task was recommended.
    #[must_use]
    pub const fn recommended_at(mut self, at: DateTime<Utc>) -> Self {
        self.recommended_at = Some(at);
        self
    }

    /// Records who requested the assignment.
    #[must_use]
    pub fn assigned_by(mut self, requester: impl Into<String>) -> Self {
        self.assigned_by = Some(requester.into());
        self
    }

    fn validation_options(&self) -> ValidationOptions {
        let mut options = ValidationOptions::default()
            .confirming_critical(self.confirm_critical)
            .overriding_workload(self.override_workload);
        options.recommended_at = self.recommended_at;
        options
    }
}

/// A committed assignment and the verdict that allowed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignOutcome {
    /// The live assignment.
    pub assignment: Assignment,
    /// The validation run under the spec lock.
    pub validation: ValidationReport,
}

/// What a completion changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSummary {
    /// The completed task.
    pub task_key: TaskKey,
    /// Completion time.
    pub completed_at: DateTime<Utc>,
    /// Dependents moved from `blocked` to `ready`.
    pub unblocked: Vec<TaskKey>,
    /// Dependents the cascade could not move.
    pub cascade_failures: Vec<CascadeFailure>,
    /// Every task of the owning spec is now complete.
    pub spec_ready_to_close: bool,
}

/// Lock-scoped working copy of one spec.
struct Working {
    spec: Spec,
    pair: ViewPair,
    current: SpecStateSnapshot,
}

impl Working {
    fn task(&self, key: &TaskKey) -> WorkflowResult<Task> {
        self.spec
            .task(key.task_id())
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(format!("task not found: {key}")))
    }

    fn committed(&mut self, next: SpecStateSnapshot, task: Task) {
        self.pair = ViewPair::agreeing(&next);
        self.current = next;
        if let Some(slot) = self.spec.task_mut(task.id()) {
            *slot = task;
        }
    }
}

/// The only writer of persisted task state.
///
/// Each operation takes the owning spec's lock, reads both views,
/// refuses to proceed when they disagree, writes through [`DualWrite`]
/// and releases the lock whatever the outcome.
#[derive(Clone)]
pub struct WorkflowStateManager {
    catalog: Arc<dyn SpecRepository>,
    committed: Arc<dyn SpecRepository>,
    views: DualWrite,
    locker: Arc<dyn SpecLocker>,
    validator: AssignmentValidator,
    handoff: HandoffEngine,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock + Send + Sync>,
}

/// Collaborators of a [`WorkflowStateManager`].
pub struct StateManagerParts {
    /// Catalog definitions, without persisted state.
    pub catalog: Arc<dyn SpecRepository>,
    /// Catalog with committed state overlaid.
    pub committed: Arc<dyn SpecRepository>,
    /// The two persisted views.
    pub views: DualWrite,
    /// Per-spec lock.
    pub locker: Arc<dyn SpecLocker>,
    /// Assignment gate re-run under the lock.
    pub validator: AssignmentValidator,
    /// Completion cascade.
    pub handoff: HandoffEngine,
    /// Audit sink.
    pub audit: Arc<dyn AuditSink>,
    /// Time source.
    pub clock: Arc<dyn Clock + Send + Sync>,
}

impl WorkflowStateManager {
    /// Creates a manager from its collaborators.
    #[must_use]
    pub fn new(parts: StateManagerParts) -> Self {
        Self {
            catalog: parts.catalog,
            committed: parts.committed,
            views: parts.views,
            locker: parts.locker,
            validator: parts.validator,
            handoff: parts.handoff,
            audit: parts.audit,
            clock: parts.clock,
        }
    }

    /// Assigns a `ready` task to `agent_type`.
    ///
    /// The validator is re-run under the spec lock; blocking violations
    /// refuse the assignment even when the caller skipped validation.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidTransition`] unless the task is
    /// `ready`, [`WorkflowError::ValidationBlocked`] with every violation,
    /// and the lock, consistency and sync failures of the write protocol.
    pub async fn assign_task(
        &self,
        key: &TaskKey,
        agent_type: &str,
        options: &AssignOptions,
    ) -> WorkflowResult<AssignOutcome> {
        let lease = self.acquire(key.spec_id()).await;
        let result = match &lease {
            Ok(_) => self.assign_locked(key, agent_type, options).await,
            Err(err) => Err(err.clone()),
        };
        self.finish(lease, "assign", key, result).await
    }

    /// Completes an `in_progress` task and unblocks its dependents before
    /// returning.
    ///
    /// Dependents in the same spec are written under the lock already
    /// held; dependents in other specs take their own lock in turn.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidTransition`] unless the task is
    /// `in_progress`, and the lock, consistency and sync failures of the
    /// write protocol. Cascade failures are reported in the summary.
    pub async fn complete_task(&self, key: &TaskKey) -> WorkflowResult<CompletionSummary> {
        let lease = self.acquire(key.spec_id()).await;
        let result = match &lease {
            Ok(_) => self.complete_locked(key).await,
            Err(err) => Err(err.clone()),
        };
        self.finish(lease, "complete", key, result).await
    }

    /// Returns an `in_progress` task to `ready`, dropping its assignment.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidTransition`] unless the task is
    /// `in_progress`.
    pub async fn release_task(&self, key: &TaskKey) -> WorkflowResult<Task> {
        let lease = self.acquire(key.spec_id()).await;
        let result = match &lease {
            Ok(_) => self.release_locked(key).await,
            Err(err) => Err(err.clone()),
        };
        self.finish(lease, "release", key, result).await
    }

    /// Moves a task to `blocked`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidTransition`] for `blocked` and
    /// `complete` tasks.
    pub async fn block_task(&self, key: &TaskKey, reason: &str) -> WorkflowResult<Task> {
        let lease = self.acquire(key.spec_id()).await;
        let result = match &lease {
            Ok(_) => self.block_locked(key, reason).await,
            Err(err) => Err(err.clone()),
        };
        self.finish(lease, "block", key, result).await
    }

    /// Moves a `blocked` or `backlog` task to `ready`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::UnmetDependencies`] while any dependency
    /// is incomplete and [`WorkflowError::InvalidTransition`] for other
    /// statuses.
    pub async fn unblock_task(&self, key: &TaskKey) -> WorkflowResult<Task> {
        let lease = self.acquire(key.spec_id()).await;
        let result = match &lease {
            Ok(_) => match self.load_working(key.spec_id()).await {
                Ok(mut working) => self.unblock_in(&mut working, key).await,
                Err(err) => Err(err),
            },
            Err(err) => Err(err.clone()),
        };
        self.finish(lease, "unblock", key, result).await
    }

    /// Lists every task whose two views disagree. Read-only and lock-free.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Persistence`] when a view cannot be read.
    pub async fn reconcile_report(&self, spec_id: &SpecId) -> WorkflowResult<Vec<Divergence>> {
        let pair = self.views.load_pair(spec_id).await?;
        let divergences = pair.divergences();
        if !divergences.is_empty() {
            warn!(spec_id = %spec_id, tasks = divergences.len(), "state views disagree");
        }
        Ok(divergences)
    }

    async fn assign_locked(
        &self,
        key: &TaskKey,
        agent_type: &str,
        options: &AssignOptions,
    ) -> WorkflowResult<AssignOutcome> {
        let mut working = self.load_working(key.spec_id()).await?;
        let mut task = working.task(key)?;
        ensure_transition(&task, TaskStatus::InProgress)?;
        let proposal = ProposedAssignment::new(key.clone(), agent_type)?;
        let validation = self
            .validator
            .validate(&proposal, &options.validation_options())
            .await?;
        if !validation.can_proceed {
            return Err(WorkflowError::ValidationBlocked {
                task: key.clone(),
                violations: validation.violations,
            });
        }
        let requester = options
            .assigned_by
            .clone()
            .unwrap_or_else(|| proposal.agent_type().to_owned());
        let assignment = Assignment::new(key.clone(), proposal.agent_type(), self.clock.utc())
            .with_confidence(validation.confidence)
            .with_assigned_by(requester);
        task.assign(assignment.clone())?;
        self.commit(&mut working, task).await?;
        self.record_committed(
            key,
            "assign",
            TaskStatus::Ready,
            TaskStatus::InProgress,
            json!({
                "agent_type": assignment.agent_type,
                "assigned_by": assignment.assigned_by,
                "confidence": assignment.confidence.basis_points(),
            }),
        )
        .await;
        info!(task = %key, agent_type = %assignment.agent_type, "task assigned");
        Ok(AssignOutcome {
            assignment,
            validation,
        })
    }

    async fn complete_locked(&self, key: &TaskKey) -> WorkflowResult<CompletionSummary> {
        let mut working = self.load_working(key.spec_id()).await?;
        let mut task = working.task(key)?;
        let completed_at = self.clock.utc();
        let assignee = task
            .assignment()
            .map(|assignment| assignment.agent_type.clone());
        task.transition_to(TaskStatus::Complete, completed_at)?;
        self.commit(&mut working, task).await?;
        self.record_committed(
            key,
            "complete",
            TaskStatus::InProgress,
            TaskStatus::Complete,
            json!({ "agent_type": assignee }),
        )
        .await;
        info!(task = %key, "task completed");

        let mut unblocker = CascadeUnblocker {
            manager: self,
            working: &mut working,
        };
        let cascade = self.handoff.on_task_completed(key, &mut unblocker).await;
        Ok(CompletionSummary {
            task_key: key.clone(),
            completed_at,
            unblocked: cascade.unblocked,
            cascade_failures: cascade.failures,
            spec_ready_to_close: working.spec.can_close(),
        })
    }

    async fn release_locked(&self, key: &TaskKey) -> WorkflowResult<Task> {
        let mut working = self.load_working(key.spec_id()).await?;
        let mut task = working.task(key)?;
        if task.status() != TaskStatus::InProgress {
            return Err(WorkflowError::InvalidTransition {
                task: key.clone(),
                from: task.status(),
                to: TaskStatus::Ready,
            });
        }
        let released = task
            .assignment()
            .map(|assignment| assignment.agent_type.clone());
        task.transition_to(TaskStatus::Ready, self.clock.utc())?;
        self.commit(&mut working, task.clone()).await?;
        self.record_committed(
            key,
            "release",
            TaskStatus::InProgress,
            TaskStatus::Ready,
            json!({ "released_from": released }),
        )
        .await;
        Ok(task)
    }

    async fn block_locked(&self, key: &TaskKey, reason: &str) -> WorkflowResult<Task> {
        let mut working = self.load_working(key.spec_id()).await?;
        let mut task = working.task(key)?;
        let from = task.status();
        task.transition_to(TaskStatus::Blocked, self.clock.utc())?;
        self.commit(&mut working, task.clone()).await?;
        self.record_committed(
            key,
            "block",
            from,
            TaskStatus::Blocked,
            json!({ "reason": reason }),
        )
        .await;
        Ok(task)
    }

    async fn unblock_in(&self, working: &mut Working, key: &TaskKey) -> WorkflowResult<Task> {
        let mut task = working.task(key)?;
        let from = task.status();
        if !matches!(from, TaskStatus::Blocked | TaskStatus::Backlog) {
            return Err(WorkflowError::InvalidTransition {
                task: key.clone(),
                from,
                to: TaskStatus::Ready,
            });
        }
        let pending = self.pending_dependencies(working, &task).await?;
        if !pending.is_empty() {
            return Err(WorkflowError::UnmetDependencies {
                task: key.clone(),
                pending,
            });
        }
        task.transition_to(TaskStatus::Ready, self.clock.utc())?;
        self.commit(working, task.clone()).await?;
        self.record_committed(key, "unblock", from, TaskStatus::Ready, Value::Null)
            .await;
        Ok(task)
    }

    async fn pending_dependencies(
        &self,
        working: &Working,
        task: &Task,
    ) -> WorkflowResult<Vec<TaskKey>> {
        let mut pending = Vec::new();
        for dependency in task.dependencies() {
            let status = if dependency.spec_id() == working.spec.id() {
                working
                    .spec
                    .task(dependency.task_id())
                    .map(Task::status)
            } else {
                match self.committed.get_task(dependency).await {
                    Ok(found) => Some(found.status()),
                    Err(err) if err.is_not_found() => None,
                    Err(err) => return Err(err.into()),
                }
            };
            if status != Some(TaskStatus::Complete) {
                pending.push(dependency.clone());
            }
        }
        Ok(pending)
    }

    async fn load_working(&self, spec_id: &SpecId) -> WorkflowResult<Working> {
        let catalog = self.catalog.get_spec(spec_id).await?;
        let pair = self.views.load_pair(spec_id).await?;
        let current = pair.consistent_state(&catalog)?;
        let spec = current.apply_to(catalog);
        Ok(Working {
            spec,
            pair,
            current,
        })
    }

    async fn commit(&self, working: &mut Working, task: Task) -> WorkflowResult<()> {
        let mut next = working.current.clone();
        next.insert(task.id().clone(), TaskStateEntry::of(&task));
        self.views.commit(&working.pair, &next).await?;
        debug!(task = %task.key(), status = %task.status(), "transition written to both views");
        working.committed(next, task);
        Ok(())
    }

    async fn acquire(&self, spec_id: &SpecId) -> WorkflowResult<SpecLease> {
        let lease = self.locker.acquire(spec_id).await?;
        if let Some(previous) = lease.stolen_from {
            let entry = AuditEntry::new(AuditEventType::LockStolen, self.clock.utc())
                .for_spec(spec_id)
                .with_payload(json!({
                    "previous_token": previous.to_string(),
                    "token": lease.token.to_string(),
                }));
            self.record(entry).await;
        }
        Ok(lease)
    }

    async fn finish<T: Send>(
        &self,
        lease: WorkflowResult<SpecLease>,
        operation: &'static str,
        key: &TaskKey,
        result: WorkflowResult<T>,
    ) -> WorkflowResult<T> {
        if let Ok(held) = lease
            && let Err(err) = self.locker.release(&held).await
        {
            warn!(spec_id = %held.spec_id, error = %err, "failed to release spec lock");
        }
        if let Err(err) = &result {
            warn!(task = %key, operation, error = %err, kind = %err.kind(), "transition failed");
            let entry = AuditEntry::new(AuditEventType::TransitionFailed, self.clock.utc())
                .for_task(key)
                .with_payload(json!({
                    "operation": operation,
                    "error_kind": err.kind(),
                    "error": err.to_string(),
                }));
            self.record(entry).await;
        }
        result
    }

    async fn record_committed(
        &self,
        key: &TaskKey,
        operation: &'static str,
        from: TaskStatus,
        to: TaskStatus,
        details: Value,
    ) {
        let entry = AuditEntry::new(AuditEventType::TransitionCommitted, self.clock.utc())
            .for_task(key)
            .with_payload(json!({
                "operation": operation,
                "from": from,
                "to": to,
                "details": details,
            }));
        self.record(entry).await;
    }

    async fn record(&self, entry: AuditEntry) {
        let event_type = entry.event_type;
        if let Err(err) = self.audit.record(entry).await {
            warn!(event_type = %event_type, error = %err, "failed to record audit event");
        }
    }
}

fn ensure_transition(task: &Task, target: TaskStatus) -> WorkflowResult<()> {
    if task.status().can_transition_to(target) {
        Ok(())
    } else {
        Err(WorkflowError::InvalidTransition {
            task: task.key().clone(),
            from: task.status(),
            to: target,
        })
    }
}

/// Routes cascade steps either into the held spec or through a fresh
/// lock on another spec.
struct CascadeUnblocker<'a> {
    manager: &'a WorkflowStateManager,
    working: &'a mut Working,
}

#[async_trait]
impl TaskUnblocker for CascadeUnblocker<'_> {
    async fn unblock(&mut self, key: &TaskKey) -> WorkflowResult<()> {
        if key.spec_id() == self.working.spec.id() {
            self.manager.unblock_in(self.working, key).await?;
        } else {
            self.manager.unblock_task(key).await?;
        }
        Ok(())
    }
}
