//! Workflow error taxonomy.

use crate::audit::ports::AuditError;
use crate::routing::services::RoutingError;
use crate::task::{
    domain::{SpecId, TaskDomainError, TaskId, TaskKey, TaskStatus},
    ports::SpecRepositoryError,
};
use crate::validation::{domain::Violation, services::ValidatorError};
use crate::workflow::ports::{LockError, StateViewError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Machine-branchable classification of a [`WorkflowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A referenced task or spec does not exist.
    NotFound,
    /// The request itself was malformed.
    InvalidRequest,
    /// The validator found blocking violations.
    ValidationBlocked,
    /// The status change is not permitted from the current status.
    InvalidTransition,
    /// The views disagreed before any write.
    StateInconsistency,
    /// The views disagreed after a write and were rolled back.
    SyncFailure,
    /// Rollback after a sync failure also failed.
    RollbackFailed,
    /// The spec lock could not be acquired in time.
    LockTimeout,
    /// A storage layer failed.
    Persistence,
}

impl ErrorKind {
    /// Returns `true` when retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::ValidationBlocked | Self::LockTimeout)
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidRequest => "invalid_request",
            Self::ValidationBlocked => "validation_blocked",
            Self::InvalidTransition => "invalid_transition",
            Self::StateInconsistency => "state_inconsistency",
            Self::SyncFailure => "sync_failure",
            Self::RollbackFailed => "rollback_failed",
            Self::LockTimeout => "lock_timeout",
            Self::Persistence => "persistence",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors returned by workflow operations.
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    /// A referenced task or spec does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The validator refused the assignment.
    #[error("assignment of {task} blocked: {}", join_display(.violations))]
    ValidationBlocked {
        /// The task that could not be assigned.
        task: TaskKey,
        /// Every blocking violation.
        violations: Vec<Violation>,
    },

    /// The status change is not in the transition table.
    #[error("invalid transition for {task}: {from} -> {to}")]
    InvalidTransition {
        /// The task concerned.
        task: TaskKey,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// The task cannot become ready while dependencies are open.
    #[error("{task} has incomplete dependencies: {}", join_display(.pending))]
    UnmetDependencies {
        /// The task concerned.
        task: TaskKey,
        /// Dependencies that are not complete.
        pending: Vec<TaskKey>,
    },

    /// The two views disagreed before the transition; nothing was written.
    #[error("state views disagree for spec {spec} on: {}", join_display(.tasks))]
    StateInconsistency {
        /// The affected spec.
        spec: SpecId,
        /// Tasks whose entries differ.
        tasks: Vec<TaskId>,
    },

    /// A write or post-write check failed and both views were restored.
    #[error("sync failure for spec {spec} (rolled back): {reason}")]
    SyncFailure {
        /// The affected spec.
        spec: SpecId,
        /// What went wrong.
        reason: String,
    },

    /// Rollback failed; the views need manual reconciliation.
    #[error("rollback failed for spec {spec}; manual reconciliation required: {reason}")]
    RollbackFailed {
        /// The affected spec.
        spec: SpecId,
        /// What went wrong.
        reason: String,
    },

    /// The spec lock stayed held by another owner.
    #[error("timed out after {waited_ms}ms waiting for lock on spec {spec}")]
    LockTimeout {
        /// The contended spec.
        spec: SpecId,
        /// How long acquisition waited.
        waited_ms: u64,
    },

    /// A storage layer failed.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::ValidationBlocked { .. } => ErrorKind::ValidationBlocked,
            Self::InvalidTransition { .. } | Self::UnmetDependencies { .. } => {
                ErrorKind::InvalidTransition
            }
            Self::StateInconsistency { .. } => ErrorKind::StateInconsistency,
            Self::SyncFailure { .. } => ErrorKind::SyncFailure,
            Self::RollbackFailed { .. } => ErrorKind::RollbackFailed,
            Self::LockTimeout { .. } => ErrorKind::LockTimeout,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

impl From<TaskDomainError> for WorkflowError {
    fn from(err: TaskDomainError) -> Self {
        match err {
            TaskDomainError::InvalidStateTransition { task, from, to } => {
                Self::InvalidTransition { task, from, to }
            }
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

impl From<SpecRepositoryError> for WorkflowError {
    fn from(err: SpecRepositoryError) -> Self {
        if err.is_not_found() {
            Self::NotFound(err.to_string())
        } else {
            Self::persistence(err)
        }
    }
}

impl From<StateViewError> for WorkflowError {
    fn from(err: StateViewError) -> Self {
        Self::persistence(err)
    }
}

impl From<AuditError> for WorkflowError {
    fn from(err: AuditError) -> Self {
        Self::persistence(err)
    }
}

impl From<LockError> for WorkflowError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout { spec, waited } => Self::LockTimeout {
                spec,
                waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
            },
            other @ LockError::Persistence(_) => Self::persistence(other),
        }
    }
}

impl From<ValidatorError> for WorkflowError {
    fn from(err: ValidatorError) -> Self {
        match err {
            ValidatorError::UnknownTask(key) => Self::NotFound(format!("task not found: {key}")),
            ValidatorError::MalformedAssignment(reason) => Self::InvalidRequest(reason),
            ValidatorError::Repository(source) => source.into(),
            ValidatorError::Workload(source) => source.into(),
            ValidatorError::Audit(source) => source.into(),
        }
    }
}

impl From<RoutingError> for WorkflowError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::EmptyAgentType => {
                Self::InvalidRequest("agent type must not be empty".to_owned())
            }
            RoutingError::Agent(source) => Self::InvalidRequest(source.to_string()),
            RoutingError::Repository(source) => source.into(),
            RoutingError::Audit(source) => source.into(),
        }
    }
}
