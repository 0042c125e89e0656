//! Error types for task domain validation and parsing.

use super::{SpecId, TaskKey, TaskStatus};
use thiserror::Error;

/// Errors returned while constructing or mutating domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The spec identifier is empty or malformed.
    #[error("invalid spec identifier '{0}'")]
    InvalidSpecId(String),

    /// The task identifier is empty or malformed.
    #[error("invalid task identifier '{0}'")]
    InvalidTaskId(String),

    /// The task reference does not follow `specId:taskId` format.
    #[error("invalid task reference '{0}', expected specId:taskId")]
    InvalidTaskKey(String),

    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTaskTitle,

    /// A capability tag is empty or contains whitespace.
    #[error("invalid capability tag '{0}'")]
    InvalidCapability(String),

    /// The agent type is empty after trimming.
    #[error("agent type must not be empty")]
    EmptyAgentType,

    /// The agent type holds a character the status board cannot store.
    #[error("invalid agent type '{0}': no '|', control characters, or bare '-'")]
    InvalidAgentType(String),

    /// A task declares a dependency on itself.
    #[error("task {0} cannot depend on itself")]
    SelfDependency(TaskKey),

    /// A task was added to a spec it does not belong to.
    #[error("task {task} does not belong to spec {spec}")]
    ForeignTask {
        /// The spec receiving the task.
        spec: SpecId,
        /// The offending task.
        task: TaskKey,
    },

    /// A spec already holds a task with the same identifier.
    #[error("duplicate task {0}")]
    DuplicateTask(TaskKey),

    /// The requested state transition is not permitted.
    #[error("invalid state transition for task {task}: {from} -> {to}")]
    InvalidStateTransition {
        /// The task whose transition was rejected.
        task: TaskKey,
        /// The current task status.
        from: TaskStatus,
        /// The requested target status.
        to: TaskStatus,
    },

    /// A spec cannot be closed while it owns unfinished tasks.
    #[error("spec {spec} still owns {open} non-complete task(s)")]
    SpecHasOpenTasks {
        /// The spec that was asked to close.
        spec: SpecId,
        /// Number of non-complete tasks.
        open: usize,
    },

    /// A confidence value outside `0..=1` was supplied.
    #[error("confidence must lie within 0..=1, got {0}")]
    InvalidConfidence(String),
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

/// Error returned while parsing spec statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown spec status: {0}")]
pub struct ParseSpecStatusError(pub String);

/// Error returned while parsing priority tiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown priority: {0}, expected P0-P3")]
pub struct ParsePriorityError(pub String);
