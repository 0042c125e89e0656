//! Task aggregate and its lifecycle types.

use super::{
    Assignment, CapabilitySet, ParsePriorityError, ParseTaskStatusError, SpecId, TaskDomainError,
    TaskId, TaskKey,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle status.
///
/// The permitted transitions live in one table,
/// [`TaskStatus::can_transition_to`]:
///
/// ```text
/// backlog ──> ready ──> in_progress ──> complete
///    │          ▲ │         │ │
///    │          │ │         │ └──> ready (release)
///    ▼          │ ▼         ▼
///    └──────> blocked <─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Authored but not yet scheduled.
    Backlog,
    /// Every dependency is complete and the task awaits an agent.
    Ready,
    /// Held by exactly one live assignment.
    InProgress,
    /// Waiting on incomplete dependencies.
    Blocked,
    /// Finished.
    Complete,
}

impl TaskStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Backlog,
        Self::Ready,
        Self::InProgress,
        Self::Blocked,
        Self::Complete,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Complete => "complete",
        }
    }

    /// Returns `true` when the transition `self -> target` is permitted.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Backlog, Self::Ready | Self::Blocked)
                | (Self::Ready, Self::InProgress | Self::Blocked)
                | (
                    Self::InProgress,
                    Self::Complete | Self::Blocked | Self::Ready
                )
                | (Self::Blocked, Self::Ready)
        )
    }

    /// Returns `true` when no further transitions are permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "backlog" => Ok(Self::Backlog),
            "ready" => Ok(Self::Ready),
            "in_progress" => Ok(Self::InProgress),
            "blocked" => Ok(Self::Blocked),
            "complete" => Ok(Self::Complete),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority tier, `P0` being the most urgent.
///
/// The derived ordering follows declaration order, so `P0 < P1`; use
/// [`Priority::weight`] when "higher priority" is the intended sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Critical tier; assignment requires explicit confirmation.
    P0,
    /// High priority.
    P1,
    /// Normal priority.
    P2,
    /// Low priority.
    P3,
}

impl Priority {
    /// Number of tiers.
    pub const TIERS: u32 = 4;

    /// Returns the zero-based ordinal (`P0` is `0`).
    #[must_use]
    pub const fn ordinal(self) -> u32 {
        match self {
            Self::P0 => 0,
            Self::P1 => 1,
            Self::P2 => 2,
            Self::P3 => 3,
        }
    }

    /// Returns the urgency weight, `TIERS` for `P0` down to `1` for `P3`.
    #[must_use]
    pub const fn weight(self) -> u32 {
        Self::TIERS - self.ordinal()
    }

    /// Returns `true` for the top tier.
    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::P0)
    }

    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }
}

impl TryFrom<&str> for Priority {
    type Error = ParsePriorityError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "P0" => Ok(Self::P0),
            "P1" => Ok(Self::P1),
            "P2" => Ok(Self::P2),
            "P3" => Ok(Self::P3),
            _ => Err(ParsePriorityError(value.to_owned())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work owned by a spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    key: TaskKey,
    title: String,
    status: TaskStatus,
    priority: Priority,
    #[serde(default)]
    required_capabilities: CapabilitySet,
    #[serde(default)]
    dependencies: Vec<TaskKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    estimated_hours: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    context_requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ready_since: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    assignment: Option<Assignment>,
}

/// Persisted lifecycle data overlaid on a catalog task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskState {
    /// Committed status.
    pub status: TaskStatus,
    /// When the task last entered `ready`, if known.
    pub ready_since: Option<DateTime<Utc>>,
    /// Live assignment, present only while `in_progress`.
    pub assignment: Option<Assignment>,
}

impl Task {
    /// Creates a `backlog` task at priority `P2` with no requirements.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTaskTitle`] when the title is blank.
    pub fn new(key: TaskKey, title: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = title.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TaskDomainError::EmptyTaskTitle);
        }
        Ok(Self {
            key,
            title: trimmed.to_owned(),
            status: TaskStatus::Backlog,
            priority: Priority::P2,
            required_capabilities: CapabilitySet::empty(),
            dependencies: Vec::new(),
            estimated_hours: None,
            context_requirements: Vec::new(),
            phase: None,
            ready_since: None,
            assignment: None,
        })
    }

    /// Sets the initial catalog status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the priority tier.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the required capabilities.
    #[must_use]
    pub fn with_required_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.required_capabilities = capabilities;
        self
    }

    /// Adds a dependency; duplicates are ignored.
    #[must_use]
    pub fn with_dependency(mut self, dependency: TaskKey) -> Self {
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    /// Sets the estimate in whole hours.
    #[must_use]
    pub const fn with_estimated_hours(mut self, hours: u32) -> Self {
        self.estimated_hours = Some(hours);
        self
    }

    /// Sets opaque context-injection hints.
    #[must_use]
    pub fn with_context_requirements(mut self, hints: impl IntoIterator<Item = String>) -> Self {
        self.context_requirements = hints.into_iter().collect();
        self
    }

    /// Sets the phase label used by routing filters.
    #[must_use]
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    /// Sets when the task entered `ready`.
    #[must_use]
    pub const fn with_ready_since(mut self, at: DateTime<Utc>) -> Self {
        self.ready_since = Some(at);
        self
    }

    /// Replaces lifecycle fields with persisted state.
    #[must_use]
    pub fn with_persisted_state(mut self, state: PersistedTaskState) -> Self {
        self.apply_persisted_state(state);
        self
    }

    /// Overwrites lifecycle fields in place with persisted state.
    pub fn apply_persisted_state(&mut self, state: PersistedTaskState) {
        self.status = state.status;
        self.ready_since = state.ready_since.or(self.ready_since);
        self.assignment = state.assignment;
    }

    /// Returns the global task key.
    #[must_use]
    pub const fn key(&self) -> &TaskKey {
        &self.key
    }

    /// Returns the owning spec identifier.
    #[must_use]
    pub const fn spec_id(&self) -> &SpecId {
        self.key.spec_id()
    }

    /// Returns the task identifier within its spec.
    #[must_use]
    pub const fn id(&self) -> &TaskId {
        self.key.task_id()
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the priority tier.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the required capabilities.
    #[must_use]
    pub const fn required_capabilities(&self) -> &CapabilitySet {
        &self.required_capabilities
    }

    /// Returns the dependency references.
    #[must_use]
    pub fn dependencies(&self) -> &[TaskKey] {
        &self.dependencies
    }

    /// Returns the estimate in whole hours, if any.
    #[must_use]
    pub const fn estimated_hours(&self) -> Option<u32> {
        self.estimated_hours
    }

    /// Returns the opaque context-injection hints.
    #[must_use]
    pub fn context_requirements(&self) -> &[String] {
        &self.context_requirements
    }

    /// Returns the phase label, if any.
    #[must_use]
    pub fn phase(&self) -> Option<&str> {
        self.phase.as_deref()
    }

    /// Returns when the task entered `ready`, if known.
    #[must_use]
    pub const fn ready_since(&self) -> Option<DateTime<Utc>> {
        self.ready_since
    }

    /// Returns the live assignment, if any.
    #[must_use]
    pub const fn assignment(&self) -> Option<&Assignment> {
        self.assignment.as_ref()
    }

    /// Returns `true` when `key` appears in this task's dependencies.
    #[must_use]
    pub fn depends_on(&self, key: &TaskKey) -> bool {
        self.dependencies.contains(key)
    }

    /// Transitions the task to `target`.
    ///
    /// Entering `ready` stamps `ready_since`; leaving `in_progress` drops
    /// the assignment. Dependency checks are the caller's responsibility
    /// because they need repository access.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] when the table
    /// in [`TaskStatus::can_transition_to`] forbids the change. The task is
    /// left untouched in that case.
    pub fn transition_to(
        &mut self,
        target: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<(), TaskDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(TaskDomainError::InvalidStateTransition {
                task: self.key.clone(),
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        if target == TaskStatus::Ready {
            self.ready_since = Some(at);
        }
        if target != TaskStatus::InProgress {
            self.assignment = None;
        }
        Ok(())
    }

    /// Moves a `ready` task to `in_progress` under `assignment`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task
    /// is `ready`.
    pub fn assign(&mut self, assignment: Assignment) -> Result<(), TaskDomainError> {
        if self.status != TaskStatus::Ready {
            return Err(TaskDomainError::InvalidStateTransition {
                task: self.key.clone(),
                from: self.status,
                to: TaskStatus::InProgress,
            });
        }
        self.status = TaskStatus::InProgress;
        self.assignment = Some(assignment);
        Ok(())
    }
}
