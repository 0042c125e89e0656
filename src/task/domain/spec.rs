//! Specification aggregate owning an ordered collection of tasks.

use super::{ParseSpecStatusError, Priority, SpecId, Task, TaskDomainError, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse spec lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecStatus {
    /// Authored but not started.
    Backlog,
    /// Work is underway.
    Active,
    /// Every task is complete.
    Done,
    /// Retired from routing.
    Archived,
}

impl SpecStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Active => "active",
            Self::Done => "done",
            Self::Archived => "archived",
        }
    }

    /// Returns `true` for statuses excluded from routing by default.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Archived)
    }
}

impl TryFrom<&str> for SpecStatus {
    type Error = ParseSpecStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "backlog" => Ok(Self::Backlog),
            "active" => Ok(Self::Active),
            "done" => Ok(Self::Done),
            "archived" => Ok(Self::Archived),
            _ => Err(ParseSpecStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for SpecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A specification and the tasks it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    id: SpecId,
    title: String,
    status: SpecStatus,
    priority: Priority,
    #[serde(default)]
    tasks: Vec<Task>,
}

impl Spec {
    /// Creates an empty `active` spec at priority `P2`.
    #[must_use]
    pub fn new(id: SpecId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            status: SpecStatus::Active,
            priority: Priority::P2,
            tasks: Vec::new(),
        }
    }

    /// Sets the spec status.
    #[must_use]
    pub const fn with_status(mut self, status: SpecStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the spec priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Appends a task, preserving authoring order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::ForeignTask`] when the task belongs to a
    /// different spec, [`TaskDomainError::DuplicateTask`] when its id is
    /// taken, or [`TaskDomainError::SelfDependency`] when it depends on
    /// itself.
    pub fn with_task(mut self, task: Task) -> Result<Self, TaskDomainError> {
        if task.spec_id() != &self.id {
            return Err(TaskDomainError::ForeignTask {
                spec: self.id.clone(),
                task: task.key().clone(),
            });
        }
        if self.task(task.id()).is_some() {
            return Err(TaskDomainError::DuplicateTask(task.key().clone()));
        }
        if task.depends_on(task.key()) {
            return Err(TaskDomainError::SelfDependency(task.key().clone()));
        }
        self.tasks.push(task);
        Ok(self)
    }

    /// Returns the spec identifier.
    #[must_use]
    pub const fn id(&self) -> &SpecId {
        &self.id
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the spec status.
    #[must_use]
    pub const fn status(&self) -> SpecStatus {
        self.status
    }

    /// Returns the spec priority.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the tasks in authoring order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Looks up a task by id.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    /// Returns a mutable handle to a task.
    pub fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id() == id)
    }

    /// Counts tasks that are not yet complete.
    #[must_use]
    pub fn open_task_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.status() != TaskStatus::Complete)
            .count()
    }

    /// Returns `true` when the spec may be marked done.
    #[must_use]
    pub fn can_close(&self) -> bool {
        self.open_task_count() == 0
    }

    /// Marks the spec done.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::SpecHasOpenTasks`] while any task is not
    /// complete.
    pub fn close(&mut self) -> Result<(), TaskDomainError> {
        let open = self.open_task_count();
        if open > 0 {
            return Err(TaskDomainError::SpecHasOpenTasks {
                spec: self.id.clone(),
                open,
            });
        }
        self.status = SpecStatus::Done;
        Ok(())
    }
}
