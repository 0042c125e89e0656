//! Per-spec snapshot of persisted task state.

use crate::task::domain::{
    Assignment, PersistedTaskState, Priority, Spec, SpecId, Task, TaskId, TaskStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted lifecycle state of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStateEntry {
    /// Current status.
    pub status: TaskStatus,
    /// Task priority.
    pub priority: Priority,
    /// When the task last entered `ready`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_since: Option<DateTime<Utc>>,
    /// Live assignment while in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
}

impl TaskStateEntry {
    /// Captures the lifecycle state of `task`.
    #[must_use]
    pub fn of(task: &Task) -> Self {
        Self {
            status: task.status(),
            priority: task.priority(),
            ready_since: task.ready_since(),
            assignment: task.assignment().cloned(),
        }
    }

    /// Returns the assignee, if any.
    #[must_use]
    pub fn assignee(&self) -> Option<&str> {
        self.assignment
            .as_ref()
            .map(|assignment| assignment.agent_type.as_str())
    }

    /// Returns the assignment start time, if any.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.assignment
            .as_ref()
            .map(|assignment| assignment.started_at)
    }

    /// Compares the fields both views carry: status, priority, assignee
    /// and start time.
    #[must_use]
    pub fn agrees_with(&self, other: &Self) -> bool {
        self.status == other.status
            && self.priority == other.priority
            && self.assignee() == other.assignee()
            && self.started_at() == other.started_at()
    }

    /// Converts the entry into the form tasks accept.
    #[must_use]
    pub fn to_persisted(&self) -> PersistedTaskState {
        PersistedTaskState {
            status: self.status,
            ready_since: self.ready_since,
            assignment: self.assignment.clone(),
        }
    }
}

/// All persisted task state for one spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecStateSnapshot {
    spec_id: SpecId,
    tasks: BTreeMap<TaskId, TaskStateEntry>,
}

impl SpecStateSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub const fn new(spec_id: SpecId) -> Self {
        Self {
            spec_id,
            tasks: BTreeMap::new(),
        }
    }

    /// Captures every task of `spec`.
    #[must_use]
    pub fn from_spec(spec: &Spec) -> Self {
        let tasks = spec
            .tasks()
            .iter()
            .map(|task| (task.id().clone(), TaskStateEntry::of(task)))
            .collect();
        Self {
            spec_id: spec.id().clone(),
            tasks,
        }
    }

    /// Returns the owning spec.
    #[must_use]
    pub const fn spec_id(&self) -> &SpecId {
        &self.spec_id
    }

    /// Returns one task's entry.
    #[must_use]
    pub fn entry(&self, task_id: &TaskId) -> Option<&TaskStateEntry> {
        self.tasks.get(task_id)
    }

    /// Inserts or replaces one task's entry.
    pub fn insert(&mut self, task_id: TaskId, entry: TaskStateEntry) {
        self.tasks.insert(task_id, entry);
    }

    /// Iterates entries in task-id order.
    pub fn entries(&self) -> impl Iterator<Item = (&TaskId, &TaskStateEntry)> {
        self.tasks.iter()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` when the snapshot holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Adds entries for catalog tasks that have never been persisted.
    pub fn fill_missing_from(&mut self, spec: &Spec) {
        for task in spec.tasks() {
            self.tasks
                .entry(task.id().clone())
                .or_insert_with(|| TaskStateEntry::of(task));
        }
    }

    /// Overlays persisted state onto the catalog definition of the spec.
    ///
    /// Tasks without an entry keep their catalog state.
    #[must_use]
    pub fn apply_to(&self, mut spec: Spec) -> Spec {
        for (task_id, entry) in &self.tasks {
            if let Some(task) = spec.task_mut(task_id) {
                task.apply_persisted_state(entry.to_persisted());
            }
        }
        spec
    }

    /// Returns the ids whose entries differ between the two snapshots,
    /// including ids present on one side only.
    #[must_use]
    pub fn divergent_tasks(&self, other: &Self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .tasks
            .keys()
            .chain(other.tasks.keys())
            .filter(|id| match (self.tasks.get(*id), other.tasks.get(*id)) {
                (Some(left), Some(right)) => !left.agrees_with(right),
                _ => true,
            })
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Iterates live assignments.
    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.tasks
            .values()
            .filter(|entry| entry.status == TaskStatus::InProgress)
            .filter_map(|entry| entry.assignment.as_ref())
    }
}

/// One task whose two views disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    /// Owning spec.
    pub spec_id: SpecId,
    /// Disagreeing task.
    pub task_id: TaskId,
    /// Machine-readable view's entry.
    pub machine: Option<TaskStateEntry>,
    /// Human-readable view's entry.
    pub human: Option<TaskStateEntry>,
}
