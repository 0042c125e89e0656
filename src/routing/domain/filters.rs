//! Caller-supplied routing filters.

use crate::task::domain::{Priority, SpecStatus, Task};
use serde::{Deserialize, Serialize};

/// Optional narrowing of the candidate pool.
///
/// Each empty set means "no restriction", except spec status: with no
/// spec-status filter, tasks in terminal specs are excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingFilters {
    priorities: Vec<Priority>,
    phases: Vec<String>,
    spec_statuses: Vec<SpecStatus>,
}

impl RoutingFilters {
    /// Filters that admit every task of a non-terminal spec.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            priorities: Vec::new(),
            phases: Vec::new(),
            spec_statuses: Vec::new(),
        }
    }

    /// Admits tasks of `priority`.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        if !self.priorities.contains(&priority) {
            self.priorities.push(priority);
        }
        self
    }

    /// Admits tasks in `phase` (compared case-insensitively).
    #[must_use]
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        let normalized = phase.into().trim().to_ascii_lowercase();
        if !self.phases.contains(&normalized) {
            self.phases.push(normalized);
        }
        self
    }

    /// Admits tasks whose spec has `status`, including terminal ones.
    #[must_use]
    pub fn with_spec_status(mut self, status: SpecStatus) -> Self {
        if !self.spec_statuses.contains(&status) {
            self.spec_statuses.push(status);
        }
        self
    }

    /// Returns `true` when the task passes the priority and phase filters.
    #[must_use]
    pub fn admits_task(&self, task: &Task) -> bool {
        let priority_ok = self.priorities.is_empty() || self.priorities.contains(&task.priority());
        let phase_ok = self.phases.is_empty()
            || task.phase().is_some_and(|phase| {
                self.phases
                    .iter()
                    .any(|wanted| wanted.trim().eq_ignore_ascii_case(phase.trim()))
            });
        priority_ok && phase_ok
    }

    /// Returns `true` when a spec in `status` may contribute tasks.
    #[must_use]
    pub fn admits_spec(&self, status: SpecStatus) -> bool {
        if self.spec_statuses.is_empty() {
            !status.is_terminal()
        } else {
            self.spec_statuses.contains(&status)
        }
    }
}
