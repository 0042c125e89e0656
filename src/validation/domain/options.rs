//! Validation inputs.

use crate::task::domain::{TaskDomainError, TaskKey, validate_agent_type};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A (task, agent) pairing submitted for validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedAssignment {
    task_key: TaskKey,
    agent_type: String,
}

impl ProposedAssignment {
    /// Creates a proposal for a trimmed, board-safe agent type.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError`] when [`validate_agent_type`] rejects the
    /// agent type.
    pub fn new(task_key: TaskKey, agent_type: &str) -> Result<Self, TaskDomainError> {
        Ok(Self {
            task_key,
            agent_type: validate_agent_type(agent_type)?.to_owned(),
        })
    }

    /// Returns the task reference.
    #[must_use]
    pub const fn task_key(&self) -> &TaskKey {
        &self.task_key
    }

    /// Returns the agent type.
    #[must_use]
    pub fn agent_type(&self) -> &str {
        &self.agent_type
    }
}

/// Toggles and overrides for a validation run.
///
/// Readiness and existing assignments are always checked; the remaining
/// checks can be switched off individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "each flag toggles one independent check"
)]
pub struct ValidationOptions {
    /// Check the agent's in-progress count.
    pub check_workload: bool,
    /// Require confirmation for top-tier work.
    pub check_criticality: bool,
    /// Re-check dependency completion.
    pub check_dependencies: bool,
    /// Compare required and declared capabilities.
    pub check_capabilities: bool,
    /// Overrides the configured concurrency limit.
    pub max_concurrent_tasks: Option<usize>,
    /// The caller confirmed top-tier work.
    pub confirm_critical: bool,
    /// Downgrades a workload violation to a warning.
    pub override_workload: bool,
    /// When the task was recommended, for staleness.
    pub recommended_at: Option<DateTime<Utc>>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            check_workload: true,
            check_criticality: true,
            check_dependencies: true,
            check_capabilities: true,
            max_concurrent_tasks: None,
            confirm_critical: false,
            override_workload: false,
            recommended_at: None,
        }
    }
}

impl ValidationOptions {
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
}
