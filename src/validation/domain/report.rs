//! Validation findings and the aggregated verdict.

use crate::config::ValidationConfig;
use crate::task::domain::{Confidence, Priority, TaskKey, TaskStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A finding that blocks the assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// The agent already holds the maximum number of tasks.
    WorkloadExceeded {
        /// Tasks currently in progress for the agent.
        current: usize,
        /// Configured or overridden limit.
        limit: usize,
    },
    /// Top-tier work was not confirmed.
    CriticalConfirmationRequired {
        /// The priority that triggered the requirement.
        priority: Priority,
    },
    /// Some dependencies are not complete.
    DependenciesIncomplete {
        /// The incomplete dependencies.
        pending: Vec<TaskKey>,
    },
    /// The task is not in `ready`.
    TaskNotReady {
        /// The task's current status.
        status: TaskStatus,
    },
    /// The task already has a live assignment.
    AlreadyAssigned {
        /// The current assignee.
        agent: String,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkloadExceeded { current, limit } => {
                write!(f, "agent has {current} tasks in progress (limit {limit})")
            }
            Self::CriticalConfirmationRequired { priority } => {
                write!(f, "{priority} work requires explicit confirmation")
            }
            Self::DependenciesIncomplete { pending } => {
                let keys: Vec<String> = pending.iter().map(ToString::to_string).collect();
                write!(f, "dependencies not complete: {}", keys.join(", "))
            }
            Self::TaskNotReady { status } => write!(f, "task is {status}, not ready"),
            Self::AlreadyAssigned { agent } => write!(f, "task is already assigned to {agent}"),
        }
    }
}

/// An advisory finding that lowers confidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The recommendation is older than the staleness threshold.
    StaleRecommendation {
        /// Age of the recommendation in seconds.
        age_secs: u64,
    },
    /// The agent lacks some required capabilities.
    PartialCapabilityMatch {
        /// Capabilities the agent does not declare.
        missing: Vec<String>,
    },
    /// The assignment brings the agent to its limit.
    WorkloadNearLimit {
        /// Tasks currently in progress for the agent.
        current: usize,
        /// Configured or overridden limit.
        limit: usize,
    },
    /// The task's estimate exceeds the large-task threshold.
    LargeTask {
        /// Estimated hours.
        hours: u32,
    },
    /// A workload violation was overridden by the caller.
    WorkloadOverridden,
}

impl Warning {
    /// Returns the confidence penalty in basis points.
    #[must_use]
    pub const fn penalty(&self, config: &ValidationConfig) -> u16 {
        match self {
            Self::StaleRecommendation { .. } => config.stale_penalty,
            Self::PartialCapabilityMatch { .. } => config.missing_capability_penalty,
            Self::WorkloadNearLimit { .. } => config.near_limit_penalty,
            Self::LargeTask { .. } => config.large_task_penalty,
            Self::WorkloadOverridden => config.override_penalty,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleRecommendation { age_secs } => {
                write!(f, "recommendation is {age_secs}s old")
            }
            Self::PartialCapabilityMatch { missing } => {
                write!(f, "agent lacks capabilities: {}", missing.join(", "))
            }
            Self::WorkloadNearLimit { current, limit } => {
                write!(f, "assignment reaches workload limit ({current} of {limit} in progress)")
            }
            Self::LargeTask { hours } => write!(f, "task is estimated at {hours}h"),
            Self::WorkloadOverridden => f.write_str("workload limit overridden"),
        }
    }
}

/// The verdict for one proposed assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// The task validated.
    pub task_key: TaskKey,
    /// The agent validated.
    pub agent_type: String,
    /// No violations and no warnings.
    pub is_valid: bool,
    /// No violations; the only flag that gates mutation.
    pub can_proceed: bool,
    /// Full confidence less each warning's penalty.
    pub confidence: Confidence,
    /// Every blocking finding.
    pub violations: Vec<Violation>,
    /// Every advisory finding.
    pub warnings: Vec<Warning>,
}

impl ValidationReport {
    /// Builds a report from findings.
    #[must_use]
    pub fn from_findings(
        task_key: TaskKey,
        agent_type: impl Into<String>,
        violations: Vec<Violation>,
        warnings: Vec<Warning>,
        config: &ValidationConfig,
    ) -> Self {
        let confidence = warnings.iter().fold(Confidence::FULL, |remaining, warning| {
            remaining.reduced_by(warning.penalty(config))
        });
        Self {
            task_key,
            agent_type: agent_type.into(),
            is_valid: violations.is_empty() && warnings.is_empty(),
            can_proceed: violations.is_empty(),
            confidence,
            violations,
            warnings,
        }
    }

    /// Renders every violation on one line.
    #[must_use]
    pub fn violation_summary(&self) -> String {
        let lines: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        lines.join("; ")
    }
}
