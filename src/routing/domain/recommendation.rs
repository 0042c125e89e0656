//! Router output types.

use crate::task::domain::{AgentDescriptor, Priority, Task, TaskKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scoring factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    /// Priority tier of the task.
    Priority,
    /// How closely the agent's capabilities fit the requirements.
    CapabilityFit,
    /// Number of open dependents the task would help unblock.
    FanOut,
    /// Time spent waiting in `ready`.
    Staleness,
}

impl Factor {
    /// Returns the label used in reasoning strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::CapabilityFit => "capability_fit",
            Self::FanOut => "fan_out",
            Self::Staleness => "staleness",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contribution of one factor to a task's score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFactor {
    /// Which factor.
    pub factor: Factor,
    /// Points contributed.
    pub points: u32,
    /// Human-readable explanation of the points.
    pub detail: String,
}

impl fmt::Display for ScoreFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} +{} ({})", self.factor, self.points, self.detail)
    }
}

/// Counts that let callers explain an empty result.
///
/// `total_available` counts ready tasks passing the filters irrespective
/// of agent; `agent_matches` counts those the agent is also eligible for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingMetadata {
    /// Ready tasks passing the caller's filters.
    pub total_available: usize,
    /// Subset of those the agent may take.
    pub agent_matches: usize,
}

impl RoutingMetadata {
    /// Returns a one-line diagnosis of why nothing was recommended.
    #[must_use]
    pub const fn diagnosis(&self) -> &'static str {
        if self.total_available == 0 {
            "no ready tasks match the filters"
        } else {
            "ready tasks exist but none match this agent"
        }
    }
}

/// A runner-up candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    /// Task reference.
    pub task_key: TaskKey,
    /// Task title.
    pub title: String,
    /// Task priority.
    pub priority: Priority,
    /// Total score.
    pub score: u32,
}

/// The router's chosen task with its justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// The recommended task as seen at recommendation time.
    pub task: Task,
    /// The agent the recommendation was computed for.
    pub agent: AgentDescriptor,
    /// Total score.
    pub score: u32,
    /// Factor-by-factor breakdown of `score`.
    pub factors: Vec<ScoreFactor>,
    /// Rendered breakdown for humans.
    pub reasoning: String,
    /// Runner-up candidates in rank order.
    pub alternatives: Vec<Alternative>,
    /// Candidate pool counts.
    pub metadata: RoutingMetadata,
    /// When the recommendation was computed.
    pub recommended_at: DateTime<Utc>,
}

impl Recommendation {
    /// Returns the recommended task's key.
    #[must_use]
    pub const fn task_key(&self) -> &TaskKey {
        self.task.key()
    }
}

/// Result of a routing request. An empty pool is a normal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoutingOutcome {
    /// A task was selected.
    Recommended(Box<Recommendation>),
    /// No eligible task exists.
    NoEligibleTask(RoutingMetadata),
}

impl RoutingOutcome {
    /// Returns the recommendation, if any.
    #[must_use]
    pub fn recommendation(&self) -> Option<&Recommendation> {
        match self {
            Self::Recommended(recommendation) => Some(recommendation),
            Self::NoEligibleTask(_) => None,
        }
    }

    /// Returns the candidate pool counts.
    #[must_use]
    pub fn metadata(&self) -> RoutingMetadata {
        match self {
            Self::Recommended(recommendation) => recommendation.metadata,
            Self::NoEligibleTask(metadata) => *metadata,
        }
    }
}
