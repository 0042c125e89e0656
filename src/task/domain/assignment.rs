//! Live assignment of a task to an agent.

use super::{TaskDomainError, TaskKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `0..=1` confidence value held as basis points.
///
/// Integer storage keeps comparisons exact and the persisted form stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(u16);

impl Confidence {
    /// Basis points representing full confidence.
    pub const SCALE: u16 = 10_000;

    /// Full confidence.
    pub const FULL: Self = Self(Self::SCALE);

    /// No confidence.
    pub const NONE: Self = Self(0);

    /// Creates a confidence from basis points, saturating at full.
    #[must_use]
    pub const fn from_basis_points(points: u16) -> Self {
        if points > Self::SCALE {
            Self::FULL
        } else {
            Self(points)
        }
    }

    /// Creates a confidence from a `0..=1` float.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidConfidence`] when the value is not
    /// finite or lies outside `0..=1`.
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "value is range-checked to 0..=1 before scaling"
    )]
    pub fn from_ratio(value: f64) -> Result<Self, TaskDomainError> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(TaskDomainError::InvalidConfidence(value.to_string()));
        }
        let points = (value * f64::from(Self::SCALE)).round() as u16;
        Ok(Self::from_basis_points(points))
    }

    /// Returns the basis points.
    #[must_use]
    pub const fn basis_points(self) -> u16 {
        self.0
    }

    /// Returns the value as a `0..=1` float.
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "conversion for display only")]
    pub fn as_ratio(self) -> f64 {
        f64::from(self.0) / f64::from(Self::SCALE)
    }

    /// Lowers the confidence by `penalty` basis points, stopping at zero.
    #[must_use]
    pub const fn reduced_by(self, penalty: u16) -> Self {
        Self(self.0.saturating_sub(penalty))
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::FULL
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.as_ratio())
    }
}

/// Assignment of a task to an agent; exists only while `in_progress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// The assigned task.
    pub task_key: TaskKey,
    /// Agent type holding the task.
    pub agent_type: String,
    /// When work started.
    pub started_at: DateTime<Utc>,
    /// Validator confidence at assignment time.
    pub confidence: Confidence,
    /// Who requested the assignment.
    pub assigned_by: String,
}

impl Assignment {
    /// Creates an assignment with full confidence, assigned by the agent
    /// itself.
    #[must_use]
    pub fn new(task_key: TaskKey, agent_type: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        let agent = agent_type.into();
        Self {
            task_key,
            assigned_by: agent.clone(),
            agent_type: agent,
            started_at,
            confidence: Confidence::FULL,
        }
    }

    /// Sets the confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Sets who requested the assignment.
    #[must_use]
    pub fn with_assigned_by(mut self, assigned_by: impl Into<String>) -> Self {
        self.assigned_by = assigned_by.into();
        self
    }
}
