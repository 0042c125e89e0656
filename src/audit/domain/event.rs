//! Audit event types.

use crate::task::domain::{SpecId, TaskKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of audited occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// The router recommended a task.
    RecommendationIssued,
    /// The router found no eligible task.
    NoEligibleTask,
    /// The validator produced a verdict.
    ValidationVerdict,
    /// A state transition was committed to both views.
    TransitionCommitted,
    /// A state transition failed.
    TransitionFailed,
    /// A dependent task moved from blocked to ready.
    TaskUnblocked,
    /// A dependent could not be unblocked during a cascade.
    CascadeFailed,
    /// An abandoned spec lock was stolen.
    LockStolen,
    /// The recommend → validate → commit path overran its target.
    PerformanceWarning,
}

impl AuditEventType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RecommendationIssued => "recommendation_issued",
            Self::NoEligibleTask => "no_eligible_task",
            Self::ValidationVerdict => "validation_verdict",
            Self::TransitionCommitted => "transition_committed",
            Self::TransitionFailed => "transition_failed",
            Self::TaskUnblocked => "task_unblocked",
            Self::CascadeFailed => "cascade_failed",
            Self::LockStolen => "lock_stolen",
            Self::PerformanceWarning => "performance_warning",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event awaiting a sequence number from the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    /// Kind of occurrence.
    pub event_type: AuditEventType,
    /// Wall-clock time of recording.
    pub timestamp: DateTime<Utc>,
    /// Spec the event concerns, if any.
    pub spec_id: Option<SpecId>,
    /// Task the event concerns, if any.
    pub task_key: Option<TaskKey>,
    /// Event-specific structured data.
    pub payload: Value,
}

impl AuditEntry {
    /// Creates an entry with an empty object payload.
    #[must_use]
    pub fn new(event_type: AuditEventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type,
            timestamp,
            spec_id: None,
            task_key: None,
            payload: Value::Object(serde_json::Map::new()),
        }
    }

    /// Associates the entry with a task and its spec.
    #[must_use]
    pub fn for_task(mut self, key: &TaskKey) -> Self {
        self.spec_id = Some(key.spec_id().clone());
        self.task_key = Some(key.clone());
        self
    }

    /// Associates the entry with a spec only.
    #[must_use]
    pub fn for_spec(mut self, spec_id: &SpecId) -> Self {
        self.spec_id = Some(spec_id.clone());
        self
    }

    /// Sets the structured payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Stamps the entry with its sequence number.
    #[must_use]
    pub fn into_event(self, sequence: u64) -> AuditEvent {
        AuditEvent {
            sequence,
            event_type: self.event_type,
            timestamp: self.timestamp,
            spec_id: self.spec_id,
            task_key: self.task_key,
            payload: self.payload,
        }
    }
}

/// A recorded, immutable audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Insertion position within the sink, starting at 1.
    pub sequence: u64,
    /// Kind of occurrence.
    pub event_type: AuditEventType,
    /// Wall-clock time of recording; advisory, never a sort key.
    pub timestamp: DateTime<Utc>,
    /// Spec the event concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_id: Option<SpecId>,
    /// Task the event concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_key: Option<TaskKey>,
    /// Event-specific structured data.
    pub payload: Value,
}
