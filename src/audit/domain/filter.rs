//! Query filter for audit events.

use super::{AuditEvent, AuditEventType};
use crate::task::domain::{SpecId, TaskKey};

/// Selects audit events; an empty filter selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    event_types: Vec<AuditEventType>,
    spec_id: Option<SpecId>,
    task_key: Option<TaskKey>,
    after_sequence: Option<u64>,
    limit: Option<usize>,
}

impl AuditFilter {
    /// Selects every event.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            event_types: Vec::new(),
            spec_id: None,
            task_key: None,
            after_sequence: None,
            limit: None,
        }
    }

    /// Adds an accepted event type.
    #[must_use]
    pub fn of_type(mut self, event_type: AuditEventType) -> Self {
        if !self.event_types.contains(&event_type) {
            self.event_types.push(event_type);
        }
        self
    }

    /// Restricts to events concerning one spec.
    #[must_use]
    pub fn for_spec(mut self, spec_id: SpecId) -> Self {
        self.spec_id = Some(spec_id);
        self
    }

    /// Restricts to events concerning one task.
    #[must_use]
    pub fn for_task(mut self, key: TaskKey) -> Self {
        self.task_key = Some(key);
        self
    }

    /// Skips events up to and including `sequence`.
    #[must_use]
    pub const fn after(mut self, sequence: u64) -> Self {
        self.after_sequence = Some(sequence);
        self
    }

    /// Caps the number of returned events.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` when `event` passes every criterion except the limit.
    #[must_use]
    pub fn matches(&self, event: &AuditEvent) -> bool {
        let type_ok = self.event_types.is_empty() || self.event_types.contains(&event.event_type);
        let spec_ok = self
            .spec_id
            .as_ref()
            .is_none_or(|id| event.spec_id.as_ref() == Some(id));
        let task_ok = self
            .task_key
            .as_ref()
            .is_none_or(|key| event.task_key.as_ref() == Some(key));
        let after_ok = self.after_sequence.is_none_or(|after| event.sequence > after);
        type_ok && spec_ok && task_ok && after_ok
    }

    /// Applies the filter, preserving insertion order.
    #[must_use]
    pub fn apply<'a>(&self, events: impl IntoIterator<Item = &'a AuditEvent>) -> Vec<AuditEvent> {
        let selected = events.into_iter().filter(|event| self.matches(event)).cloned();
        match self.limit {
            Some(limit) => selected.take(limit).collect(),
            None => selected.collect(),
        }
    }
}
