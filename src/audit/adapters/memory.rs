//! In-memory audit sink for tests and replay harnesses.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::audit::{
    domain::{AuditEntry, AuditEvent, AuditFilter},
    ports::{AuditError, AuditResult, AuditSink},
};

/// Thread-safe in-memory audit log.
///
/// Clones share the same underlying event list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLog {
    events: Arc<RwLock<Vec<AuditEvent>>>,
}

impl InMemoryAuditLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned(err: impl std::fmt::Display) -> AuditError {
    AuditError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl AuditSink for InMemoryAuditLog {
    async fn record(&self, entry: AuditEntry) -> AuditResult<AuditEvent> {
        let mut events = self.events.write().map_err(lock_poisoned)?;
        let sequence = u64::try_from(events.len())
            .map_err(AuditError::persistence)?
            .saturating_add(1);
        let event = entry.into_event(sequence);
        events.push(event.clone());
        Ok(event)
    }

    async fn query(&self, filter: &AuditFilter) -> AuditResult<Vec<AuditEvent>> {
        let events = self.events.read().map_err(lock_poisoned)?;
        Ok(filter.apply(events.iter()))
    }
}
