//! Append-only audit sink port.

use crate::audit::domain::{AuditEntry, AuditEvent, AuditFilter};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

/// Append-only event log.
///
/// There is deliberately no update or delete operation.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends an entry and returns it with its assigned sequence number.
    async fn record(&self, entry: AuditEntry) -> AuditResult<AuditEvent>;

    /// Returns matching events in insertion order.
    async fn query(&self, filter: &AuditFilter) -> AuditResult<Vec<AuditEvent>>;

    /// Returns the full ordered event sequence for external tooling.
    async fn export(&self) -> AuditResult<Vec<AuditEvent>> {
        self.query(&AuditFilter::all()).await
    }
}

/// Errors returned by audit sinks.
#[derive(Debug, Clone, Error)]
pub enum AuditError {
    /// A persisted event could not be decoded.
    #[error("corrupt audit record at line {line}: {reason}")]
    CorruptRecord {
        /// One-based line number in the backing file.
        line: usize,
        /// Decoder message.
        reason: String,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl AuditError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
