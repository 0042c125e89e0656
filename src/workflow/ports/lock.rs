//! Per-spec exclusive lock port.

use crate::task::domain::SpecId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Proof of holding a spec lock.
///
/// Leases are released explicitly through [`SpecLocker::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecLease {
    /// The locked spec.
    pub spec_id: SpecId,
    /// Owner token; release only succeeds for the matching token.
    pub token: Uuid,
    /// When the lease was taken.
    pub acquired_at: DateTime<Utc>,
    /// Token of an expired holder whose lock was stolen, if any.
    pub stolen_from: Option<Uuid>,
}

impl SpecLease {
    /// Creates a fresh lease with a new owner token.
    #[must_use]
    pub fn new(spec_id: SpecId, acquired_at: DateTime<Utc>) -> Self {
        Self {
            spec_id,
            token: Uuid::new_v4(),
            acquired_at,
            stolen_from: None,
        }
    }

    /// Records that the lease replaced an expired holder.
    #[must_use]
    pub const fn replacing(mut self, previous: Uuid) -> Self {
        self.stolen_from = Some(previous);
        self
    }
}

/// Exclusive, crash-recoverable lock scoped to one spec.
///
/// Holders that outlive the lease expiry lose the lock to the next
/// acquirer.
#[async_trait]
pub trait SpecLocker: Send + Sync {
    /// Waits for the spec lock, failing with [`LockError::Timeout`] after
    /// the configured bound.
    async fn acquire(&self, spec_id: &SpecId) -> LockResult<SpecLease>;

    /// Releases a lease. Releasing a lease that was stolen is a no-op.
    async fn release(&self, lease: &SpecLease) -> LockResult<()>;
}

/// Errors returned by lock implementations.
#[derive(Debug, Clone, Error)]
pub enum LockError {
    /// The lock stayed held for the whole wait.
    #[error("lock on spec {spec} not acquired within {waited:?}")]
    Timeout {
        /// The contended spec.
        spec: SpecId,
        /// How long acquisition waited.
        waited: Duration,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl LockError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
