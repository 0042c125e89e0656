//! Cross-process spec locker backed by lock files.

use async_trait::async_trait;
use cap_std::fs_utf8::Dir;
use mockable::Clock;
use std::sync::Arc;
use tracing::warn;

use super::{blocking::run_blocking, lock_file};
use crate::config::LockConfig;
use crate::task::domain::SpecId;
use crate::workflow::adapters::polling::poll_until;
use crate::workflow::ports::{LockError, LockResult, SpecLease, SpecLocker};

/// Spec locker using one `<spec>.lock` file per spec.
///
/// Lease ages use the injected wall clock so that every process agrees on
/// when a crashed holder's lock may be stolen.
pub struct FileSpecLocker {
    dir: Arc<Dir>,
    config: LockConfig,
    clock: Arc<dyn Clock + Send + Sync>,
}

fn lock_name(spec_id: &SpecId) -> String {
    format!("{spec_id}.lock")
}

impl FileSpecLocker {
    /// Creates a locker storing lock files in `dir`.
    #[must_use]
    pub fn new(dir: Dir, config: LockConfig, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            dir: Arc::new(dir),
            config,
            clock,
        }
    }

    async fn try_take(&self, spec_id: &SpecId) -> LockResult<Option<SpecLease>> {
        let dir = Arc::clone(&self.dir);
        let name = lock_name(spec_id);
        let now = self.clock.utc();
        let expiry = self.config.lease_expiry();
        let claim = run_blocking(
            move || lock_file::claim(&dir, &name, now, expiry).map_err(LockError::persistence),
            LockError::persistence,
        )
        .await?;
        Ok(claim.map(|granted| {
            if let Some(previous) = granted.stolen_from {
                warn!(spec_id = %spec_id, previous = %previous, "stole expired spec lock file");
            }
            SpecLease {
                spec_id: spec_id.clone(),
                token: granted.record.token,
                acquired_at: granted.record.acquired_at,
                stolen_from: granted.stolen_from,
            }
        }))
    }
}

#[async_trait]
impl SpecLocker for FileSpecLocker {
    async fn acquire(&self, spec_id: &SpecId) -> LockResult<SpecLease> {
        let outcome = poll_until(
            self.config.acquire_timeout(),
            self.config.poll_interval(),
            move || self.try_take(spec_id),
        )
        .await?;
        outcome.map_err(|waited| LockError::Timeout {
            spec: spec_id.clone(),
            waited,
        })
    }

    async fn release(&self, lease: &SpecLease) -> LockResult<()> {
        let dir = Arc::clone(&self.dir);
        let name = lock_name(&lease.spec_id);
        let token = lease.token;
        let now = self.clock.utc();
        let expiry = self.config.lease_expiry();
        let released = run_blocking(
            move || {
                lock_file::release(&dir, &name, token, now, expiry).map_err(LockError::persistence)
            },
            LockError::persistence,
        )
        .await?;
        if !released {
            warn!(spec_id = %lease.spec_id, "lock file was stolen before release");
        }
        Ok(())
    }
}
