//! In-process spec locker.

use async_trait::async_trait;
use mockable::Clock;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

use crate::config::LockConfig;
use crate::task::domain::SpecId;
use crate::workflow::adapters::polling::poll_until;
use crate::workflow::ports::{LockError, LockResult, SpecLease, SpecLocker};

#[derive(Debug, Clone, Copy)]
struct Holder {
    token: Uuid,
    since: Instant,
}

/// Spec locker for callers sharing one process.
///
/// Expiry is measured on the monotonic clock; the injected clock only
/// stamps leases.
#[derive(Clone)]
pub struct InMemorySpecLocker {
    held: Arc<Mutex<BTreeMap<SpecId, Holder>>>,
    config: LockConfig,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl InMemorySpecLocker {
    /// Creates a locker with the given timeouts.
    #[must_use]
    pub fn new(config: LockConfig, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            held: Arc::new(Mutex::new(BTreeMap::new())),
            config,
            clock,
        }
    }

    /// Returns `true` when some lease currently holds `spec_id`.
    #[must_use]
    pub fn is_held(&self, spec_id: &SpecId) -> bool {
        self.held
            .lock()
            .map(|held| held.contains_key(spec_id))
            .unwrap_or(false)
    }

    fn try_take(&self, spec_id: &SpecId) -> LockResult<Option<SpecLease>> {
        let mut held = self
            .held
            .lock()
            .map_err(|err| LockError::persistence(std::io::Error::other(err.to_string())))?;
        let expiry = self.config.lease_expiry();
        let previous = match held.get(spec_id) {
            Some(holder) if holder.since.elapsed() < expiry => return Ok(None),
            Some(holder) => Some(holder.token),
            None => None,
        };
        let mut lease = SpecLease::new(spec_id.clone(), self.clock.utc());
        if let Some(token) = previous {
            warn!(spec_id = %spec_id, previous = %token, "stealing expired spec lock");
            lease = lease.replacing(token);
        }
        held.insert(
            spec_id.clone(),
            Holder {
                token: lease.token,
                since: Instant::now(),
            },
        );
        Ok(Some(lease))
    }
}

#[async_trait]
impl SpecLocker for InMemorySpecLocker {
    async fn acquire(&self, spec_id: &SpecId) -> LockResult<SpecLease> {
        let outcome = poll_until(
            self.config.acquire_timeout(),
            self.config.poll_interval(),
            move || async move { self.try_take(spec_id) },
        )
        .await?;
        outcome.map_err(|waited| LockError::Timeout {
            spec: spec_id.clone(),
            waited,
        })
    }

    async fn release(&self, lease: &SpecLease) -> LockResult<()> {
        let mut held = self
            .held
            .lock()
            .map_err(|err| LockError::persistence(std::io::Error::other(err.to_string())))?;
        if held
            .get(&lease.spec_id)
            .is_some_and(|holder| holder.token == lease.token)
        {
            held.remove(&lease.spec_id);
        } else {
            warn!(spec_id = %lease.spec_id, "lease was stolen before release");
        }
        Ok(())
    }
}
