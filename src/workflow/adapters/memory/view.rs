//! In-memory state view with fault injection.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::task::domain::{Assignment, SpecId, TaskStatus};
use crate::workflow::{
    domain::SpecStateSnapshot,
    ports::{AssignmentIndex, StateView, StateViewError, StateViewResult},
};

#[derive(Debug, Default)]
struct Faults {
    failing_stores: u32,
    corrupting_stores: u32,
    failing_restores: bool,
}

/// Thread-safe in-memory state view.
///
/// Clones share state. Faults are armed per call so tests can make a
/// specific write fail or silently diverge.
#[derive(Debug, Clone)]
pub struct InMemoryStateView {
    name: &'static str,
    snapshots: Arc<RwLock<BTreeMap<SpecId, SpecStateSnapshot>>>,
    faults: Arc<Mutex<Faults>>,
}

fn poisoned(err: impl std::fmt::Display) -> StateViewError {
    StateViewError::persistence(std::io::Error::other(err.to_string()))
}

impl InMemoryStateView {
    /// Creates an empty view reporting `name` in errors.
    #[must_use]
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            snapshots: Arc::new(RwLock::new(BTreeMap::new())),
            faults: Arc::new(Mutex::new(Faults::default())),
        }
    }

    /// Creates the machine-readable view.
    #[must_use]
    pub fn machine() -> Self {
        Self::named("machine")
    }

    /// Creates the human-readable view.
    #[must_use]
    pub fn human() -> Self {
        Self::named("human")
    }

    /// Makes the next `store` fail without writing.
    pub fn fail_next_store(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.failing_stores = faults.failing_stores.saturating_add(1);
        }
    }

    /// Makes the next `store` write a silently altered snapshot.
    pub fn corrupt_next_store(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.corrupting_stores = faults.corrupting_stores.saturating_add(1);
        }
    }

    /// Makes every `restore` fail until disarmed.
    pub fn fail_restore(&self, failing: bool) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.failing_restores = failing;
        }
    }

    /// Writes a snapshot directly, bypassing faults.
    ///
    /// # Errors
    ///
    /// Returns [`StateViewError::Persistence`] if the inner lock is poisoned.
    pub fn seed(&self, snapshot: SpecStateSnapshot) -> StateViewResult<()> {
        let mut snapshots = self.snapshots.write().map_err(poisoned)?;
        snapshots.insert(snapshot.spec_id().clone(), snapshot);
        Ok(())
    }

    /// Reads a snapshot directly.
    #[must_use]
    pub fn snapshot(&self, spec_id: &SpecId) -> Option<SpecStateSnapshot> {
        self.snapshots
            .read()
            .ok()
            .and_then(|snapshots| snapshots.get(spec_id).cloned())
    }

    fn take_fault(&self, select: impl FnOnce(&mut Faults) -> &mut u32) -> StateViewResult<bool> {
        let mut faults = self.faults.lock().map_err(poisoned)?;
        let counter = select(&mut faults);
        if *counter == 0 {
            return Ok(false);
        }
        *counter = counter.saturating_sub(1);
        Ok(true)
    }

    fn write(&self, snapshot: SpecStateSnapshot) -> StateViewResult<()> {
        let mut snapshots = self.snapshots.write().map_err(poisoned)?;
        snapshots.insert(snapshot.spec_id().clone(), snapshot);
        Ok(())
    }
}

/// Flips the status of the first entry so the write no longer matches.
fn corrupted(snapshot: &SpecStateSnapshot) -> SpecStateSnapshot {
    let mut altered = snapshot.clone();
    let first = snapshot
        .entries()
        .next()
        .map(|(id, entry)| (id.clone(), entry.clone()));
    if let Some((task_id, mut entry)) = first {
        entry.status = if entry.status == TaskStatus::Blocked {
            TaskStatus::Ready
        } else {
            TaskStatus::Blocked
        };
        altered.insert(task_id, entry);
    }
    altered
}

#[async_trait]
impl StateView for InMemoryStateView {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn load(&self, spec_id: &SpecId) -> StateViewResult<Option<SpecStateSnapshot>> {
        let snapshots = self.snapshots.read().map_err(poisoned)?;
        Ok(snapshots.get(spec_id).cloned())
    }

    async fn store(&self, snapshot: &SpecStateSnapshot) -> StateViewResult<()> {
        if self.take_fault(|faults| &mut faults.failing_stores)? {
            return Err(StateViewError::persistence(std::io::Error::other(format!(
                "injected store failure in {} view",
                self.name
            ))));
        }
        if self.take_fault(|faults| &mut faults.corrupting_stores)? {
            return self.write(corrupted(snapshot));
        }
        self.write(snapshot.clone())
    }

    async fn clear(&self, spec_id: &SpecId) -> StateViewResult<()> {
        let mut snapshots = self.snapshots.write().map_err(poisoned)?;
        snapshots.remove(spec_id);
        Ok(())
    }

    async fn restore(
        &self,
        spec_id: &SpecId,
        previous: Option<&SpecStateSnapshot>,
    ) -> StateViewResult<()> {
        let failing = self.faults.lock().map_err(poisoned)?.failing_restores;
        if failing {
            return Err(StateViewError::persistence(std::io::Error::other(format!(
                "injected restore failure in {} view",
                self.name
            ))));
        }
        match previous {
            Some(snapshot) => self.write(snapshot.clone()),
            None => self.clear(spec_id).await,
        }
    }
}

#[async_trait]
impl AssignmentIndex for InMemoryStateView {
    async fn in_progress_for_agent(&self, agent_type: &str) -> StateViewResult<Vec<Assignment>> {
        let snapshots = self.snapshots.read().map_err(poisoned)?;
        Ok(snapshots
            .values()
            .flat_map(SpecStateSnapshot::assignments)
            .filter(|assignment| assignment.agent_type == agent_type)
            .cloned()
            .collect())
    }
}
