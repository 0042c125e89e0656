//! Machine-readable aggregate store: one `state.json` keyed by
//! `specId:taskId`.

use async_trait::async_trait;
use cap_std::fs_utf8::Dir;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use uuid::Uuid;

use super::{blocking::run_blocking, lock_file};
use crate::config::LockConfig;
use crate::task::domain::{Assignment, SpecId, TaskKey, TaskStatus};
use crate::workflow::{
    adapters::polling::poll_until,
    domain::{SpecStateSnapshot, TaskStateEntry},
    ports::{AssignmentIndex, StateView, StateViewError, StateViewResult},
};

/// File name of the aggregate store.
pub const STATE_FILE_NAME: &str = "state.json";
const STORE_LOCK_NAME: &str = "state.lock";
const VIEW_NAME: &str = "machine";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    version: u32,
    tasks: BTreeMap<TaskKey, TaskStateEntry>,
}

impl StateDocument {
    fn snapshot(&self, spec_id: &SpecId) -> Option<SpecStateSnapshot> {
        let mut snapshot = SpecStateSnapshot::new(spec_id.clone());
        for (key, entry) in self.tasks.iter().filter(|(key, _)| key.spec_id() == spec_id) {
            snapshot.insert(key.task_id().clone(), entry.clone());
        }
        (!snapshot.is_empty()).then_some(snapshot)
    }

    fn remove_spec(&mut self, spec_id: &SpecId) {
        self.tasks.retain(|key, _| key.spec_id() != spec_id);
    }

    fn replace_spec(&mut self, snapshot: &SpecStateSnapshot) {
        self.remove_spec(snapshot.spec_id());
        for (task_id, entry) in snapshot.entries() {
            self.tasks.insert(
                TaskKey::new(snapshot.spec_id().clone(), task_id.clone()),
                entry.clone(),
            );
        }
    }
}

fn read_document(dir: &Dir) -> StateViewResult<StateDocument> {
    let contents = match dir.read_to_string(STATE_FILE_NAME) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(StateDocument {
                version: FORMAT_VERSION,
                tasks: BTreeMap::new(),
            });
        }
        Err(err) => return Err(StateViewError::persistence(err)),
    };
    let document: StateDocument = serde_json::from_str(&contents)
        .map_err(|err| StateViewError::corrupt(VIEW_NAME, err.to_string()))?;
    if document.version != FORMAT_VERSION {
        return Err(StateViewError::corrupt(
            VIEW_NAME,
            format!("unsupported format version {}", document.version),
        ));
    }
    Ok(document)
}

fn write_document(dir: &Dir, document: &StateDocument) -> StateViewResult<()> {
    let bytes = serde_json::to_vec_pretty(document).map_err(StateViewError::persistence)?;
    let temp_name = format!("{STATE_FILE_NAME}.{}.tmp", Uuid::new_v4());
    dir.write(&temp_name, bytes).map_err(StateViewError::persistence)?;
    dir.rename(&temp_name, dir, STATE_FILE_NAME)
        .map_err(StateViewError::persistence)
}

/// Aggregate JSON store shared by every spec.
///
/// Whole-file rewrites go through a temporary file and a rename, under a
/// short store lock, so concurrent writers for different specs never lose
/// each other's updates.
pub struct JsonStateStore {
    dir: Arc<Dir>,
    locking: LockConfig,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl JsonStateStore {
    /// Creates a store keeping `state.json` in `dir`.
    #[must_use]
    pub fn new(dir: Dir, locking: LockConfig, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            dir: Arc::new(dir),
            locking,
            clock,
        }
    }

    async fn read(&self) -> StateViewResult<StateDocument> {
        let dir = Arc::clone(&self.dir);
        run_blocking(move || read_document(&dir), StateViewError::persistence).await
    }

    async fn try_lock_store(&self) -> StateViewResult<Option<Uuid>> {
        let dir = Arc::clone(&self.dir);
        let now = self.clock.utc();
        let expiry = self.locking.lease_expiry();
        run_blocking(
            move || {
                lock_file::claim(&dir, STORE_LOCK_NAME, now, expiry)
                    .map(|claim| claim.map(|granted| granted.record.token))
                    .map_err(StateViewError::persistence)
            },
            StateViewError::persistence,
        )
        .await
    }

    async fn lock_store(&self) -> StateViewResult<Uuid> {
        let outcome = poll_until(
            self.locking.acquire_timeout(),
            self.locking.poll_interval(),
            move || self.try_lock_store(),
        )
        .await?;
        outcome.map_err(|waited| {
            StateViewError::persistence(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("store lock not acquired within {waited:?}"),
            ))
        })
    }

    async fn update(
        &self,
        change: impl FnOnce(&mut StateDocument) + Send + 'static,
    ) -> StateViewResult<()> {
        let token = self.lock_store().await?;
        let dir = Arc::clone(&self.dir);
        let now = self.clock.utc();
        let expiry = self.locking.lease_expiry();
        run_blocking(
            move || {
                let result = read_document(&dir).and_then(|mut document| {
                    change(&mut document);
                    write_document(&dir, &document)
                });
                let unlocked = lock_file::release(&dir, STORE_LOCK_NAME, token, now, expiry)
                    .map(|_| ())
                    .map_err(StateViewError::persistence);
                result.and(unlocked)
            },
            StateViewError::persistence,
        )
        .await
    }
}

#[async_trait]
impl StateView for JsonStateStore {
    fn name(&self) -> &'static str {
        VIEW_NAME
    }

    async fn load(&self, spec_id: &SpecId) -> StateViewResult<Option<SpecStateSnapshot>> {
        Ok(self.read().await?.snapshot(spec_id))
    }

    async fn store(&self, snapshot: &SpecStateSnapshot) -> StateViewResult<()> {
        let snapshot = snapshot.clone();
        self.update(move |document| document.replace_spec(&snapshot)).await
    }

    async fn clear(&self, spec_id: &SpecId) -> StateViewResult<()> {
        let spec_id = spec_id.clone();
        self.update(move |document| document.remove_spec(&spec_id)).await
    }
}

#[async_trait]
impl AssignmentIndex for JsonStateStore {
    async fn in_progress_for_agent(&self, agent_type: &str) -> StateViewResult<Vec<Assignment>> {
        let document = self.read().await?;
        Ok(document
            .tasks
            .values()
            .filter(|entry| entry.status == TaskStatus::InProgress)
            .filter_map(|entry| entry.assignment.as_ref())
            .filter(|assignment| assignment.agent_type == agent_type)
            .cloned()
            .collect())
    }
}
