//! Two-phase commit across the machine-readable and human-readable views.
//!
//! A commit writes the machine view, then the human view, re-reads both
//! and compares them with the intended snapshot. Any failure restores the
//! snapshots read before the commit.

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::task::domain::{Spec, SpecId, TaskId};
use crate::workflow::{
    domain::{Divergence, SpecStateSnapshot, WorkflowError, WorkflowResult},
    ports::StateView,
};

/// Both views of one spec as read before a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewPair {
    /// Spec both snapshots belong to.
    pub spec_id: SpecId,
    /// Machine-readable snapshot, `None` when never written.
    pub machine: Option<SpecStateSnapshot>,
    /// Human-readable snapshot, `None` when never written.
    pub human: Option<SpecStateSnapshot>,
}

impl ViewPair {
    /// Returns a pair whose two views both hold `snapshot`.
    #[must_use]
    pub fn agreeing(snapshot: &SpecStateSnapshot) -> Self {
        Self {
            spec_id: snapshot.spec_id().clone(),
            machine: Some(snapshot.clone()),
            human: Some(snapshot.clone()),
        }
    }

    /// Lists the tasks on which the views disagree.
    ///
    /// A view that was never written is compared as empty, so two
    /// unwritten views agree.
    #[must_use]
    pub fn divergences(&self) -> Vec<Divergence> {
        let empty = SpecStateSnapshot::new(self.spec_id.clone());
        let machine = self.machine.as_ref().unwrap_or(&empty);
        let human = self.human.as_ref().unwrap_or(&empty);
        machine
            .divergent_tasks(human)
            .into_iter()
            .map(|task_id| Divergence {
                spec_id: self.spec_id.clone(),
                machine: machine.entry(&task_id).cloned(),
                human: human.entry(&task_id).cloned(),
                task_id,
            })
            .collect()
    }

    /// Returns the agreed current state, seeded from the catalog when
    /// neither view has been written.
    ///
    /// Catalog tasks missing from the persisted state are added with
    /// their catalog lifecycle fields.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::StateInconsistency`] when the views
    /// disagree, including when only one of them exists.
    pub fn consistent_state(&self, catalog: &Spec) -> WorkflowResult<SpecStateSnapshot> {
        let disagreeing: Vec<TaskId> = self
            .divergences()
            .into_iter()
            .map(|divergence| divergence.task_id)
            .collect();
        if !disagreeing.is_empty() {
            return Err(WorkflowError::StateInconsistency {
                spec: self.spec_id.clone(),
                tasks: disagreeing,
            });
        }
        let mut current = self
            .machine
            .clone()
            .unwrap_or_else(|| SpecStateSnapshot::from_spec(catalog));
        current.fill_missing_from(catalog);
        Ok(current)
    }
}

/// Writes, verifies, and on failure rolls back both state views.
#[derive(Clone)]
pub struct DualWrite {
    machine: Arc<dyn StateView>,
    human: Arc<dyn StateView>,
}

impl DualWrite {
    /// Creates a helper over the two views.
    #[must_use]
    pub fn new(machine: Arc<dyn StateView>, human: Arc<dyn StateView>) -> Self {
        Self { machine, human }
    }

    /// Reads both views of `spec_id`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Persistence`] when either view cannot be
    /// read.
    pub async fn load_pair(&self, spec_id: &SpecId) -> WorkflowResult<ViewPair> {
        let machine = self.machine.load(spec_id).await?;
        let human = self.human.load(spec_id).await?;
        Ok(ViewPair {
            spec_id: spec_id.clone(),
            machine,
            human,
        })
    }

    /// Commits `next` to both views.
    ///
    /// `previous` must be the pair read under the same spec lock; it is
    /// what a rollback restores.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::SyncFailure`] when a write or the
    /// post-write check fails and both views were restored, or
    /// [`WorkflowError::RollbackFailed`] when restoring also failed.
    pub async fn commit(&self, previous: &ViewPair, next: &SpecStateSnapshot) -> WorkflowResult<()> {
        if let Err(err) = self.machine.store(next).await {
            return Err(self
                .roll_back(previous, format!("{} view write failed: {err}", self.machine.name()))
                .await);
        }
        if let Err(err) = self.human.store(next).await {
            return Err(self
                .roll_back(previous, format!("{} view write failed: {err}", self.human.name()))
                .await);
        }
        match self.verify(next).await {
            Ok(()) => {
                debug!(spec_id = %next.spec_id(), tasks = next.len(), "dual write verified");
                Ok(())
            }
            Err(reason) => Err(self.roll_back(previous, reason).await),
        }
    }

    async fn verify(&self, expected: &SpecStateSnapshot) -> Result<(), String> {
        for view in [&self.machine, &self.human] {
            let stored = view
                .load(expected.spec_id())
                .await
                .map_err(|err| format!("{} view re-read failed: {err}", view.name()))?
                .ok_or_else(|| format!("{} view is empty after write", view.name()))?;
            let differing = expected.divergent_tasks(&stored);
            if !differing.is_empty() {
                let ids: Vec<String> = differing.iter().map(ToString::to_string).collect();
                return Err(format!(
                    "{} view differs after write on: {}",
                    view.name(),
                    ids.join(", ")
                ));
            }
        }
        Ok(())
    }

    async fn roll_back(&self, previous: &ViewPair, reason: String) -> WorkflowError {
        warn!(spec_id = %previous.spec_id, %reason, "dual write failed; rolling back");
        let mut failures = Vec::new();
        for (view, snapshot) in [
            (&self.machine, previous.machine.as_ref()),
            (&self.human, previous.human.as_ref()),
        ] {
            if let Err(err) = view.restore(&previous.spec_id, snapshot).await {
                failures.push(format!("{} view: {err}", view.name()));
            }
        }
        if failures.is_empty() {
            return WorkflowError::SyncFailure {
                spec: previous.spec_id.clone(),
                reason,
            };
        }
        error!(
            spec_id = %previous.spec_id,
            %reason,
            restore_failures = ?failures,
            "rollback failed; views need manual reconciliation"
        );
        WorkflowError::RollbackFailed {
            spec: previous.spec_id.clone(),
            reason: format!("{reason}; restore failed for {}", failures.join(", ")),
        }
    }
}
