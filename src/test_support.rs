//! Shared helpers for unit tests.

use crate::task::domain::{
    Assignment, CapabilitySet, PersistedTaskState, Priority, Spec, SpecId, Task, TaskKey,
    TaskStatus,
};
use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn at(year: i32, month: u32, day: u32, hour: u32) -> Self {
        Self(
            Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
                .single()
                .expect("valid fixed time"),
        )
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn key(spec: &str, task: &str) -> TaskKey {
    TaskKey::from_parts(spec, task).expect("valid task key")
}

pub fn spec_id(raw: &str) -> SpecId {
    SpecId::new(raw).expect("valid spec id")
}

pub fn caps(tags: &[&str]) -> CapabilitySet {
    CapabilitySet::from_tags(tags).expect("valid capability tags")
}

pub fn task(spec: &str, id: &str, status: TaskStatus, priority: Priority) -> Task {
    Task::new(key(spec, id), format!("Task {id}"))
        .expect("valid task")
        .with_status(status)
        .with_priority(priority)
}

pub fn spec_with(id: &str, tasks: impl IntoIterator<Item = Task>) -> Spec {
    tasks
        .into_iter()
        .try_fold(Spec::new(spec_id(id), format!("Spec {id}")), Spec::with_task)
        .expect("valid spec")
}

pub fn in_progress(spec: &str, id: &str, agent: &str, at: DateTime<Utc>) -> Task {
    task(spec, id, TaskStatus::Ready, Priority::P2).with_persisted_state(PersistedTaskState {
        status: TaskStatus::InProgress,
        ready_since: None,
        assignment: Some(Assignment::new(key(spec, id), agent, at)),
    })
}
