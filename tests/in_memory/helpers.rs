//! Shared test helpers for in-memory engine integration tests.

use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use std::sync::Arc;
use switchyard::{
    Engine, InMemoryBackends,
    config::EngineConfig,
    task::domain::{CapabilitySet, Priority, Spec, SpecId, Task, TaskKey, TaskStatus},
};

/// Clock frozen at 2026-04-01T09:00:00Z.
#[derive(Debug, Clone, Copy)]
pub struct FrozenClock(pub DateTime<Utc>);

impl Default for FrozenClock {
    fn default() -> Self {
        Self(
            Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0)
                .single()
                .expect("valid fixed time"),
        )
    }
}

impl Clock for FrozenClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Builds a task key.
pub fn key(spec: &str, task: &str) -> TaskKey {
    TaskKey::from_parts(spec, task).expect("valid task key")
}

/// Builds a task with the given status and priority.
pub fn task(spec: &str, id: &str, status: TaskStatus, priority: Priority) -> Task {
    Task::new(key(spec, id), format!("Task {id}"))
        .expect("valid task")
        .with_status(status)
        .with_priority(priority)
}

/// Builds a task requiring capability tags.
pub fn needing(task: Task, tags: &[&str]) -> Task {
    task.with_required_capabilities(CapabilitySet::from_tags(tags).expect("valid tags"))
}

/// Builds a spec from tasks.
pub fn spec(id: &str, tasks: impl IntoIterator<Item = Task>) -> Spec {
    tasks
        .into_iter()
        .try_fold(
            Spec::new(SpecId::new(id).expect("valid spec id"), format!("Spec {id}")),
            Spec::with_task,
        )
        .expect("valid spec")
}

/// Engine configuration registering the agents used across suites.
pub fn agents_config() -> EngineConfig {
    EngineConfig::default()
        .with_agent("db-agent", ["db"])
        .with_agent("ui-agent", ["ui"])
        .with_agent("full-stack", ["db", "ui", "api"])
}

/// Builds an in-memory engine over `specs`.
pub fn engine_with(config: EngineConfig, specs: Vec<Spec>) -> (Engine, InMemoryBackends) {
    Engine::in_memory(config, specs, Arc::new(FrozenClock::default())).expect("valid engine")
}

/// Status of a task in both views, `None` unless the views agree.
pub fn committed_status(backends: &InMemoryBackends, task: &TaskKey) -> Option<TaskStatus> {
    let machine = backends.machine.snapshot(task.spec_id())?;
    let human = backends.human.snapshot(task.spec_id())?;
    let entry = machine.entry(task.task_id())?;
    (human.entry(task.task_id()) == Some(entry)).then_some(entry.status)
}
