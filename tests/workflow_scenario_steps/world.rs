//! Shared world state for workflow scenario BDD tests.

use std::{collections::BTreeMap, sync::Arc};

use eyre::eyre;
use mockable::DefaultClock;
use rstest::fixture;
use switchyard::{
    Engine, InMemoryBackends,
    config::EngineConfig,
    routing::domain::RoutingOutcome,
    task::domain::{Spec, SpecId, Task, TaskKey},
    workflow::{
        domain::WorkflowError,
        services::{AssignOutcome, CompletionSummary},
    },
};

/// Scenario world for workflow behaviour tests.
///
/// Tasks declared by `Given` steps are collected until the first step
/// that needs the engine, which then builds it over the collected specs.
pub struct WorkflowWorld {
    pub config: EngineConfig,
    pub pending: BTreeMap<SpecId, Vec<Task>>,
    pub engine: Option<Engine>,
    pub backends: Option<InMemoryBackends>,
    pub last_outcome: Option<RoutingOutcome>,
    pub last_start: Option<Result<AssignOutcome, WorkflowError>>,
    pub last_completion: Option<Result<CompletionSummary, WorkflowError>>,
}

impl WorkflowWorld {
    /// Creates a world with the `db-agent` and `ui-agent` roster.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default()
                .with_agent("db-agent", ["db"])
                .with_agent("ui-agent", ["ui"]),
            pending: BTreeMap::new(),
            engine: None,
            backends: None,
            last_outcome: None,
            last_start: None,
            last_completion: None,
        }
    }

    /// Queues a task for the engine's catalog.
    pub fn declare(&mut self, task: Task) -> Result<(), eyre::Report> {
        if self.engine.is_some() {
            return Err(eyre!("tasks must be declared before the engine is used"));
        }
        self.pending
            .entry(task.spec_id().clone())
            .or_default()
            .push(task);
        Ok(())
    }

    /// Returns the engine, building it on first use.
    pub fn engine(&mut self) -> Result<Engine, eyre::Report> {
        if let Some(engine) = &self.engine {
            return Ok(engine.clone());
        }
        let specs = self
            .pending
            .iter()
            .map(|(spec_id, tasks)| {
                tasks.iter().cloned().try_fold(
                    Spec::new(spec_id.clone(), format!("Spec {spec_id}")),
                    Spec::with_task,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let (engine, backends) =
            Engine::in_memory(self.config.clone(), specs, Arc::new(DefaultClock))?;
        self.engine = Some(engine.clone());
        self.backends = Some(backends);
        Ok(engine)
    }

    /// Returns the backends of an already built engine.
    pub fn backends(&self) -> Result<&InMemoryBackends, eyre::Report> {
        self.backends
            .as_ref()
            .ok_or_else(|| eyre!("engine has not been built in this scenario"))
    }
}

impl Default for WorkflowWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> WorkflowWorld {
    WorkflowWorld::default()
}

/// Parses a `spec:task` key from step text.
pub fn parse_key(raw: &str) -> Result<TaskKey, eyre::Report> {
    Ok(raw.parse()?)
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
