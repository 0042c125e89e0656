//! Switchyard: task routing and workflow state synchronisation for agent
//! work pools.
//!
//! Given an agent's capabilities, Switchyard recommends the best next
//! task, validates that assigning it is safe, commits the assignment to
//! two redundant persisted views under a per-spec lock, and unblocks
//! dependent work when a task completes.
//!
//! # Architecture
//!
//! Switchyard follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (memory, filesystem)
//!
//! # Modules
//!
//! - [`task`]: Specs, tasks, assignments, and the catalog port
//! - [`routing`]: Eligibility, scoring, and recommendations
//! - [`validation`]: Workload, criticality, and dependency gating
//! - [`workflow`]: Dual-view state commits, locking, and cascades
//! - [`audit`]: Append-only decision and transition log
//! - [`engine`]: Wiring for in-memory and on-disk use

pub mod audit;
pub mod config;
pub mod engine;
pub mod routing;
pub mod task;
pub mod telemetry;
pub mod validation;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use engine::{Engine, EngineError, EngineParts, InMemoryBackends};
