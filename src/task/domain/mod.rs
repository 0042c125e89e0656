//! Domain model for specifications, tasks, and assignments.
//!
//! Status values are closed enums and every permitted status change is
//! listed once in [`TaskStatus::can_transition_to`].

mod assignment;
mod capability;
mod error;
mod ids;
mod spec;
mod task;

pub use assignment::{Assignment, Confidence};
pub use capability::{AgentDescriptor, CapabilityFit, CapabilitySet, validate_agent_type};
pub use error::{ParsePriorityError, ParseSpecStatusError, ParseTaskStatusError, TaskDomainError};
pub use ids::{KEY_SEPARATOR, SpecId, TaskId, TaskKey};
pub use spec::{Spec, SpecStatus};
pub use task::{PersistedTaskState, Priority, Task, TaskStatus};
