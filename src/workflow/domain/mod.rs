//! Snapshots of persisted task state and workflow errors.

mod error;
mod snapshot;

pub use error::{ErrorKind, WorkflowError, WorkflowResult};
pub use snapshot::{Divergence, SpecStateSnapshot, TaskStateEntry};
