//! Port contracts for persisted views and spec locks.

pub mod lock;
pub mod state_view;

pub use lock::{LockError, LockResult, SpecLease, SpecLocker};
pub use state_view::{AssignmentIndex, StateView, StateViewError, StateViewResult};
