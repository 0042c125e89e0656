//! In-memory views and locks for tests and single-process embedding.

mod locker;
mod view;

pub use locker::InMemorySpecLocker;
pub use view::InMemoryStateView;
