//! Filesystem adapters rooted at a working directory.
//!
//! Layout under the root:
//!
//! ```text
//! .switchyard/state.json      machine-readable aggregate store
//! .switchyard/state.lock      short store lock guarding state.json
//! .switchyard/locks/<id>.lock per-spec transition locks
//! .switchyard/audit.jsonl     audit log
//! specs/<id>.md               human-readable status boards
//! ```
//!
//! Each lock file may briefly have a `<lock>.steal` marker beside it while
//! the lock is stolen or released.

mod blocking;
mod board;
mod json_store;
mod lock_file;
mod locker;
mod workspace;

pub(crate) use blocking::run_blocking;
pub use board::MarkdownStatusBoard;
pub use json_store::JsonStateStore;
pub use locker::FileSpecLocker;
pub use workspace::Workspace;
