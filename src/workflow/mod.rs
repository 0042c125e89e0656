//! Workflow state synchronisation.
//!
//! Every status change is committed to two persisted views, a
//! machine-readable aggregate store and a human-readable per-spec board,
//! under a per-spec lock. Both views are re-read after each write; if
//! they disagree the previous snapshots are restored and the operation
//! fails.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The state manager, handoff engine, and command surface in
//!   [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
