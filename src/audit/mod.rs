//! Append-only audit log of routing, validation, and state transitions.
//!
//! Failures are first-class audit data: every rejected recommendation,
//! blocked validation, and failed transition is recorded alongside the
//! successes. Order is insertion order; timestamps are advisory only.
//!
//! - Domain types in [`domain`]
//! - The [`ports::AuditSink`] contract in [`ports`]
//! - In-memory and JSON-lines sinks in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;

#[cfg(test)]
mod tests;
