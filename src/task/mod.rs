//! Specification and task catalog for Switchyard.
//!
//! This module holds the data model shared by every other component:
//! specs, tasks, priorities, capability sets, and live assignments. The
//! catalog itself is an external collaborator reached through the
//! [`ports::SpecRepository`] read port. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;

#[cfg(test)]
mod tests;
