//! Port contracts for the spec catalog.
//!
//! Ports define infrastructure-agnostic interfaces used by the routing,
//! validation, and workflow services.

pub mod repository;

pub use repository::{SpecRepository, SpecRepositoryError, SpecRepositoryResult, TaskQuery};
