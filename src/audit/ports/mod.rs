//! Port contracts for audit sinks.

pub mod sink;

pub use sink::{AuditError, AuditResult, AuditSink};
