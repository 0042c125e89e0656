//! Audit event model and query filter.

mod event;
mod filter;

pub use event::{AuditEntry, AuditEvent, AuditEventType};
pub use filter::AuditFilter;
