//! Audit sink implementations.

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonLinesAuditLog;
pub use memory::InMemoryAuditLog;
