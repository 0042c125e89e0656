//! Unit tests for the audit log module.

mod memory_tests;
