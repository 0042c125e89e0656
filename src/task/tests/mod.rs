//! Unit tests for the task catalog module.
