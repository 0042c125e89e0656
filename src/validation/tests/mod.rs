//! Unit tests for the validation module.
