//! Assignment validation: gates a proposed (task, agent) pairing.
//!
//! Findings are split into blocking violations, which stop the
//! assignment, and advisory warnings, which only lower the reported
//! confidence. Callers gate mutation on
//! [`domain::ValidationReport::can_proceed`].

pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;
