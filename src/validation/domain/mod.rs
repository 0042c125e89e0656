//! Validation options, findings, and rules.

mod options;
mod report;
pub mod rules;

pub use options::{ProposedAssignment, ValidationOptions};
pub use report::{ValidationReport, Violation, Warning};
