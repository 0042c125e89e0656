//! Validation service.

mod validator;

pub use validator::{AssignmentValidator, ValidatorError, ValidatorResult};
