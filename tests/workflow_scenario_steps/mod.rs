//! Step definitions for workflow scenario BDD tests.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
