//! Workflow services: the dual-write helper, the state manager, the
//! completion cascade, and the command surface built on them.

pub mod commands;
pub mod dual_write;
pub mod handoff;
pub mod state_manager;

pub use commands::{CompletionResult, StartNextRequest, StartNextResult, WorkflowCommands};
pub use dual_write::{DualWrite, ViewPair};
pub use handoff::{CascadeFailure, HandoffEngine, HandoffReport, TaskUnblocker};
pub use state_manager::{
    AssignOptions, AssignOutcome, CompletionSummary, StateManagerParts, WorkflowStateManager,
};
