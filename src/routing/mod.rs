//! Task routing: selects the single best next task for an agent.
//!
//! Eligibility is strict (ready, dependencies complete, capabilities
//! covered, filters satisfied) and ranking is deterministic, so repeated
//! calls against unchanged state return identical recommendations.
//!
//! - Domain types in [`domain`]
//! - The router service in [`services`]

pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;
