//! Routing filters, scoring, and recommendation types.

mod filters;
mod recommendation;
mod scoring;

pub use filters::RoutingFilters;
pub use recommendation::{
    Alternative, Factor, Recommendation, RoutingMetadata, RoutingOutcome, ScoreFactor,
};
pub use scoring::{ScoreCard, ScoringInput, rank_order, score_task};
