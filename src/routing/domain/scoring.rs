//! Integer scoring and deterministic ranking.
//!
//! Every factor yields whole points between zero and its weight, so a
//! task's score never exceeds [`crate::config::ScoringWeights::total`] and identical
//! inputs always produce identical scores.

use super::{Factor, ScoreFactor};
use crate::config::RoutingConfig;
use crate::task::domain::{AgentDescriptor, CapabilityFit, Priority, Task};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Everything the scorer needs to know about one candidate.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    /// The candidate task.
    pub task: &'a Task,
    /// The requesting agent.
    pub agent: &'a AgentDescriptor,
    /// Number of non-complete tasks that depend on the candidate.
    pub fan_out: u32,
    /// Reference time for staleness.
    pub now: DateTime<Utc>,
}

/// Score of one candidate with its breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreCard {
    /// Sum of all factor points.
    pub total: u32,
    /// Per-factor contributions in a fixed order.
    pub factors: Vec<ScoreFactor>,
    /// Fan-out used for tie-breaking.
    pub fan_out: u32,
}

impl ScoreCard {
    /// Renders the breakdown as one line.
    #[must_use]
    pub fn reasoning(&self) -> String {
        let parts: Vec<String> = self.factors.iter().map(ToString::to_string).collect();
        format!("score {} = {}", self.total, parts.join("; "))
    }
}

fn proportion(weight: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = u64::from(weight).saturating_mul(u64::from(numerator.min(denominator)));
    scaled
        .checked_div(u64::from(denominator))
        .and_then(|points| u32::try_from(points).ok())
        .unwrap_or(0)
}

fn priority_factor(priority: Priority, weight: u32) -> ScoreFactor {
    ScoreFactor {
        factor: Factor::Priority,
        points: proportion(weight, priority.weight(), Priority::TIERS),
        detail: format!("{priority} tier"),
    }
}

fn capability_factor(task: &Task, agent: &AgentDescriptor, weight: u32) -> ScoreFactor {
    let required = task.required_capabilities();
    let declared = u32::try_from(agent.capabilities().len()).unwrap_or(u32::MAX);
    let needed = u32::try_from(required.len()).unwrap_or(u32::MAX);
    let (points, detail) = match agent.fit_for(required) {
        CapabilityFit::Exact => (weight, format!("exact match on {required}")),
        CapabilityFit::Superset => (
            proportion(weight, needed, declared),
            format!("{needed} of {declared} declared capabilities used"),
        ),
        CapabilityFit::Unconstrained => {
            (proportion(weight, 1, 2), "no capabilities required".to_owned())
        }
        CapabilityFit::Missing => (
            0,
            format!("missing {}", required.missing_from(agent.capabilities()).join(", ")),
        ),
    };
    ScoreFactor {
        factor: Factor::CapabilityFit,
        points,
        detail,
    }
}

fn fan_out_factor(fan_out: u32, weight: u32, saturation: u32) -> ScoreFactor {
    ScoreFactor {
        factor: Factor::FanOut,
        points: proportion(weight, fan_out, saturation),
        detail: format!("{fan_out} open dependents"),
    }
}

fn staleness_factor(task: &Task, now: DateTime<Utc>, weight: u32, saturation: u32) -> ScoreFactor {
    let hours = task
        .ready_since()
        .map(|since| now.signed_duration_since(since).num_hours())
        .and_then(|elapsed| u32::try_from(elapsed.max(0)).ok())
        .unwrap_or(0);
    ScoreFactor {
        factor: Factor::Staleness,
        points: proportion(weight, hours, saturation),
        detail: format!("ready for {hours}h"),
    }
}

/// Scores one candidate against the routing configuration.
#[must_use]
pub fn score_task(input: ScoringInput<'_>, config: &RoutingConfig) -> ScoreCard {
    let weights = config.weights;
    let factors = vec![
        priority_factor(input.task.priority(), weights.priority),
        capability_factor(input.task, input.agent, weights.capability_fit),
        fan_out_factor(input.fan_out, weights.fan_out, config.fan_out_saturation),
        staleness_factor(
            input.task,
            input.now,
            weights.staleness,
            config.staleness_saturation_hours,
        ),
    ];
    let total = factors
        .iter()
        .fold(0_u32, |sum, factor| sum.saturating_add(factor.points));
    ScoreCard {
        total,
        factors,
        fan_out: input.fan_out,
    }
}

/// Total order over scored candidates: best first.
///
/// Score descending, then priority, then fan-out descending, then task key
/// ascending, so no two distinct tasks ever compare equal.
#[must_use]
pub fn rank_order(left: (&Task, &ScoreCard), right: (&Task, &ScoreCard)) -> Ordering {
    let (left_task, left_card) = left;
    let (right_task, right_card) = right;
    right_card
        .total
        .cmp(&left_card.total)
        .then_with(|| left_task.priority().cmp(&right_task.priority()))
        .then_with(|| right_card.fan_out.cmp(&left_card.fan_out))
        .then_with(|| left_task.key().cmp(right_task.key()))
}
