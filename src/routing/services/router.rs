//! Recommends the best next task for an agent.

use crate::audit::{
    domain::{AuditEntry, AuditEventType},
    ports::{AuditError, AuditSink},
};
use crate::config::{ConfigError, EngineConfig};
use crate::routing::domain::{
    Alternative, Recommendation, RoutingFilters, RoutingMetadata, RoutingOutcome, ScoreCard,
    ScoringInput, rank_order, score_task,
};
use crate::task::{
    domain::{AgentDescriptor, Spec, Task, TaskKey, TaskStatus},
    ports::{SpecRepository, SpecRepositoryError},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while routing. An empty candidate pool is not an error.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The agent type was empty or whitespace.
    #[error("agent type must not be empty")]
    EmptyAgentType,
    /// The agent profile could not be resolved.
    #[error(transparent)]
    Agent(#[from] ConfigError),
    /// The catalog could not be read.
    #[error(transparent)]
    Repository(#[from] SpecRepositoryError),
    /// The outcome could not be audited.
    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Result type for routing operations.
pub type RoutingResult<T> = Result<T, RoutingError>;

/// Status lookup and dependent counts over one catalog snapshot.
struct CatalogIndex {
    statuses: BTreeMap<TaskKey, TaskStatus>,
    open_dependents: BTreeMap<TaskKey, u32>,
}

impl CatalogIndex {
    fn build(specs: &[Spec]) -> Self {
        let mut statuses = BTreeMap::new();
        let mut open_dependents: BTreeMap<TaskKey, u32> = BTreeMap::new();
        for task in specs.iter().flat_map(Spec::tasks) {
            statuses.insert(task.key().clone(), task.status());
            if task.status() == TaskStatus::Complete {
                continue;
            }
            for dependency in task.dependencies() {
                let count = open_dependents.entry(dependency.clone()).or_default();
                *count = count.saturating_add(1);
            }
        }
        Self {
            statuses,
            open_dependents,
        }
    }

    fn dependencies_complete(&self, task: &Task) -> bool {
        task.dependencies().iter().all(|dependency| {
            let status = self.statuses.get(dependency);
            if status.is_none() {
                warn!(
                    task = %task.key(),
                    dependency = %dependency,
                    "dependency missing from catalog; treating as incomplete"
                );
            }
            status == Some(&TaskStatus::Complete)
        })
    }

    fn fan_out(&self, key: &TaskKey) -> u32 {
        self.open_dependents.get(key).copied().unwrap_or(0)
    }
}

/// Read-only task router.
///
/// Routing takes no lock; the validator and the state manager re-check
/// everything the recommendation relied on.
#[derive(Clone)]
pub struct TaskRouter {
    repository: Arc<dyn SpecRepository>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock + Send + Sync>,
    config: Arc<EngineConfig>,
}

impl TaskRouter {
    /// Creates a router over `repository`.
    #[must_use]
    pub fn new(
        repository: Arc<dyn SpecRepository>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock + Send + Sync>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            repository,
            audit,
            clock,
            config,
        }
    }

    /// Recommends the best ready task for `agent_type`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::EmptyAgentType`] for a blank agent type and
    /// propagates catalog and audit failures.
    pub async fn recommend(
        &self,
        agent_type: &str,
        filters: &RoutingFilters,
    ) -> RoutingResult<RoutingOutcome> {
        if agent_type.trim().is_empty() {
            return Err(RoutingError::EmptyAgentType);
        }
        let agent = self.config.resolve_agent(agent_type)?;
        let now = self.clock.utc();
        let specs = self.repository.list_specs().await?;
        let index = CatalogIndex::build(&specs);

        let available: Vec<&Task> = specs
            .iter()
            .filter(|spec| filters.admits_spec(spec.status()))
            .flat_map(Spec::tasks)
            .filter(|task| task.status() == TaskStatus::Ready)
            .filter(|task| filters.admits_task(task))
            .filter(|task| index.dependencies_complete(task))
            .collect();

        let mut ranked: Vec<(&Task, ScoreCard)> = available
            .iter()
            .copied()
            .filter(|task| task.required_capabilities().is_subset_of(agent.capabilities()))
            .map(|task| {
                let input = ScoringInput {
                    task,
                    agent: &agent,
                    fan_out: index.fan_out(task.key()),
                    now,
                };
                (task, score_task(input, &self.config.routing))
            })
            .collect();
        ranked.sort_by(|left, right| rank_order((left.0, &left.1), (right.0, &right.1)));

        let metadata = RoutingMetadata {
            total_available: available.len(),
            agent_matches: ranked.len(),
        };
        debug!(
            agent_type = agent.agent_type(),
            total_available = metadata.total_available,
            agent_matches = metadata.agent_matches,
            "routing candidates collected"
        );

        let mut candidates = ranked.into_iter();
        let Some((chosen, card)) = candidates.next() else {
            self.record_no_task(&agent, metadata, now).await?;
            return Ok(RoutingOutcome::NoEligibleTask(metadata));
        };
        let alternatives = candidates
            .take(self.config.routing.max_alternatives)
            .map(|(task, runner_up)| Alternative {
                task_key: task.key().clone(),
                title: task.title().to_owned(),
                priority: task.priority(),
                score: runner_up.total,
            })
            .collect();

        let recommendation = Recommendation {
            task: chosen.clone(),
            agent,
            score: card.total,
            reasoning: card.reasoning(),
            factors: card.factors,
            alternatives,
            metadata,
            recommended_at: now,
        };
        self.record_recommendation(&recommendation).await?;
        Ok(RoutingOutcome::Recommended(Box::new(recommendation)))
    }

    async fn record_recommendation(&self, recommendation: &Recommendation) -> RoutingResult<()> {
        info!(
            agent_type = recommendation.agent.agent_type(),
            task = %recommendation.task_key(),
            score = recommendation.score,
            "task recommended"
        );
        let alternatives: Vec<String> = recommendation
            .alternatives
            .iter()
            .map(|alternative| alternative.task_key.to_string())
            .collect();
        let entry = AuditEntry::new(
            AuditEventType::RecommendationIssued,
            recommendation.recommended_at,
        )
        .for_task(recommendation.task_key())
        .with_payload(json!({
            "agent_type": recommendation.agent.agent_type(),
            "score": recommendation.score,
            "reasoning": recommendation.reasoning,
            "alternatives": alternatives,
            "total_available": recommendation.metadata.total_available,
            "agent_matches": recommendation.metadata.agent_matches,
        }));
        self.audit.record(entry).await?;
        Ok(())
    }

    async fn record_no_task(
        &self,
        agent: &AgentDescriptor,
        metadata: RoutingMetadata,
        at: DateTime<Utc>,
    ) -> RoutingResult<()> {
        info!(
            agent_type = agent.agent_type(),
            total_available = metadata.total_available,
            "no eligible task"
        );
        let entry = AuditEntry::new(AuditEventType::NoEligibleTask, at).with_payload(json!({
            "agent_type": agent.agent_type(),
            "total_available": metadata.total_available,
            "agent_matches": metadata.agent_matches,
            "diagnosis": metadata.diagnosis(),
        }));
        self.audit.record(entry).await?;
        Ok(())
    }
}
