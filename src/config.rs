//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration. Weights and penalties are tunable; only the
//! blocking/advisory split of validation outcomes is fixed.

use crate::task::domain::{AgentDescriptor, CapabilitySet, TaskDomainError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or checking configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// An agent profile declared an invalid capability tag.
    #[error("invalid agent profile '{agent}': {source}")]
    AgentProfile {
        /// The offending agent type.
        agent: String,
        /// The underlying domain error.
        source: TaskDomainError,
    },
}

/// Scoring weights, in points, for each routing factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Weight of the priority tier.
    pub priority: u32,
    /// Weight of capability fit (exact beats superset).
    pub capability_fit: u32,
    /// Weight of the downstream fan-out bonus.
    pub fan_out: u32,
    /// Weight of the time-in-ready bonus.
    pub staleness: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            priority: 400,
            capability_fit: 200,
            fan_out: 250,
            staleness: 150,
        }
    }
}

impl ScoringWeights {
    /// Returns the maximum attainable score.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.priority
            .saturating_add(self.capability_fit)
            .saturating_add(self.fan_out)
            .saturating_add(self.staleness)
    }
}

/// Routing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Factor weights.
    pub weights: ScoringWeights,
    /// Maximum number of runner-up alternatives returned.
    pub max_alternatives: usize,
    /// Dependent count at which the fan-out bonus saturates.
    pub fan_out_saturation: u32,
    /// Hours in `ready` at which the staleness bonus saturates.
    pub staleness_saturation_hours: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            max_alternatives: 3,
            fan_out_saturation: 5,
            staleness_saturation_hours: 72,
        }
    }
}

/// Validation settings and advisory penalties (basis points).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum concurrent `in_progress` tasks per agent type.
    pub max_concurrent_tasks: usize,
    /// Age after which a recommendation is considered stale.
    pub stale_recommendation_secs: u64,
    /// Estimate above which a task is flagged as large.
    pub large_task_hours: u32,
    /// Penalty for a stale recommendation.
    pub stale_penalty: u16,
    /// Penalty when required capabilities are missing.
    pub missing_capability_penalty: u16,
    /// Penalty when the agent is one task below its limit.
    pub near_limit_penalty: u16,
    /// Penalty for large tasks.
    pub large_task_penalty: u16,
    /// Penalty when the workload limit was overridden.
    pub override_penalty: u16,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 3,
            stale_recommendation_secs: 300,
            large_task_hours: 16,
            stale_penalty: 1_500,
            missing_capability_penalty: 2_000,
            near_limit_penalty: 1_000,
            large_task_penalty: 500,
            override_penalty: 2_500,
        }
    }
}

/// Per-spec lock settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Bounded wait before reporting a lock timeout.
    pub acquire_timeout_ms: u64,
    /// Age after which a held lock is presumed abandoned and may be stolen.
    pub lease_expiry_ms: u64,
    /// Delay between acquisition attempts.
    pub poll_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 5_000,
            lease_expiry_ms: 10_000,
            poll_interval_ms: 50,
        }
    }
}

impl LockConfig {
    /// Returns the acquisition timeout.
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Returns the lease expiry.
    #[must_use]
    pub const fn lease_expiry(&self) -> Duration {
        Duration::from_millis(self.lease_expiry_ms)
    }

    /// Returns the poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Routing settings.
    pub routing: RoutingConfig,
    /// Validation settings.
    pub validation: ValidationConfig,
    /// Lock settings.
    pub locking: LockConfig,
    /// Soft target for recommend → validate → commit.
    pub performance_target_ms: u64,
    /// Agent registry: agent type to capability tags.
    pub agents: BTreeMap<String, Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            routing: RoutingConfig::default(),
            validation: ValidationConfig::default(),
            locking: LockConfig::default(),
            performance_target_ms: 3_000,
            agents: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Registers an agent profile.
    #[must_use]
    pub fn with_agent<I, S>(mut self, agent_type: impl Into<String>, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agents.insert(
            agent_type.into(),
            capabilities.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Returns the soft performance target.
    #[must_use]
    pub const fn performance_target(&self) -> Duration {
        Duration::from_millis(self.performance_target_ms)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero limits or weights, a lease
    /// expiry not above the acquisition timeout, or a zero poll interval,
    /// and [`ConfigError::AgentProfile`] for malformed capability tags.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.validation.max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid(
                "validation.max_concurrent_tasks must be at least 1".to_owned(),
            ));
        }
        if self.routing.weights.total() == 0 {
            return Err(ConfigError::Invalid(
                "routing.weights must not all be zero".to_owned(),
            ));
        }
        if self.routing.fan_out_saturation == 0 || self.routing.staleness_saturation_hours == 0 {
            return Err(ConfigError::Invalid(
                "routing saturation points must be at least 1".to_owned(),
            ));
        }
        if self.locking.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "locking.poll_interval_ms must be at least 1".to_owned(),
            ));
        }
        if self.locking.lease_expiry_ms <= self.locking.acquire_timeout_ms {
            return Err(ConfigError::Invalid(
                "locking.lease_expiry_ms must exceed locking.acquire_timeout_ms".to_owned(),
            ));
        }
        for (agent, tags) in &self.agents {
            CapabilitySet::from_tags(tags).map_err(|source| ConfigError::AgentProfile {
                agent: agent.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Resolves an agent type to its descriptor.
    ///
    /// Unknown agent types receive an empty capability set and therefore
    /// match only tasks without requirements.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AgentProfile`] when the agent type is blank or
    /// its registered tags are malformed.
    pub fn resolve_agent(&self, agent_type: &str) -> Result<AgentDescriptor, ConfigError> {
        let profile_error = |source| ConfigError::AgentProfile {
            agent: agent_type.to_owned(),
            source,
        };
        let capabilities = match self.agents.get(agent_type.trim()) {
            Some(tags) => CapabilitySet::from_tags(tags).map_err(profile_error)?,
            None => {
                tracing::debug!(agent_type, "agent type not registered; no capabilities");
                CapabilitySet::empty()
            }
        };
        AgentDescriptor::new(agent_type, capabilities).map_err(profile_error)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};
    use rstest::rstest;

    #[rstest]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_json_str("{}").expect("defaults are valid");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.validation.max_concurrent_tasks, 3);
    }

    #[rstest]
    fn partial_document_overrides_selected_fields() {
        let config = EngineConfig::from_json_str(
            r#"{"validation": {"max_concurrent_tasks": 1}, "agents": {"db-agent": ["db"]}}"#,
        )
        .expect("valid config");
        assert_eq!(config.validation.max_concurrent_tasks, 1);
        assert_eq!(config.validation.stale_recommendation_secs, 300);
        let agent = config.resolve_agent("db-agent").expect("registered agent");
        assert_eq!(agent.capabilities().iter().collect::<Vec<_>>(), vec!["db"]);
    }

    #[rstest]
    #[case(r#"{"validation": {"max_concurrent_tasks": 0}}"#)]
    #[case(r#"{"locking": {"acquire_timeout_ms": 9000, "lease_expiry_ms": 9000}}"#)]
    #[case(r#"{"routing": {"weights": {"priority": 0, "capability_fit": 0, "fan_out": 0, "staleness": 0}}}"#)]
    fn invalid_values_are_rejected(#[case] document: &str) {
        let result = EngineConfig::from_json_str(document);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[rstest]
    fn malformed_agent_tags_are_rejected() {
        let result = EngineConfig::from_json_str(r#"{"agents": {"ops": ["two words"]}}"#);
        assert!(matches!(result, Err(ConfigError::AgentProfile { .. })));
    }

    #[rstest]
    fn unknown_agent_resolves_without_capabilities() {
        let agent = EngineConfig::default()
            .resolve_agent("stranger")
            .expect("non-empty agent type");
        assert!(agent.capabilities().is_empty());
    }
}
