//! Validates proposed assignments against workload, criticality, and
//! dependency rules.

use crate::audit::{
    domain::{AuditEntry, AuditEventType},
    ports::{AuditError, AuditSink},
};
use crate::config::EngineConfig;
use crate::task::{
    domain::{Task, TaskKey, TaskStatus},
    ports::{SpecRepository, SpecRepositoryError},
};
use crate::validation::domain::{
    ProposedAssignment, ValidationOptions, ValidationReport,
    rules::{RuleInput, evaluate},
};
use crate::workflow::ports::{AssignmentIndex, StateViewError};
use mockable::Clock;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Validator-level failures, distinct from business violations.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// The proposal could not be interpreted.
    #[error("malformed assignment: {0}")]
    MalformedAssignment(String),
    /// The referenced task does not exist.
    #[error("unknown task: {0}")]
    UnknownTask(TaskKey),
    /// The catalog could not be read.
    #[error(transparent)]
    Repository(SpecRepositoryError),
    /// The workload index could not be read.
    #[error(transparent)]
    Workload(#[from] StateViewError),
    /// The verdict could not be audited.
    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl From<SpecRepositoryError> for ValidatorError {
    fn from(err: SpecRepositoryError) -> Self {
        match err {
            SpecRepositoryError::TaskNotFound(key) => Self::UnknownTask(key),
            other => Self::Repository(other),
        }
    }
}

/// Result type for validator operations.
pub type ValidatorResult<T> = Result<T, ValidatorError>;

/// Gates assignments; read-only apart from auditing.
#[derive(Clone)]
pub struct AssignmentValidator {
    repository: Arc<dyn SpecRepository>,
    index: Arc<dyn AssignmentIndex>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock + Send + Sync>,
    config: Arc<EngineConfig>,
}

impl AssignmentValidator {
    /// Creates a validator.
    ///
    /// `repository` must reflect committed state, so dependency and
    /// readiness checks see the latest transitions.
    #[must_use]
    pub fn new(
        repository: Arc<dyn SpecRepository>,
        index: Arc<dyn AssignmentIndex>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock + Send + Sync>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            repository,
            index,
            audit,
            clock,
            config,
        }
    }

    /// Validates `proposal` and audits the verdict.
    ///
    /// # Errors
    ///
    /// Returns [`ValidatorError::UnknownTask`] for a missing task or spec,
    /// [`ValidatorError::MalformedAssignment`] when the agent profile cannot
    /// be resolved, and propagates storage and audit failures.
    pub async fn validate(
        &self,
        proposal: &ProposedAssignment,
        options: &ValidationOptions,
    ) -> ValidatorResult<ValidationReport> {
        let key = proposal.task_key();
        let task = self.repository.get_task(key).await?;
        let spec = self
            .repository
            .get_spec(key.spec_id())
            .await
            .map_err(|err| match err {
                SpecRepositoryError::SpecNotFound(_) => ValidatorError::UnknownTask(key.clone()),
                other => ValidatorError::Repository(other),
            })?;
        let agent = self
            .config
            .resolve_agent(proposal.agent_type())
            .map_err(|err| ValidatorError::MalformedAssignment(err.to_string()))?;
        let current_workload = if options.check_workload {
            self.index
                .in_progress_for_agent(agent.agent_type())
                .await?
                .len()
        } else {
            0
        };
        let pending_dependencies = if options.check_dependencies {
            self.pending_dependencies(&task).await?
        } else {
            Vec::new()
        };

        let input = RuleInput {
            task: &task,
            spec_priority: spec.priority(),
            pending_dependencies,
            agent: &agent,
            current_workload,
            now: self.clock.utc(),
        };
        let findings = evaluate(&input, options, &self.config.validation);
        let report = ValidationReport::from_findings(
            key.clone(),
            agent.agent_type(),
            findings.violations,
            findings.warnings,
            &self.config.validation,
        );
        self.record_verdict(&report).await?;
        Ok(report)
    }

    async fn pending_dependencies(&self, task: &Task) -> ValidatorResult<Vec<TaskKey>> {
        let mut pending = Vec::new();
        for dependency in task.dependencies() {
            match self.repository.get_task(dependency).await {
                Ok(found) if found.status() == TaskStatus::Complete => {}
                Ok(_) => pending.push(dependency.clone()),
                Err(err) if err.is_not_found() => {
                    warn!(task = %task.key(), dependency = %dependency, "dependency not in catalog");
                    pending.push(dependency.clone());
                }
                Err(err) => return Err(ValidatorError::Repository(err)),
            }
        }
        Ok(pending)
    }

    async fn record_verdict(&self, report: &ValidationReport) -> ValidatorResult<()> {
        info!(
            task = %report.task_key,
            agent_type = %report.agent_type,
            can_proceed = report.can_proceed,
            violations = report.violations.len(),
            warnings = report.warnings.len(),
            "validation verdict"
        );
        let entry = AuditEntry::new(AuditEventType::ValidationVerdict, self.clock.utc())
            .for_task(&report.task_key)
            .with_payload(json!({
                "agent_type": report.agent_type,
                "is_valid": report.is_valid,
                "can_proceed": report.can_proceed,
                "confidence": report.confidence.basis_points(),
                "violations": report.violations,
                "warnings": report.warnings,
            }));
        self.audit.record(entry).await?;
        Ok(())
    }
}
