//! Structured command surface for callers such as a CLI layer.
//!
//! Commands never return `Err`: every failure becomes a result with
//! `success = false`, a rendered `error` and a machine-branchable
//! `error_kind`.

use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::state_manager::{AssignOptions, CompletionSummary, WorkflowStateManager};
use crate::audit::{
    domain::{AuditEntry, AuditEventType},
    ports::AuditSink,
};
use crate::config::EngineConfig;
use crate::routing::{
    domain::{Recommendation, RoutingFilters, RoutingMetadata, RoutingOutcome},
    services::TaskRouter,
};
use crate::task::domain::{Assignment, SpecId, TaskId, TaskKey};
use crate::validation::{
    domain::{ProposedAssignment, ValidationOptions, ValidationReport},
    services::AssignmentValidator,
};
use crate::workflow::domain::{ErrorKind, WorkflowError};

/// Request for the next task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartNextRequest {
    /// Agent asking for work.
    pub agent_type: String,
    /// Routing filters.
    pub filters: RoutingFilters,
    /// Recommend and validate without writing.
    pub dry_run: bool,
    /// Confirms top-tier work.
    pub confirm_critical: bool,
    /// Downgrades a workload violation to a warning.
    pub override_workload: bool,
}

impl StartNextRequest {
    /// Creates a request with no filters.
    #[must_use]
    pub fn for_agent(agent_type: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
            ..Self::default()
        }
    }

    /// Replaces the filters.
    #[must_use]
    pub fn with_filters(mut self, filters: RoutingFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Enables dry-run mode.
    #[must_use]
    pub const fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Confirms top-tier work.
    #[must_use]
    pub const fn confirming_critical(mut self) -> Self {
        self.confirm_critical = true;
        self
    }

    /// Overrides the workload limit.
    #[must_use]
    pub const fn overriding_workload(mut self) -> Self {
        self.override_workload = true;
        self
    }
}

/// Outcome of [`WorkflowCommands::start_next`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartNextResult {
    /// No error occurred; an empty pool still succeeds.
    pub success: bool,
    /// A task moved to `in_progress`.
    pub assigned: bool,
    /// The request was a dry run.
    pub dry_run: bool,
    /// The router's pick, if any.
    pub recommendation: Option<Recommendation>,
    /// Candidate pool counts.
    pub metadata: Option<RoutingMetadata>,
    /// The validator's verdict, if validation ran.
    pub validation: Option<ValidationReport>,
    /// The committed assignment.
    pub assignment: Option<Assignment>,
    /// Rendered failure.
    pub error: Option<String>,
    /// Failure classification.
    pub error_kind: Option<ErrorKind>,
}

impl StartNextResult {
    const fn empty(dry_run: bool) -> Self {
        Self {
            success: true,
            assigned: false,
            dry_run,
            recommendation: None,
            metadata: None,
            validation: None,
            assignment: None,
            error: None,
            error_kind: None,
        }
    }

    fn fail(mut self, err: &WorkflowError) -> Self {
        self.success = false;
        self.error = Some(err.to_string());
        self.error_kind = Some(err.kind());
        self
    }
}

/// Outcome of [`WorkflowCommands::complete_current`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    /// No error occurred.
    pub success: bool,
    /// The task moved to `complete`.
    pub completed: bool,
    /// What the completion changed.
    pub summary: Option<CompletionSummary>,
    /// Rendered failure.
    pub error: Option<String>,
    /// Failure classification.
    pub error_kind: Option<ErrorKind>,
}

/// Recommend, validate, and commit as single calls.
#[derive(Clone)]
pub struct WorkflowCommands {
    router: TaskRouter,
    validator: AssignmentValidator,
    manager: WorkflowStateManager,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock + Send + Sync>,
    config: Arc<EngineConfig>,
}

impl WorkflowCommands {
    /// Creates the command surface.
    #[must_use]
    pub fn new(
        router: TaskRouter,
        validator: AssignmentValidator,
        manager: WorkflowStateManager,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock + Send + Sync>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            router,
            validator,
            manager,
            audit,
            clock,
            config,
        }
    }

    /// Recommends a task for the agent, validates it, and unless this is
    /// a dry run assigns it.
    ///
    /// Overrunning the configured performance target is logged and
    /// audited but never aborts the call.
    pub async fn start_next(&self, request: &StartNextRequest) -> StartNextResult {
        let started = Instant::now();
        let result = match self
            .router
            .recommend(&request.agent_type, &request.filters)
            .await
        {
            Ok(RoutingOutcome::Recommended(recommendation)) => {
                self.take_recommended(request, *recommendation).await
            }
            Ok(RoutingOutcome::NoEligibleTask(metadata)) => {
                info!(
                    agent_type = %request.agent_type,
                    diagnosis = metadata.diagnosis(),
                    "no task to start"
                );
                let mut empty = StartNextResult::empty(request.dry_run);
                empty.metadata = Some(metadata);
                empty
            }
            Err(err) => {
                let failure = WorkflowError::from(err);
                self.record_rejection(&request.agent_type, None, &failure).await;
                StartNextResult::empty(request.dry_run).fail(&failure)
            }
        };
        self.check_pace("start_next", started.elapsed()).await;
        result
    }

    /// Completes a task and runs its dependency cascade.
    pub async fn complete_current(&self, spec_id: &SpecId, task_id: &TaskId) -> CompletionResult {
        let key = TaskKey::new(spec_id.clone(), task_id.clone());
        match self.manager.complete_task(&key).await {
            Ok(summary) => CompletionResult {
                success: true,
                completed: true,
                summary: Some(summary),
                error: None,
                error_kind: None,
            },
            Err(err) => CompletionResult {
                success: false,
                completed: false,
                summary: None,
                error: Some(err.to_string()),
                error_kind: Some(err.kind()),
            },
        }
    }

    async fn take_recommended(
        &self,
        request: &StartNextRequest,
        recommendation: Recommendation,
    ) -> StartNextResult {
        let mut result = StartNextResult::empty(request.dry_run);
        result.metadata = Some(recommendation.metadata);
        let key = recommendation.task_key().clone();
        let agent_type = recommendation.agent.agent_type().to_owned();
        let recommended_at = recommendation.recommended_at;
        result.recommendation = Some(recommendation);

        let proposal = match ProposedAssignment::new(key.clone(), &agent_type) {
            Ok(proposal) => proposal,
            Err(err) => {
                let failure = WorkflowError::from(err);
                self.record_rejection(&agent_type, Some(&key), &failure).await;
                return result.fail(&failure);
            }
        };
        let options = ValidationOptions::default()
            .confirming_critical(request.confirm_critical)
            .overriding_workload(request.override_workload)
            .recommended_at(recommended_at);
        let validation = match self.validator.validate(&proposal, &options).await {
            Ok(validation) => validation,
            Err(err) => {
                let failure = WorkflowError::from(err);
                self.record_rejection(&agent_type, Some(&key), &failure).await;
                return result.fail(&failure);
            }
        };
        let blocked = (!validation.can_proceed).then(|| WorkflowError::ValidationBlocked {
            task: key.clone(),
            violations: validation.violations.clone(),
        });
        result.validation = Some(validation);
        if let Some(failure) = blocked {
            return result.fail(&failure);
        }
        if request.dry_run {
            return result;
        }

        let assign_options = AssignOptions::default()
            .confirming_critical(request.confirm_critical)
            .overriding_workload(request.override_workload)
            .recommended_at(recommended_at);
        match self
            .manager
            .assign_task(&key, &agent_type, &assign_options)
            .await
        {
            Ok(outcome) => {
                result.assigned = true;
                result.validation = Some(outcome.validation);
                result.assignment = Some(outcome.assignment);
                result
            }
            Err(err) => result.fail(&err),
        }
    }

    async fn record_rejection(
        &self,
        agent_type: &str,
        task: Option<&TaskKey>,
        err: &WorkflowError,
    ) {
        let mut entry = AuditEntry::new(AuditEventType::TransitionFailed, self.clock.utc())
            .with_payload(json!({
                "operation": "start_next",
                "agent_type": agent_type,
                "error_kind": err.kind(),
                "error": err.to_string(),
            }));
        if let Some(key) = task {
            entry = entry.for_task(key);
        }
        if let Err(audit_err) = self.audit.record(entry).await {
            warn!(error = %audit_err, "failed to audit rejected request");
        }
    }

    async fn check_pace(&self, operation: &'static str, elapsed: Duration) {
        let target = self.config.performance_target();
        if elapsed <= target {
            return;
        }
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        warn!(
            operation,
            elapsed_ms,
            target_ms = self.config.performance_target_ms,
            "performance target exceeded"
        );
        let entry = AuditEntry::new(AuditEventType::PerformanceWarning, self.clock.utc())
            .with_payload(json!({
                "operation": operation,
                "elapsed_ms": elapsed_ms,
                "target_ms": self.config.performance_target_ms,
            }));
        if let Err(err) = self.audit.record(entry).await {
            warn!(error = %err, "failed to audit performance warning");
        }
    }
}
