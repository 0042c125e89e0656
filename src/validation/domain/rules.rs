//! Individual validation rules.
//!
//! Each rule inspects one concern and appends its findings; rules never
//! short-circuit, so a report lists every reason at once.

use super::{ValidationOptions, Violation, Warning};
use crate::config::ValidationConfig;
use crate::task::domain::{AgentDescriptor, Priority, Task, TaskKey, TaskStatus};
use chrono::{DateTime, Utc};

/// Facts gathered about a proposal before the rules run.
#[derive(Debug, Clone)]
pub struct RuleInput<'a> {
    /// The task as currently persisted.
    pub task: &'a Task,
    /// Priority of the owning spec.
    pub spec_priority: Priority,
    /// Dependencies that are not complete (or missing).
    pub pending_dependencies: Vec<TaskKey>,
    /// The agent with its declared capabilities.
    pub agent: &'a AgentDescriptor,
    /// Tasks the agent currently has in progress.
    pub current_workload: usize,
    /// Validation time.
    pub now: DateTime<Utc>,
}

/// Violations and warnings produced by a rule pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Findings {
    /// Blocking findings.
    pub violations: Vec<Violation>,
    /// Advisory findings.
    pub warnings: Vec<Warning>,
}

/// Runs every enabled rule.
#[must_use]
pub fn evaluate(
    input: &RuleInput<'_>,
    options: &ValidationOptions,
    config: &ValidationConfig,
) -> Findings {
    let mut findings = Findings::default();
    check_readiness(input, &mut findings);
    if options.check_workload {
        let limit = options
            .max_concurrent_tasks
            .unwrap_or(config.max_concurrent_tasks);
        check_workload(input.current_workload, limit, options.override_workload, &mut findings);
    }
    if options.check_criticality && !options.confirm_critical {
        check_criticality(input, &mut findings);
    }
    if options.check_dependencies && !input.pending_dependencies.is_empty() {
        findings.violations.push(Violation::DependenciesIncomplete {
            pending: input.pending_dependencies.clone(),
        });
    }
    if options.check_capabilities {
        check_capabilities(input, &mut findings);
    }
    check_advisories(input, options, config, &mut findings);
    findings
}

fn check_readiness(input: &RuleInput<'_>, findings: &mut Findings) {
    if let Some(assignment) = input.task.assignment() {
        findings.violations.push(Violation::AlreadyAssigned {
            agent: assignment.agent_type.clone(),
        });
    }
    if input.task.status() != TaskStatus::Ready {
        findings.violations.push(Violation::TaskNotReady {
            status: input.task.status(),
        });
    }
}

fn check_workload(current: usize, limit: usize, overridden: bool, findings: &mut Findings) {
    if current >= limit {
        if overridden {
            findings.warnings.push(Warning::WorkloadOverridden);
        } else {
            findings
                .violations
                .push(Violation::WorkloadExceeded { current, limit });
        }
    } else if current.saturating_add(1) == limit {
        findings
            .warnings
            .push(Warning::WorkloadNearLimit { current, limit });
    }
}

fn check_criticality(input: &RuleInput<'_>, findings: &mut Findings) {
    let priority = input.task.priority().min(input.spec_priority);
    if priority.is_critical() {
        findings
            .violations
            .push(Violation::CriticalConfirmationRequired { priority });
    }
}

fn check_capabilities(input: &RuleInput<'_>, findings: &mut Findings) {
    let missing = input
        .task
        .required_capabilities()
        .missing_from(input.agent.capabilities());
    if !missing.is_empty() {
        findings
            .warnings
            .push(Warning::PartialCapabilityMatch { missing });
    }
}

fn check_advisories(
    input: &RuleInput<'_>,
    options: &ValidationOptions,
    config: &ValidationConfig,
    findings: &mut Findings,
) {
    if let Some(recommended_at) = options.recommended_at {
        let age_secs = u64::try_from(input.now.signed_duration_since(recommended_at).num_seconds())
            .unwrap_or(0);
        if age_secs > config.stale_recommendation_secs {
            findings
                .warnings
                .push(Warning::StaleRecommendation { age_secs });
        }
    }
    if let Some(hours) = input.task.estimated_hours()
        && hours > config.large_task_hours
    {
        findings.warnings.push(Warning::LargeTask { hours });
    }
}
