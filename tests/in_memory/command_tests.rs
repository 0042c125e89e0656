//! The `start_next` and `complete_current` command surface.

use super::helpers::{
    FrozenClock, agents_config, committed_status, engine_with, key, needing, spec, task,
};
use async_trait::async_trait;
use eyre::{bail, ensure};
use mockall::mock;
use rstest::rstest;
use std::sync::Arc;
use switchyard::{
    Engine, EngineParts,
    audit::{
        adapters::InMemoryAuditLog,
        domain::{AuditEventType, AuditFilter},
        ports::AuditSink,
    },
    config::EngineConfig,
    routing::domain::RoutingFilters,
    task::{
        adapters::InMemorySpecRepository,
        domain::{Assignment, Priority, Spec, SpecId, TaskId, TaskStatus},
    },
    workflow::{
        adapters::memory::{InMemorySpecLocker, InMemoryStateView},
        domain::ErrorKind,
        ports::{AssignmentIndex, StateViewError, StateViewResult},
        services::StartNextRequest,
    },
};

mock! {
    Index {}

    #[async_trait]
    impl AssignmentIndex for Index {
        async fn in_progress_for_agent(&self, agent_type: &str) -> StateViewResult<Vec<Assignment>>;
    }
}

fn pool() -> Vec<Spec> {
    vec![spec(
        "S1",
        [
            needing(task("S1", "T1", TaskStatus::Ready, Priority::P1), &["db"]),
            task("S1", "T2", TaskStatus::Ready, Priority::P0),
            task("S1", "T3", TaskStatus::Blocked, Priority::P2).with_dependency(key("S1", "T1")),
        ],
    )]
}

fn only_p1() -> RoutingFilters {
    RoutingFilters::none().with_priority(Priority::P1)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dry_run_recommends_and_validates_without_writing() -> eyre::Result<()> {
    let (engine, backends) = engine_with(agents_config(), pool());
    let result = engine
        .commands()
        .start_next(&StartNextRequest::for_agent("db-agent").with_filters(only_p1()).dry_run())
        .await;

    ensure!(result.success && result.dry_run && !result.assigned);
    ensure!(result.recommendation.as_ref().map(|r| r.task_key().clone()) == Some(key("S1", "T1")));
    ensure!(result.validation.as_ref().is_some_and(|v| v.can_proceed));
    ensure!(result.assignment.is_none());
    ensure!(backends.machine.snapshot(&SpecId::new("S1")?).is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn start_next_assigns_recommended_task() -> eyre::Result<()> {
    let (engine, backends) = engine_with(agents_config(), pool());
    let result = engine
        .commands()
        .start_next(&StartNextRequest::for_agent("db-agent").with_filters(only_p1()))
        .await;

    ensure!(result.success && result.assigned, "result: {result:?}");
    ensure!(result.assignment.as_ref().map(|a| a.agent_type.as_str()) == Some("db-agent"));
    ensure!(committed_status(&backends, &key("S1", "T1")) == Some(TaskStatus::InProgress));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unconfirmed_critical_pick_is_reported_not_assigned() -> eyre::Result<()> {
    let (engine, backends) = engine_with(agents_config(), pool());
    let request = StartNextRequest::for_agent("ui-agent");
    let refused = engine.commands().start_next(&request).await;

    ensure!(!refused.success && !refused.assigned);
    ensure!(refused.error_kind == Some(ErrorKind::ValidationBlocked));
    ensure!(refused.error_kind.is_some_and(ErrorKind::is_retryable));
    ensure!(refused.validation.as_ref().is_some_and(|v| !v.can_proceed));
    ensure!(backends.machine.snapshot(&SpecId::new("S1")?).is_none());

    let confirmed = engine
        .commands()
        .start_next(&request.confirming_critical())
        .await;
    ensure!(confirmed.assigned, "result: {confirmed:?}");
    ensure!(committed_status(&backends, &key("S1", "T2")) == Some(TaskStatus::InProgress));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn empty_pool_succeeds_with_metadata() -> eyre::Result<()> {
    let (engine, _backends) = engine_with(agents_config(), pool());
    let result = engine
        .commands()
        .start_next(
            &StartNextRequest::for_agent("db-agent")
                .with_filters(RoutingFilters::none().with_priority(Priority::P3)),
        )
        .await;
    ensure!(result.success && !result.assigned);
    ensure!(result.recommendation.is_none() && result.error.is_none());
    ensure!(result.metadata.is_some_and(|m| m.total_available == 0));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn blank_agent_is_an_invalid_request() -> eyre::Result<()> {
    let (engine, backends) = engine_with(agents_config(), pool());
    let result = engine
        .commands()
        .start_next(&StartNextRequest::for_agent("   "))
        .await;
    ensure!(!result.success);
    ensure!(result.error_kind == Some(ErrorKind::InvalidRequest));
    let failures = backends
        .audit
        .query(&AuditFilter::all().of_type(AuditEventType::TransitionFailed))
        .await?;
    ensure!(failures.len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn complete_current_reports_cascade() -> eyre::Result<()> {
    let (engine, _backends) = engine_with(agents_config(), pool());
    let started = engine
        .commands()
        .start_next(&StartNextRequest::for_agent("db-agent").with_filters(only_p1()))
        .await;
    ensure!(started.assigned);

    let result = engine
        .commands()
        .complete_current(&SpecId::new("S1")?, &TaskId::new("T1")?)
        .await;
    ensure!(result.success && result.completed);
    let unblocked = result.summary.map(|summary| summary.unblocked);
    ensure!(unblocked == Some(vec![key("S1", "T3")]));
    Ok(())
}

#[rstest]
#[case::unknown_task("T9", ErrorKind::NotFound)]
#[case::not_started("T2", ErrorKind::InvalidTransition)]
#[tokio::test(flavor = "multi_thread")]
async fn complete_current_failures_are_classified(
    #[case] task_id: &str,
    #[case] expected: ErrorKind,
) -> eyre::Result<()> {
    let (engine, _backends) = engine_with(agents_config(), pool());
    let result = engine
        .commands()
        .complete_current(&SpecId::new("S1")?, &TaskId::new(task_id)?)
        .await;
    ensure!(!result.success && !result.completed);
    ensure!(result.error_kind == Some(expected));
    ensure!(result.error.is_some());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn overrunning_target_is_audited_not_fatal() -> eyre::Result<()> {
    let config = EngineConfig {
        performance_target_ms: 0,
        ..agents_config()
    };
    let (engine, backends) = engine_with(config, pool());
    let result = engine
        .commands()
        .start_next(&StartNextRequest::for_agent("db-agent").with_filters(only_p1()))
        .await;
    ensure!(result.assigned);
    let warnings = backends
        .audit
        .query(&AuditFilter::all().of_type(AuditEventType::PerformanceWarning))
        .await?;
    ensure!(warnings.len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn validator_failure_during_start_next_is_audited() -> eyre::Result<()> {
    let mut index = MockIndex::new();
    index.expect_in_progress_for_agent().returning(|_| {
        Err(StateViewError::persistence(std::io::Error::other(
            "assignment index offline",
        )))
    });
    let config = agents_config();
    let clock: Arc<dyn mockable::Clock + Send + Sync> = Arc::new(FrozenClock::default());
    let audit = InMemoryAuditLog::new();
    let engine = Engine::assemble(
        config.clone(),
        EngineParts {
            catalog: Arc::new(InMemorySpecRepository::with_specs(pool())?),
            machine: Arc::new(InMemoryStateView::machine()),
            index: Arc::new(index),
            human: Arc::new(InMemoryStateView::human()),
            locker: Arc::new(InMemorySpecLocker::new(config.locking, Arc::clone(&clock))),
            audit: Arc::new(audit.clone()),
            clock,
        },
    )?;

    let result = engine
        .commands()
        .start_next(&StartNextRequest::for_agent("db-agent").with_filters(only_p1()))
        .await;
    ensure!(!result.success && !result.assigned, "result: {result:?}");
    ensure!(result.error_kind == Some(ErrorKind::Persistence), "result: {result:?}");

    let rejected = audit
        .query(&AuditFilter::all().of_type(AuditEventType::TransitionFailed))
        .await?;
    let [event] = rejected.as_slice() else {
        bail!("expected one rejection, got {rejected:?}");
    };
    ensure!(event.task_key == Some(key("S1", "T1")));
    ensure!(event.payload["operation"] == "start_next");
    ensure!(event.payload["agent_type"] == "db-agent");
    ensure!(event.payload["error_kind"] == "persistence");
    Ok(())
}
