//! Partial-write recovery across the two state views.

use super::helpers::{agents_config, committed_status, engine_with, key, spec, task};
use eyre::ensure;
use rstest::rstest;
use switchyard::{
    audit::{
        domain::{AuditEventType, AuditFilter},
        ports::AuditSink,
    },
    task::domain::{Priority, SpecId, TaskStatus},
    workflow::{domain::ErrorKind, services::AssignOptions},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_second_write_restores_first_view() -> eyre::Result<()> {
    let s1 = spec(
        "S1",
        [
            task("S1", "T1", TaskStatus::Ready, Priority::P2),
            task("S1", "T2", TaskStatus::Blocked, Priority::P2).with_dependency(key("S1", "T1")),
        ],
    );
    let (engine, backends) = engine_with(agents_config(), vec![s1]);
    let t1 = key("S1", "T1");
    engine
        .manager()
        .assign_task(&t1, "db-agent", &AssignOptions::default())
        .await?;
    let before = backends.machine.snapshot(&SpecId::new("S1")?);

    backends.human.fail_next_store();
    let failed = engine.manager().complete_task(&t1).await;
    ensure!(
        matches!(failed, Err(ref err) if err.kind() == ErrorKind::SyncFailure),
        "expected sync failure, got {failed:?}"
    );
    ensure!(backends.machine.snapshot(&SpecId::new("S1")?) == before);
    ensure!(committed_status(&backends, &t1) == Some(TaskStatus::InProgress));
    ensure!(committed_status(&backends, &key("S1", "T2")) == Some(TaskStatus::Blocked));

    let retried = engine.manager().complete_task(&t1).await?;
    ensure!(retried.unblocked == vec![key("S1", "T2")]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unrestorable_views_escalate_and_block_further_writes() -> eyre::Result<()> {
    let s1 = spec("S1", [task("S1", "T1", TaskStatus::Ready, Priority::P2)]);
    let (engine, backends) = engine_with(agents_config(), vec![s1]);
    let t1 = key("S1", "T1");

    backends.human.fail_next_store();
    backends.machine.fail_restore(true);
    let failed = engine
        .manager()
        .assign_task(&t1, "db-agent", &AssignOptions::default())
        .await;
    ensure!(matches!(failed, Err(ref err) if err.kind() == ErrorKind::RollbackFailed));
    backends.machine.fail_restore(false);

    let s1_id = SpecId::new("S1")?;
    let divergences = engine.manager().reconcile_report(&s1_id).await?;
    ensure!(divergences.len() == 1, "machine view kept the write: {divergences:?}");

    let refused = engine.manager().release_task(&t1).await;
    ensure!(matches!(refused, Err(ref err) if err.kind() == ErrorKind::StateInconsistency));

    let failures = backends
        .audit
        .query(&AuditFilter::all().of_type(AuditEventType::TransitionFailed))
        .await?;
    let kinds: Vec<_> = failures
        .iter()
        .map(|event| event.payload["error_kind"].clone())
        .collect();
    ensure!(kinds == vec!["rollback_failed", "state_inconsistency"]);
    Ok(())
}
