//! End-to-end recommend, assign and complete flow.

use super::helpers::{agents_config, committed_status, engine_with, key, needing, spec, task};
use eyre::{bail, ensure};
use rstest::rstest;
use switchyard::{
    Engine, InMemoryBackends,
    routing::domain::{RoutingFilters, RoutingOutcome},
    task::domain::{Priority, SpecId, TaskStatus},
    workflow::services::AssignOptions,
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn critical_task_flows_through_to_unblocking_its_dependent() -> eyre::Result<()> {
    let s1 = spec(
        "S1",
        [
            needing(task("S1", "T1", TaskStatus::Ready, Priority::P0), &["db"]),
            task("S1", "T2", TaskStatus::Blocked, Priority::P2).with_dependency(key("S1", "T1")),
        ],
    );
    let (engine, backends) = engine_with(agents_config(), vec![s1]);
    let t1 = key("S1", "T1");

    let outcome = engine
        .router()
        .recommend("db-agent", &RoutingFilters::none())
        .await?;
    let RoutingOutcome::Recommended(recommendation) = outcome else {
        bail!("expected a recommendation, got {outcome:?}");
    };
    ensure!(recommendation.task_key() == &t1);

    engine
        .manager()
        .assign_task(
            &t1,
            "db-agent",
            &AssignOptions::default().confirming_critical(true),
        )
        .await?;
    ensure!(committed_status(&backends, &t1) == Some(TaskStatus::InProgress));

    let summary = engine.manager().complete_task(&t1).await?;
    ensure!(committed_status(&backends, &t1) == Some(TaskStatus::Complete));
    ensure!(summary.unblocked == vec![key("S1", "T2")]);
    ensure!(committed_status(&backends, &key("S1", "T2")) == Some(TaskStatus::Ready));
    Ok(())
}

async fn views_agree(engine: &Engine, backends: &InMemoryBackends) -> eyre::Result<()> {
    let s1 = SpecId::new("S1")?;
    ensure!(backends.machine.snapshot(&s1) == backends.human.snapshot(&s1));
    ensure!(engine.manager().reconcile_report(&s1).await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn every_commit_leaves_both_views_identical() -> eyre::Result<()> {
    let s1 = spec(
        "S1",
        [
            task("S1", "T1", TaskStatus::Ready, Priority::P2),
            task("S1", "T2", TaskStatus::Ready, Priority::P3),
        ],
    );
    let (engine, backends) = engine_with(agents_config(), vec![s1]);
    let manager = engine.manager();

    manager
        .assign_task(&key("S1", "T1"), "db-agent", &AssignOptions::default())
        .await?;
    views_agree(&engine, &backends).await?;
    manager
        .assign_task(&key("S1", "T2"), "ui-agent", &AssignOptions::default())
        .await?;
    views_agree(&engine, &backends).await?;
    manager.complete_task(&key("S1", "T1")).await?;
    views_agree(&engine, &backends).await?;
    manager.release_task(&key("S1", "T2")).await?;
    views_agree(&engine, &backends).await?;
    Ok(())
}
