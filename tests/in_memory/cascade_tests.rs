//! Dependency unblocking on completion.

use super::helpers::{agents_config, committed_status, engine_with, key, spec, task};
use eyre::{bail, ensure};
use rstest::rstest;
use switchyard::{
    task::{
        domain::{Priority, TaskStatus},
        ports::SpecRepository,
    },
    workflow::{
        domain::{ErrorKind, SpecStateSnapshot},
        services::AssignOptions,
    },
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn only_dependents_with_all_dependencies_done_are_unblocked() -> eyre::Result<()> {
    let s1 = spec(
        "S1",
        [
            task("S1", "T1", TaskStatus::Ready, Priority::P1),
            task("S1", "X", TaskStatus::Complete, Priority::P2),
            task("S1", "Y", TaskStatus::Ready, Priority::P2),
            task("S1", "D1", TaskStatus::Blocked, Priority::P2).with_dependency(key("S1", "T1")),
            task("S1", "D2", TaskStatus::Blocked, Priority::P2)
                .with_dependency(key("S1", "T1"))
                .with_dependency(key("S1", "X")),
            task("S1", "D3", TaskStatus::Blocked, Priority::P2)
                .with_dependency(key("S1", "T1"))
                .with_dependency(key("S1", "Y")),
        ],
    );
    let (engine, backends) = engine_with(agents_config(), vec![s1]);
    let t1 = key("S1", "T1");
    engine
        .manager()
        .assign_task(&t1, "db-agent", &AssignOptions::default())
        .await?;
    let summary = engine.manager().complete_task(&t1).await?;

    ensure!(summary.unblocked == vec![key("S1", "D1"), key("S1", "D2")]);
    ensure!(summary.cascade_failures.is_empty());
    ensure!(committed_status(&backends, &key("S1", "D1")) == Some(TaskStatus::Ready));
    ensure!(committed_status(&backends, &key("S1", "D2")) == Some(TaskStatus::Ready));
    ensure!(committed_status(&backends, &key("S1", "D3")) == Some(TaskStatus::Blocked));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cascade_crosses_spec_boundaries() -> eyre::Result<()> {
    let s1 = spec("S1", [task("S1", "T1", TaskStatus::Ready, Priority::P1)]);
    let s2 = spec(
        "S2",
        [task("S2", "U1", TaskStatus::Blocked, Priority::P2).with_dependency(key("S1", "T1"))],
    );
    let (engine, backends) = engine_with(agents_config(), vec![s1, s2]);
    let t1 = key("S1", "T1");
    engine
        .manager()
        .assign_task(&t1, "db-agent", &AssignOptions::default())
        .await?;
    let summary = engine.manager().complete_task(&t1).await?;

    ensure!(summary.unblocked == vec![key("S2", "U1")]);
    ensure!(summary.spec_ready_to_close);
    ensure!(committed_status(&backends, &key("S2", "U1")) == Some(TaskStatus::Ready));
    let overlaid = engine.repository().get_task(&key("S2", "U1")).await?;
    ensure!(overlaid.status() == TaskStatus::Ready);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cascade_failure_is_reported_without_undoing_completion() -> eyre::Result<()> {
    let s1 = spec("S1", [task("S1", "T1", TaskStatus::Ready, Priority::P1)]);
    let s2 = spec(
        "S2",
        [task("S2", "U1", TaskStatus::Blocked, Priority::P2).with_dependency(key("S1", "T1"))],
    );
    let stray = SpecStateSnapshot::from_spec(&s2);
    let (engine, backends) = engine_with(agents_config(), vec![s1, s2]);
    backends.human.seed(stray)?;
    let t1 = key("S1", "T1");
    engine
        .manager()
        .assign_task(&t1, "db-agent", &AssignOptions::default())
        .await?;

    let summary = engine.manager().complete_task(&t1).await?;
    ensure!(summary.unblocked.is_empty());
    let [failure] = summary.cascade_failures.as_slice() else {
        bail!("expected one cascade failure, got {:?}", summary.cascade_failures);
    };
    ensure!(failure.task_key == key("S2", "U1"));
    ensure!(failure.error_kind == ErrorKind::StateInconsistency);
    ensure!(committed_status(&backends, &t1) == Some(TaskStatus::Complete));
    Ok(())
}
