//! Racing assignments on the same task.

use super::helpers::{agents_config, engine_with, key, spec, task};
use eyre::ensure;
use rstest::rstest;
use switchyard::{
    task::domain::{Priority, SpecId, TaskStatus},
    workflow::{domain::ErrorKind, services::AssignOptions},
};

#[rstest]
#[case::two_callers(2)]
#[case::eight_callers(8)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exactly_one_racing_assignment_wins(#[case] callers: usize) -> eyre::Result<()> {
    let s1 = spec("S1", [task("S1", "T1", TaskStatus::Ready, Priority::P2)]);
    let (engine, backends) = engine_with(agents_config(), vec![s1]);

    let handles: Vec<_> = ["db-agent", "ui-agent"]
        .into_iter()
        .cycle()
        .take(callers)
        .map(|agent| {
            let racer = engine.clone();
            tokio::spawn(async move {
                racer
                    .manager()
                    .assign_task(&key("S1", "T1"), agent, &AssignOptions::default())
                    .await
            })
        })
        .collect();

    let mut winners = 0_usize;
    for handle in handles {
        match handle.await? {
            Ok(_) => winners += 1,
            Err(err) => ensure!(
                matches!(err.kind(), ErrorKind::InvalidTransition | ErrorKind::LockTimeout),
                "unexpected failure: {err}"
            ),
        }
    }
    ensure!(winners == 1, "{winners} assignments succeeded");

    let snapshot = backends
        .machine
        .snapshot(&SpecId::new("S1")?)
        .ok_or_else(|| eyre::eyre!("machine view is empty"))?;
    ensure!(snapshot.assignments().count() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_specs_commit_independently() -> eyre::Result<()> {
    let specs = (1..=4)
        .map(|n| {
            let id = format!("S{n}");
            spec(&id, [task(&id, "T1", TaskStatus::Ready, Priority::P2)])
        })
        .collect();
    let (engine, _backends) = engine_with(agents_config(), specs);

    let handles: Vec<_> = (1..=4)
        .map(|n| {
            let racer = engine.clone();
            tokio::spawn(async move {
                racer
                    .manager()
                    .assign_task(
                        &key(&format!("S{n}"), "T1"),
                        "full-stack",
                        &AssignOptions::default().overriding_workload(true),
                    )
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }
    Ok(())
}
