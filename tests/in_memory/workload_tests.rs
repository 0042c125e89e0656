//! Workload limits: the validator verdict and the commit-time re-check.

use super::helpers::{agents_config, engine_with, key, spec, task};
use eyre::{bail, ensure};
use rstest::rstest;
use switchyard::{
    task::domain::{Priority, Spec, TaskStatus},
    validation::domain::{ProposedAssignment, ValidationOptions, Violation, Warning},
    workflow::{domain::WorkflowError, services::AssignOptions},
};

fn busy_pool() -> Vec<Spec> {
    vec![spec(
        "S1",
        (1..=5).map(|n| task("S1", &format!("T{n}"), TaskStatus::Ready, Priority::P2)),
    )]
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn agent_at_limit_is_refused_by_validator_and_manager() -> eyre::Result<()> {
    let (engine, _backends) = engine_with(agents_config(), busy_pool());
    for n in 1..=3 {
        engine
            .manager()
            .assign_task(&key("S1", &format!("T{n}")), "db-agent", &AssignOptions::default())
            .await?;
    }

    let proposal = ProposedAssignment::new(key("S1", "T4"), "db-agent")
        .map_err(|_| eyre::eyre!("blank agent"))?;
    let report = engine
        .validator()
        .validate(&proposal, &ValidationOptions::default())
        .await?;
    ensure!(!report.can_proceed);
    ensure!(
        report.violations
            == vec![Violation::WorkloadExceeded {
                current: 3,
                limit: 3
            }]
    );

    let forced = engine
        .manager()
        .assign_task(&key("S1", "T4"), "db-agent", &AssignOptions::default())
        .await;
    let Err(WorkflowError::ValidationBlocked { violations, .. }) = forced else {
        bail!("expected the manager to refuse, got {forced:?}");
    };
    ensure!(violations == report.violations);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn override_downgrades_limit_to_warning() -> eyre::Result<()> {
    let (engine, _backends) = engine_with(agents_config(), busy_pool());
    for n in 1..=3 {
        engine
            .manager()
            .assign_task(&key("S1", &format!("T{n}")), "db-agent", &AssignOptions::default())
            .await?;
    }
    let outcome = engine
        .manager()
        .assign_task(
            &key("S1", "T4"),
            "db-agent",
            &AssignOptions::default().overriding_workload(true),
        )
        .await?;
    ensure!(outcome.validation.warnings.contains(&Warning::WorkloadOverridden));
    ensure!(!outcome.validation.is_valid);
    ensure!(outcome.assignment.confidence == outcome.validation.confidence);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn completed_work_frees_capacity() -> eyre::Result<()> {
    let (engine, _backends) = engine_with(agents_config(), busy_pool());
    for n in 1..=3 {
        engine
            .manager()
            .assign_task(&key("S1", &format!("T{n}")), "db-agent", &AssignOptions::default())
            .await?;
    }
    engine.manager().complete_task(&key("S1", "T1")).await?;
    engine
        .manager()
        .assign_task(&key("S1", "T4"), "db-agent", &AssignOptions::default())
        .await?;
    Ok(())
}
