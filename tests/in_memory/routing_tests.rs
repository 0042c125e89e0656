//! Eligibility soundness and determinism of recommendations.

use super::helpers::{agents_config, engine_with, key, needing, spec, task};
use eyre::{bail, ensure};
use rstest::{fixture, rstest};
use switchyard::{
    Engine, InMemoryBackends,
    routing::domain::{Recommendation, RoutingFilters, RoutingOutcome},
    task::{
        domain::{Priority, TaskStatus},
        ports::SpecRepository,
    },
};

/// A pool mixing every reason a task can be ineligible.
#[fixture]
fn pool() -> (Engine, InMemoryBackends) {
    let s1 = spec(
        "S1",
        [
            needing(task("S1", "A", TaskStatus::Ready, Priority::P1), &["db"]),
            needing(task("S1", "B", TaskStatus::Ready, Priority::P0), &["ui"]),
            task("S1", "C", TaskStatus::Ready, Priority::P0).with_dependency(key("S1", "D")),
            task("S1", "D", TaskStatus::Backlog, Priority::P2),
            task("S1", "E", TaskStatus::Ready, Priority::P2),
            task("S1", "F", TaskStatus::Blocked, Priority::P0),
        ],
    );
    let s2 = spec(
        "S2",
        [
            task("S2", "G", TaskStatus::Complete, Priority::P1),
            needing(task("S2", "H", TaskStatus::Ready, Priority::P2), &["db"])
                .with_dependency(key("S2", "G")),
        ],
    );
    engine_with(agents_config(), vec![s1, s2])
}

async fn recommend(engine: &Engine, agent: &str) -> eyre::Result<Box<Recommendation>> {
    match engine
        .router()
        .recommend(agent, &RoutingFilters::none())
        .await?
    {
        RoutingOutcome::Recommended(recommendation) => Ok(recommendation),
        RoutingOutcome::NoEligibleTask(metadata) => {
            bail!("no task for {agent}: {}", metadata.diagnosis())
        }
    }
}

#[rstest]
#[case::database("db-agent")]
#[case::interface("ui-agent")]
#[case::generalist("full-stack")]
#[case::unregistered("docs-agent")]
#[tokio::test(flavor = "multi_thread")]
async fn recommendations_are_always_eligible(
    pool: (Engine, InMemoryBackends),
    #[case] agent: &str,
) -> eyre::Result<()> {
    let (engine, _backends) = pool;
    let recommendation = recommend(&engine, agent).await?;
    let chosen = &recommendation.task;
    ensure!(chosen.status() == TaskStatus::Ready);
    ensure!(
        chosen
            .required_capabilities()
            .is_subset_of(recommendation.agent.capabilities())
    );
    for dependency in chosen.dependencies() {
        let found = engine.repository().get_task(dependency).await?;
        ensure!(found.status() == TaskStatus::Complete, "{dependency} is open");
    }
    for alternative in &recommendation.alternatives {
        ensure!(alternative.task_key != *chosen.key());
    }
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_calls_agree(pool: (Engine, InMemoryBackends)) -> eyre::Result<()> {
    let (engine, _backends) = pool;
    let first = recommend(&engine, "full-stack").await?;
    let second = recommend(&engine, "full-stack").await?;
    ensure!(first.task_key() == second.task_key());
    ensure!(first.alternatives == second.alternatives);
    ensure!(first.score == second.score);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unregistered_agent_only_sees_unconstrained_work(
    pool: (Engine, InMemoryBackends),
) -> eyre::Result<()> {
    let (engine, _backends) = pool;
    let recommendation = recommend(&engine, "docs-agent").await?;
    ensure!(recommendation.task_key() == &key("S1", "E"));
    ensure!(recommendation.alternatives.is_empty());
    ensure!(recommendation.metadata.agent_matches == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn priority_filter_with_no_match_reports_empty_pool(
    pool: (Engine, InMemoryBackends),
) -> eyre::Result<()> {
    let (engine, _backends) = pool;
    let outcome = engine
        .router()
        .recommend("db-agent", &RoutingFilters::none().with_priority(Priority::P3))
        .await?;
    let RoutingOutcome::NoEligibleTask(metadata) = outcome else {
        bail!("expected no eligible task, got {outcome:?}");
    };
    ensure!(metadata.total_available == 0);
    ensure!(metadata.agent_matches == 0);
    Ok(())
}
