//! Then steps for workflow scenario BDD tests.

use super::world::{WorkflowWorld, parse_key};
use eyre::{ensure, eyre};
use rstest_bdd_macros::then;
use switchyard::{
    task::domain::{SpecId, TaskStatus},
    workflow::services::CompletionSummary,
};

fn completion(world: &WorkflowWorld) -> Result<&CompletionSummary, eyre::Report> {
    match world.last_completion.as_ref() {
        Some(Ok(summary)) => Ok(summary),
        Some(Err(err)) => Err(eyre!("completion failed: {err}")),
        None => Err(eyre!("no completion attempted")),
    }
}

#[then(r#"the recommended task is "{key}""#)]
fn recommended_task(world: &WorkflowWorld, key: String) -> Result<(), eyre::Report> {
    let expected = parse_key(&key)?;
    let recommendation = world
        .last_outcome
        .as_ref()
        .and_then(|outcome| outcome.recommendation())
        .ok_or_else(|| eyre!("no recommendation"))?;
    ensure!(
        recommendation.task_key() == &expected,
        "recommended {}",
        recommendation.task_key()
    );
    Ok(())
}

#[then("no task is recommended")]
fn nothing_recommended(world: &WorkflowWorld) -> Result<(), eyre::Report> {
    let outcome = world
        .last_outcome
        .as_ref()
        .ok_or_else(|| eyre!("no routing attempted"))?;
    ensure!(
        outcome.recommendation().is_none(),
        "unexpected recommendation: {outcome:?}"
    );
    Ok(())
}

#[then(r#"the start is refused with "{kind}""#)]
fn start_refused(world: &WorkflowWorld, kind: String) -> Result<(), eyre::Report> {
    match world.last_start.as_ref() {
        Some(Err(err)) => {
            ensure!(err.kind().as_str() == kind, "refused with {}", err.kind());
            Ok(())
        }
        Some(Ok(outcome)) => Err(eyre!("start succeeded: {outcome:?}")),
        None => Err(eyre!("no start attempted")),
    }
}

#[then(r#"nothing has been written for spec "{spec}""#)]
fn nothing_written(world: &WorkflowWorld, spec: String) -> Result<(), eyre::Report> {
    let spec_id = SpecId::new(spec)?;
    let backends = world.backends()?;
    ensure!(backends.machine.snapshot(&spec_id).is_none(), "machine view written");
    ensure!(backends.human.snapshot(&spec_id).is_none(), "human view written");
    Ok(())
}

#[then(r#"task "{key}" is "{status}" in both views"#)]
fn status_in_both_views(
    world: &WorkflowWorld,
    key: String,
    status: String,
) -> Result<(), eyre::Report> {
    let task_key = parse_key(&key)?;
    let expected = TaskStatus::try_from(status.as_str())?;
    let backends = world.backends()?;
    for (name, view) in [("machine", &backends.machine), ("human", &backends.human)] {
        let actual = view
            .snapshot(task_key.spec_id())
            .and_then(|snapshot| snapshot.entry(task_key.task_id()).map(|entry| entry.status));
        ensure!(
            actual == Some(expected),
            "{name} view has {task_key} as {actual:?}"
        );
    }
    Ok(())
}

#[then(r#"the completion unblocked "{key}""#)]
fn completion_unblocked(world: &WorkflowWorld, key: String) -> Result<(), eyre::Report> {
    let expected = parse_key(&key)?;
    let summary = completion(world)?;
    ensure!(
        summary.unblocked == vec![expected],
        "unblocked {:?}",
        summary.unblocked
    );
    ensure!(summary.cascade_failures.is_empty());
    Ok(())
}

#[then(r#"the completion failed with "{kind}""#)]
fn completion_failed(world: &WorkflowWorld, kind: String) -> Result<(), eyre::Report> {
    match world.last_completion.as_ref() {
        Some(Err(err)) => {
            ensure!(err.kind().as_str() == kind, "failed with {}", err.kind());
            Ok(())
        }
        Some(Ok(summary)) => Err(eyre!("completion succeeded: {summary:?}")),
        None => Err(eyre!("no completion attempted")),
    }
}
