//! When steps for workflow scenario BDD tests.

use super::world::{WorkflowWorld, parse_key, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;
use switchyard::{routing::domain::RoutingFilters, workflow::services::AssignOptions};

fn start(
    world: &mut WorkflowWorld,
    agent: &str,
    key: &str,
    options: &AssignOptions,
) -> Result<(), eyre::Report> {
    let task_key = parse_key(key)?;
    let engine = world.engine()?;
    let result = run_async(engine.manager().assign_task(&task_key, agent, options));
    world.last_start = Some(result);
    Ok(())
}

#[when(r#""{agent}" asks for the next task"#)]
fn asks_for_next(world: &mut WorkflowWorld, agent: String) -> Result<(), eyre::Report> {
    let engine = world.engine()?;
    let outcome = run_async(engine.router().recommend(&agent, &RoutingFilters::none()))
        .wrap_err("recommend a task")?;
    world.last_outcome = Some(outcome);
    Ok(())
}

#[when(r#""{agent}" starts "{key}""#)]
fn starts(world: &mut WorkflowWorld, agent: String, key: String) -> Result<(), eyre::Report> {
    start(world, &agent, &key, &AssignOptions::default())
}

#[when(r#""{agent}" confirms and starts "{key}""#)]
fn confirms_and_starts(
    world: &mut WorkflowWorld,
    agent: String,
    key: String,
) -> Result<(), eyre::Report> {
    start(
        world,
        &agent,
        &key,
        &AssignOptions::default().confirming_critical(true),
    )
}

#[when(r#""{agent}" overrides its workload limit and starts "{key}""#)]
fn overrides_and_starts(
    world: &mut WorkflowWorld,
    agent: String,
    key: String,
) -> Result<(), eyre::Report> {
    start(
        world,
        &agent,
        &key,
        &AssignOptions::default().overriding_workload(true),
    )
}

#[when(r#""{key}" is completed"#)]
fn is_completed(world: &mut WorkflowWorld, key: String) -> Result<(), eyre::Report> {
    let task_key = parse_key(&key)?;
    let engine = world.engine()?;
    let result = run_async(engine.manager().complete_task(&task_key));
    world.last_completion = Some(result);
    Ok(())
}
