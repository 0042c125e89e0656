//! Given steps for workflow scenario BDD tests.

use super::world::{WorkflowWorld, parse_key, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use switchyard::{
    task::domain::{CapabilitySet, Priority, Task, TaskKey, TaskStatus},
    workflow::services::AssignOptions,
};

fn ready_task(key: TaskKey, priority: &str) -> Result<Task, eyre::Report> {
    let title = format!("Task {}", key.task_id());
    Ok(Task::new(key, title)?
        .with_status(TaskStatus::Ready)
        .with_priority(Priority::try_from(priority)?))
}

#[given(r#"a ready task "{key}" at priority "{priority}""#)]
fn ready_task_at(
    world: &mut WorkflowWorld,
    key: String,
    priority: String,
) -> Result<(), eyre::Report> {
    let task = ready_task(parse_key(&key)?, &priority)?;
    world.declare(task)
}

#[given(r#"a "{tags}" task "{key}" at priority "{priority}""#)]
fn capability_task_at(
    world: &mut WorkflowWorld,
    tags: String,
    key: String,
    priority: String,
) -> Result<(), eyre::Report> {
    let required = CapabilitySet::from_tags(tags.split(','))?;
    let task = ready_task(parse_key(&key)?, &priority)?.with_required_capabilities(required);
    world.declare(task)
}

#[given(r#"a task "{key}" blocked on "{dependency}""#)]
fn blocked_task(
    world: &mut WorkflowWorld,
    key: String,
    dependency: String,
) -> Result<(), eyre::Report> {
    let task_key = parse_key(&key)?;
    let title = format!("Task {}", task_key.task_id());
    let task = Task::new(task_key, title)?
        .with_status(TaskStatus::Blocked)
        .with_priority(Priority::P2)
        .with_dependency(parse_key(&dependency)?);
    world.declare(task)
}

#[given(r#""{agent}" already has {count:usize} tasks in progress"#)]
fn agent_already_busy(
    world: &mut WorkflowWorld,
    agent: String,
    count: usize,
) -> Result<(), eyre::Report> {
    let fillers = (1..=count)
        .map(|n| parse_key(&format!("W:F{n}")))
        .collect::<Result<Vec<_>, _>>()?;
    for filler in &fillers {
        world.declare(ready_task(filler.clone(), "P2")?)?;
    }
    let engine = world.engine()?;
    for filler in &fillers {
        run_async(engine.manager().assign_task(filler, &agent, &AssignOptions::default()))
            .wrap_err_with(|| format!("assign filler {filler}"))?;
    }
    Ok(())
}

#[given(r#""{agent}" has started "{key}""#)]
fn agent_has_started(
    world: &mut WorkflowWorld,
    agent: String,
    key: String,
) -> Result<(), eyre::Report> {
    let task_key = parse_key(&key)?;
    let engine = world.engine()?;
    run_async(
        engine
            .manager()
            .assign_task(&task_key, &agent, &AssignOptions::default()),
    )
    .wrap_err("assign task in scenario setup")?;
    Ok(())
}

#[given("the next human view write will fail")]
fn human_write_fails(world: &mut WorkflowWorld) -> Result<(), eyre::Report> {
    world.engine()?;
    world.backends()?.human.fail_next_store();
    Ok(())
}
