//! Given steps for task workflow BDD scenarios.

use super::world::{WorkflowWorld, run_async};
use eyre::{WrapErr, eyre};
use rstest_bdd_macros::given;
use tasklane::task::{
    domain::NewTask,
    ports::{FeedFilter, WorkflowStore},
    services::TransitionCommand,
};

#[given(r#"a task "{title}" created by the requester"#)]
fn task_created(world: &mut WorkflowWorld, title: String) -> Result<(), eyre::Report> {
    let command = TransitionCommand::CreateTask(NewTask::new(title, world.requester));
    let outcome = run_async(world.engine.execute(world.requester, command))
        .wrap_err("create task for workflow scenario")?;
    world.task_id = Some(outcome.task.id());
    Ok(())
}

#[given("the task is assigned to the worker")]
fn task_assigned(world: &mut WorkflowWorld) -> Result<(), eyre::Report> {
    let command = TransitionCommand::assign(world.task_id()?, world.worker);
    let outcome = run_async(world.engine.execute(world.requester, command))
        .wrap_err("assign task to worker")?;
    let assignment = outcome
        .assignment
        .ok_or_else(|| eyre!("assignment missing from outcome"))?;
    world.assignment_id = Some(assignment.id());
    Ok(())
}

#[given("the worker has accepted the assignment")]
fn assignment_accepted(world: &mut WorkflowWorld) -> Result<(), eyre::Report> {
    let command = TransitionCommand::AcceptAssignment {
        assignment_id: world.assignment_id()?,
    };
    run_async(world.engine.execute(world.worker, command)).wrap_err("accept assignment")?;
    Ok(())
}

#[given("the worker has advanced the task to completed")]
fn task_advanced_to_completed(world: &mut WorkflowWorld) -> Result<(), eyre::Report> {
    let task_id = world.task_id()?;
    for _ in 0..2 {
        run_async(
            world
                .engine
                .execute(world.worker, TransitionCommand::Advance { task_id }),
        )
        .wrap_err("advance task")?;
    }
    Ok(())
}

#[given("the task is shown on the board")]
fn task_shown_on_board(world: &mut WorkflowWorld) -> Result<(), eyre::Report> {
    let task_id = world.task_id()?;
    let task = run_async(world.store.find_task(task_id))?
        .ok_or_else(|| eyre!("task {task_id} missing from store"))?;
    world
        .engine
        .coordinator()
        .register_view(world.board.clone(), std::slice::from_ref(&task));
    Ok(())
}

#[given("the board follows the task feed")]
fn board_follows_feed(world: &mut WorkflowWorld) -> Result<(), eyre::Report> {
    let feed = run_async(
        world
            .engine
            .connect_feed(world.store.feed(), FeedFilter::all()),
    )
    .wrap_err("connect reconciliation feed")?;
    world.feed = Some(feed);
    Ok(())
}
