//! Then steps for task workflow BDD scenarios.

use super::world::{WorkflowWorld, run_async};
use eyre::{ensure, eyre};
use rstest_bdd_macros::then;
use tasklane::task::{
    domain::{ApprovalStatus, Assignment, Task},
    ports::WorkflowStore,
    services::WorkflowError,
};

fn stored_task(world: &WorkflowWorld) -> Result<Task, eyre::Report> {
    let task_id = world.task_id()?;
    run_async(world.store.find_task(task_id))?
        .ok_or_else(|| eyre!("task {task_id} missing from store"))
}

fn stored_assignment(world: &WorkflowWorld) -> Result<Assignment, eyre::Report> {
    let assignment_id = world.assignment_id()?;
    run_async(world.store.find_assignment(assignment_id))?
        .ok_or_else(|| eyre!("assignment {assignment_id} missing from store"))
}

#[then(r#"the task shows stage "{stage}" with approval "{approval}""#)]
fn task_shows_stage(
    world: &WorkflowWorld,
    stage: String,
    approval: String,
) -> Result<(), eyre::Report> {
    let task = stored_task(world)?;
    let actual_approval = task.approval_status().map_or("none", ApprovalStatus::as_str);
    ensure!(
        task.effective_stage().as_str() == stage,
        "expected stage {stage}, found {}",
        task.effective_stage()
    );
    ensure!(
        actual_approval == approval,
        "expected approval {approval}, found {actual_approval}"
    );
    Ok(())
}

#[then(r#"the worker was notified with reason "{reason}""#)]
fn worker_notified(world: &WorkflowWorld, reason: String) -> Result<(), eyre::Report> {
    let events = world.notifier.events();
    let event = events
        .last()
        .ok_or_else(|| eyre!("no events were dispatched"))?;
    ensure!(
        event.recipients.contains(&world.worker),
        "worker not among recipients {:?}",
        event.recipients
    );
    ensure!(event.reason.as_deref() == Some(reason.as_str()));
    Ok(())
}

#[then(r#"the assignment is "{status}""#)]
fn assignment_is(world: &WorkflowWorld, status: String) -> Result<(), eyre::Report> {
    let assignment = stored_assignment(world)?;
    ensure!(
        assignment.status().as_str() == status,
        "expected assignment {status}, found {}",
        assignment.status()
    );
    Ok(())
}

#[then("the assignment has no rejection reason")]
fn assignment_has_no_reason(world: &WorkflowWorld) -> Result<(), eyre::Report> {
    let assignment = stored_assignment(world)?;
    ensure!(assignment.rejection_reason().is_none());
    Ok(())
}

#[then("the command fails validation")]
fn command_fails_validation(world: &WorkflowWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_result
        .as_ref()
        .ok_or_else(|| eyre!("missing command result"))?;
    ensure!(
        matches!(result, Err(WorkflowError::ValidationFailed(_))),
        "expected a validation failure, got {result:?}"
    );
    Ok(())
}

#[then(r#"the board shows the task in "{stage}""#)]
fn board_shows_task(world: &WorkflowWorld, stage: String) -> Result<(), eyre::Report> {
    let task_id = world.task_id()?;
    let rows = world
        .engine
        .coordinator()
        .view(&world.board)
        .ok_or_else(|| eyre!("board view missing"))?;
    let row = rows
        .iter()
        .find(|row| row.task_id == task_id)
        .ok_or_else(|| eyre!("task missing from board"))?;
    ensure!(
        row.stage.as_str() == stage,
        "expected the board to show {stage}, found {}",
        row.stage
    );
    Ok(())
}
