//! In-memory integration tests for the assignment lifecycle.

use super::helpers::{Workspace, workspace};
use eyre::{Result, ensure, eyre};
use rstest::rstest;
use tasklane::config::WorkflowConfig;
use tasklane::task::{
    domain::{AssignmentId, AssignmentStatus, DenialReason, TaskDomainError, WorkflowEventType},
    services::{TransitionCommand, WorkflowError},
};

const REASON: &str = "Conflicts with higher priority work item";

async fn reject(workspace: &Workspace, assignment_id: AssignmentId) -> Result<()> {
    workspace
        .engine
        .execute(
            workspace.worker,
            TransitionCommand::RejectAssignment {
                assignment_id,
                reason: REASON.to_owned(),
            },
        )
        .await?;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn assigning_takes_the_task_out_of_the_pool(workspace: Workspace) -> Result<()> {
    let task = workspace.create_task("Calibrate scales").await?;
    ensure!(task.is_unassigned());

    workspace.assign_worker(task.id()).await?;

    ensure!(!workspace.stored(task.id()).await?.is_unassigned());
    let duplicate = workspace
        .engine
        .execute(
            workspace.creator,
            TransitionCommand::assign(task.id(), workspace.worker),
        )
        .await;
    ensure!(matches!(
        duplicate,
        Err(WorkflowError::InvalidTransition(
            TaskDomainError::AssignmentAlreadyLive { .. }
        ))
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn only_the_assignee_may_accept(workspace: Workspace) -> Result<()> {
    let task = workspace.create_task("Check fire doors").await?;
    let assignment_id = workspace.assign_worker(task.id()).await?;

    let denied = workspace
        .engine
        .execute(
            workspace.bystander,
            TransitionCommand::AcceptAssignment { assignment_id },
        )
        .await;
    ensure!(matches!(
        denied,
        Err(WorkflowError::PermissionDenied(DenialReason::NotAssignee))
    ));

    let accepted = workspace
        .engine
        .execute(
            workspace.worker,
            TransitionCommand::AcceptAssignment { assignment_id },
        )
        .await?;
    let assignment = accepted
        .assignment
        .ok_or_else(|| eyre!("accept returned no assignment"))?;
    ensure!(assignment.status() == AssignmentStatus::Accepted);
    ensure!(assignment.accepted_at().is_some());
    Ok(())
}

#[rstest]
#[case(true, true)]
#[case(false, false)]
#[tokio::test(flavor = "multi_thread")]
async fn confirmed_rejection_returns_the_task_to_the_pool(
    #[case] pool_on_last_rejection: bool,
    #[case] expect_pooled: bool,
) -> Result<()> {
    let workspace = Workspace::with_config(WorkflowConfig {
        pool_on_last_rejection,
        ..WorkflowConfig::default()
    });
    let task = workspace.create_task("Service conveyor").await?;
    let assignment_id = workspace.assign_worker(task.id()).await?;
    reject(&workspace, assignment_id).await?;

    let approved = workspace
        .engine
        .execute(
            workspace.creator,
            TransitionCommand::ApproveRejection { assignment_id },
        )
        .await?;

    let assignment = approved
        .assignment
        .ok_or_else(|| eyre!("review returned no assignment"))?;
    ensure!(assignment.status() == AssignmentStatus::Rejected);
    ensure!(workspace.stored(task.id()).await?.is_unassigned() == expect_pooled);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejection_event_carries_the_reason(workspace: Workspace) -> Result<()> {
    let task = workspace.create_task("Sort returns").await?;
    let assignment_id = workspace.assign_worker(task.id()).await?;

    reject(&workspace, assignment_id).await?;

    let events = workspace.notifier.events();
    let event = events
        .iter()
        .find(|event| event.event_type == WorkflowEventType::AssignmentRejected)
        .ok_or_else(|| eyre!("no rejection event"))?;
    ensure!(event.reason.as_deref() == Some(REASON));
    ensure!(event.previous_state == "active");
    ensure!(event.new_state == "rejected_pending_review");
    ensure!(event.recipients == vec![workspace.creator]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn overturned_rejection_hands_the_task_back(workspace: Workspace) -> Result<()> {
    let task = workspace.create_task("Rotate stock").await?;
    let assignment_id = workspace.assign_worker(task.id()).await?;
    reject(&workspace, assignment_id).await?;

    let denied = workspace
        .engine
        .execute(
            workspace.worker,
            TransitionCommand::RejectRejection { assignment_id },
        )
        .await;
    ensure!(matches!(
        denied,
        Err(WorkflowError::PermissionDenied(DenialReason::NotApprover))
    ));

    let overturned = workspace
        .engine
        .execute(
            workspace.creator,
            TransitionCommand::RejectRejection { assignment_id },
        )
        .await?;
    let assignment = overturned
        .assignment
        .ok_or_else(|| eyre!("review returned no assignment"))?;
    ensure!(assignment.status() == AssignmentStatus::Active);
    ensure!(assignment.rejection_reason().is_none());

    let late = workspace
        .engine
        .execute(
            workspace.admin,
            TransitionCommand::ApproveRejection { assignment_id },
        )
        .await?;
    ensure!(late.is_noop());
    ensure!(!workspace.stored(task.id()).await?.is_unassigned());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn archived_tasks_cannot_be_assigned(workspace: Workspace) -> Result<()> {
    let task = workspace.create_task("Inspect roof").await?;
    workspace
        .engine
        .execute(workspace.creator, TransitionCommand::Archive { task_id: task.id() })
        .await?;

    let result = workspace
        .engine
        .execute(
            workspace.creator,
            TransitionCommand::assign(task.id(), workspace.worker),
        )
        .await;

    ensure!(matches!(
        result,
        Err(WorkflowError::InvalidTransition(TaskDomainError::TaskArchived(_)))
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_assignment_is_reported(workspace: Workspace) -> Result<()> {
    let missing = AssignmentId::new();

    let result = workspace
        .engine
        .execute(
            workspace.worker,
            TransitionCommand::AcceptAssignment {
                assignment_id: missing,
            },
        )
        .await;

    ensure!(matches!(result, Err(WorkflowError::AssignmentNotFound(id)) if id == missing));
    Ok(())
}
