//! In-memory integration tests for stage moves, archival and deletion.

use super::helpers::{Workspace, workspace};
use eyre::{Result, bail, ensure, eyre};
use rstest::rstest;
use tasklane::sync::domain::ViewKey;
use tasklane::task::{
    domain::{Action, DenialReason, Resource, Stage, TaskDomainError, WorkflowEventType},
    services::{TransitionCommand, WorkflowError},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn task_travels_from_pending_to_approved(workspace: Workspace) -> Result<()> {
    let (task, assignment_id) = workspace.completed_task("Refit loading bay").await?;
    ensure!(task.effective_stage() == Stage::Completed);

    workspace
        .engine
        .execute(
            workspace.worker,
            TransitionCommand::RequestApproval { task_id: task.id() },
        )
        .await?;
    let approved = workspace
        .engine
        .execute(
            workspace.creator,
            TransitionCommand::ApproveCompletion { task_id: task.id() },
        )
        .await?;

    ensure!(approved.task.effective_stage() == Stage::Approved);
    let assignments = workspace
        .engine
        .assignments()
        .assignments_for(task.id())
        .await?;
    let assignment = assignments
        .iter()
        .find(|held| held.id() == assignment_id)
        .ok_or_else(|| eyre!("assignment missing"))?;
    ensure!(assignment.completed_at().is_some(), "completion not stamped");
    ensure!(
        workspace.notifier.event_types_for(task.id())
            == vec![
                WorkflowEventType::TaskCreated,
                WorkflowEventType::AssignmentCreated,
                WorkflowEventType::AssignmentAccepted,
                WorkflowEventType::StatusAdvanced,
                WorkflowEventType::StatusAdvanced,
                WorkflowEventType::ApprovalRequested,
                WorkflowEventType::ApprovalGranted,
            ]
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn completed_work_cannot_skip_the_approval_gate(workspace: Workspace) -> Result<()> {
    let (task, _) = workspace.completed_task("Inventory audit").await?;

    let result = workspace
        .engine
        .execute(workspace.admin, TransitionCommand::Advance { task_id: task.id() })
        .await;

    ensure!(matches!(
        result,
        Err(WorkflowError::InvalidTransition(TaskDomainError::ApprovalRequired(_)))
    ));
    ensure!(workspace.stage_of(task.id()).await? == Stage::Completed);
    Ok(())
}

#[rstest]
#[case("col_in_progress", Some(Stage::InProgress))]
#[case("board:7:In Progress", Some(Stage::InProgress))]
#[case("column-completed", None)]
#[case("pending", None)]
#[case("no-such-column", None)]
#[tokio::test(flavor = "multi_thread")]
async fn column_drops_follow_the_workflow(
    workspace: Workspace,
    #[case] column: &str,
    #[case] expected: Option<Stage>,
) -> Result<()> {
    let task = workspace.create_task("Relabel bins").await?;

    let result = workspace
        .engine
        .execute(
            workspace.creator,
            TransitionCommand::MoveToColumn {
                task_id: task.id(),
                column: column.to_owned(),
            },
        )
        .await;

    match (result, expected) {
        (Ok(outcome), Some(stage)) => ensure!(outcome.task.effective_stage() == stage),
        (Err(WorkflowError::InvalidTransition(_)), None) => {
            ensure!(workspace.stage_of(task.id()).await? == Stage::Pending);
        }
        (other, _) => bail!("unexpected result for {column}: {other:?}"),
    }
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn only_administrators_move_tasks_backwards(workspace: Workspace) -> Result<()> {
    let (task, _) = workspace.completed_task("Replace dock seals").await?;

    let denied = workspace
        .engine
        .execute(
            workspace.creator,
            TransitionCommand::Revert {
                task_id: task.id(),
                target: None,
            },
        )
        .await;
    ensure!(matches!(
        denied,
        Err(WorkflowError::PermissionDenied(DenialReason::AdministratorRequired))
    ));

    let reverted = workspace
        .engine
        .execute(
            workspace.admin,
            TransitionCommand::Revert {
                task_id: task.id(),
                target: Some(Stage::Pending),
            },
        )
        .await?;
    ensure!(reverted.task.effective_stage() == Stage::Pending);
    let event = reverted.event.ok_or_else(|| eyre!("no event emitted"))?;
    ensure!(event.event_type == WorkflowEventType::StatusReverted);
    ensure!(event.previous_state == "completed" && event.new_state == "pending");
    ensure!(event.recipients.contains(&workspace.creator));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_write_rolls_back_and_can_be_retried(workspace: Workspace) -> Result<()> {
    let task = workspace.create_task("Fix racking").await?;
    let board = ViewKey::new("board");
    workspace
        .engine
        .coordinator()
        .register_view(board.clone(), std::slice::from_ref(&task));
    workspace.store.fail_next_writes(1);

    let failure = workspace
        .engine
        .execute(workspace.creator, TransitionCommand::Advance { task_id: task.id() })
        .await;

    let Err(error) = failure else {
        bail!("write should have failed");
    };
    ensure!(error.is_retryable());
    ensure!(workspace.engine.coordinator().displayed_stage(task.id()) == Some(Stage::Pending));
    let rows = workspace
        .engine
        .coordinator()
        .view(&board)
        .ok_or_else(|| eyre!("board view missing"))?;
    ensure!(rows.iter().all(|row| row.stage == Stage::Pending));
    ensure!(workspace.stage_of(task.id()).await? == Stage::Pending);
    ensure!(
        !workspace
            .notifier
            .event_types_for(task.id())
            .contains(&WorkflowEventType::StatusAdvanced)
    );

    let handle = error
        .retry_handle()
        .cloned()
        .ok_or_else(|| eyre!("persistence failure without retry handle"))?;
    let retried = workspace.engine.retry(handle).await?;
    ensure!(retried.task.effective_stage() == Stage::InProgress);
    ensure!(workspace.engine.coordinator().displayed_stage(task.id()) == Some(Stage::InProgress));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn archived_tasks_are_frozen_until_restored(workspace: Workspace) -> Result<()> {
    let task = workspace.create_task("Paint walkway").await?;
    let archive = TransitionCommand::Archive { task_id: task.id() };

    let denied = workspace
        .engine
        .execute(workspace.bystander, archive.clone())
        .await;
    ensure!(matches!(
        denied,
        Err(WorkflowError::PermissionDenied(DenialReason::NotAuthorizedToArchive))
    ));

    workspace.engine.execute(workspace.creator, archive.clone()).await?;
    let repeated = workspace.engine.execute(workspace.creator, archive).await?;
    ensure!(repeated.is_noop());

    let frozen = workspace
        .engine
        .execute(workspace.creator, TransitionCommand::Advance { task_id: task.id() })
        .await;
    ensure!(matches!(
        frozen,
        Err(WorkflowError::InvalidTransition(TaskDomainError::TaskArchived(_)))
    ));

    workspace
        .oracle
        .grant(workspace.bystander, Resource::Tasks, Action::Update)?;
    workspace
        .engine
        .execute(workspace.bystander, TransitionCommand::Restore { task_id: task.id() })
        .await?;
    let advanced = workspace
        .engine
        .execute(workspace.bystander, TransitionCommand::Advance { task_id: task.id() })
        .await?;
    ensure!(advanced.task.effective_stage() == Stage::InProgress);
    ensure!(
        workspace.notifier.event_types_for(task.id())
            == vec![
                WorkflowEventType::TaskCreated,
                WorkflowEventType::TaskArchived,
                WorkflowEventType::TaskRestored,
                WorkflowEventType::StatusAdvanced,
            ]
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_removes_the_task_everywhere(workspace: Workspace) -> Result<()> {
    let task = workspace.create_task("Retire forklift").await?;
    workspace.assign_and_accept(task.id()).await?;
    let board = ViewKey::new("board");
    workspace
        .engine
        .coordinator()
        .register_view(board.clone(), std::slice::from_ref(&task));
    let delete = TransitionCommand::Delete { task_id: task.id() };

    let denied = workspace.engine.execute(workspace.worker, delete.clone()).await;
    ensure!(matches!(
        denied,
        Err(WorkflowError::PermissionDenied(DenialReason::NotAuthorizedToDelete))
    ));

    let deleted = workspace.engine.execute(workspace.creator, delete.clone()).await?;
    let event = deleted.event.ok_or_else(|| eyre!("no event emitted"))?;
    ensure!(event.event_type == WorkflowEventType::TaskDeleted);
    ensure!(event.recipients == vec![workspace.worker]);
    ensure!(workspace.engine.tasks().find(task.id()).await?.is_none());
    ensure!(
        workspace
            .engine
            .coordinator()
            .view(&board)
            .is_some_and(|rows| rows.is_empty())
    );

    let again = workspace.engine.execute(workspace.creator, delete).await;
    ensure!(matches!(again, Err(WorkflowError::TaskNotFound(id)) if id == task.id()));
    Ok(())
}
