//! In-memory integration tests for two reviewers acting on the same task
//! at once.
//!
//! The racing engine runs a competing command from inside its first
//! permission lookup, after it has read the task but before it writes.

use super::helpers::{TestEngine, Workspace, workspace};
use crate::test_helpers::ManualClock;
use async_trait::async_trait;
use eyre::{Result, bail, ensure, eyre};
use rstest::rstest;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use tasklane::config::WorkflowConfig;
use tasklane::task::{
    adapters::memory::{InMemoryPermissionOracle, InMemoryWorkflowStore, RecordingDispatcher},
    domain::{
        Action, ActorId, ApprovalNote, ApprovalOutcome, ApprovalStatus, AssignmentId,
        AssignmentOutcome, AssignmentStatus, Resource, Stage, TaskDomainError, TaskId, TaskStatus,
        WorkflowEventType,
    },
    ports::{PermissionOracle, PermissionResult, StoreError, WorkflowStore},
    services::{TransitionCommand, WorkflowEngine, WorkflowError},
};

type Interruption = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Oracle that runs one queued interruption before answering its first
/// grant lookup.
struct InterruptingOracle {
    inner: Arc<InMemoryPermissionOracle>,
    interruption: Mutex<Option<Interruption>>,
}

#[async_trait]
impl PermissionOracle for InterruptingOracle {
    async fn has_grant(
        &self,
        actor: ActorId,
        resource: Resource,
        action: Action,
    ) -> PermissionResult<bool> {
        let queued = self
            .interruption
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(interruption) = queued {
            interruption.await;
        }
        self.inner.has_grant(actor, resource, action).await
    }

    async fn is_accepted_assignee(
        &self,
        actor: ActorId,
        task_id: TaskId,
    ) -> PermissionResult<bool> {
        self.inner.is_accepted_assignee(actor, task_id).await
    }
}

type RacingEngine =
    WorkflowEngine<InMemoryWorkflowStore, InterruptingOracle, RecordingDispatcher, ManualClock>;

fn engine_over(workspace: &Workspace) -> TestEngine {
    WorkflowEngine::new(
        Arc::clone(&workspace.store),
        Arc::clone(&workspace.oracle),
        Arc::clone(&workspace.notifier),
        Arc::clone(&workspace.clock),
        WorkflowConfig::default(),
    )
}

/// Builds an engine over the workspace's adapters that lets `rival` run
/// `command` in the middle of its next transition.
fn racing_engine(
    workspace: &Workspace,
    rival: ActorId,
    command: TransitionCommand,
) -> RacingEngine {
    let competitor = engine_over(workspace);
    let interruption: Interruption = Box::pin(async move {
        if let Err(err) = competitor.execute(rival, command).await {
            panic!("competing command failed: {err}");
        }
    });
    let oracle = InterruptingOracle {
        inner: Arc::clone(&workspace.oracle),
        interruption: Mutex::new(Some(interruption)),
    };
    WorkflowEngine::new(
        Arc::clone(&workspace.store),
        Arc::new(oracle),
        Arc::clone(&workspace.notifier),
        Arc::clone(&workspace.clock),
        WorkflowConfig::default(),
    )
}

async fn awaiting_approval(workspace: &Workspace, title: &str) -> Result<TaskId> {
    let (task, _) = workspace.completed_task(title).await?;
    workspace
        .engine
        .execute(
            workspace.worker,
            TransitionCommand::RequestApproval { task_id: task.id() },
        )
        .await?;
    Ok(task.id())
}

async fn rejected_assignment(workspace: &Workspace, title: &str) -> Result<(TaskId, AssignmentId)> {
    let task = workspace.create_task(title).await?;
    let assignment_id = workspace.assign_worker(task.id()).await?;
    workspace
        .engine
        .execute(
            workspace.worker,
            TransitionCommand::RejectAssignment {
                assignment_id,
                reason: "Conflicts with higher priority work item".to_owned(),
            },
        )
        .await?;
    Ok((task.id(), assignment_id))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn approval_after_a_concurrent_send_back_is_refused(workspace: Workspace) -> Result<()> {
    let task_id = awaiting_approval(&workspace, "Regrout showers").await?;
    let racing = racing_engine(
        &workspace,
        workspace.admin,
        TransitionCommand::RejectCompletion {
            task_id,
            note: "needs rework".to_owned(),
        },
    );

    let approval = racing
        .execute(workspace.creator, TransitionCommand::ApproveCompletion { task_id })
        .await;

    ensure!(matches!(
        approval,
        Err(WorkflowError::InvalidTransition(
            TaskDomainError::InvalidApprovalTransition {
                stage: Stage::InProgress,
                ..
            }
        ))
    ));
    let stored = workspace.stored(task_id).await?;
    ensure!(stored.status() == TaskStatus::InProgress);
    ensure!(stored.approval_status().is_none());
    ensure!(stored.review_note().map(ApprovalNote::as_str) == Some("needs rework"));
    ensure!(
        !workspace
            .notifier
            .event_types_for(task_id)
            .contains(&WorkflowEventType::ApprovalGranted)
    );
    ensure!(racing.coordinator().marker(task_id).is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn confirming_a_rejection_overturned_meanwhile_is_a_no_op(
    workspace: Workspace,
) -> Result<()> {
    let (task_id, assignment_id) = rejected_assignment(&workspace, "Patch roof").await?;
    let racing = racing_engine(
        &workspace,
        workspace.admin,
        TransitionCommand::RejectRejection { assignment_id },
    );

    let outcome = racing
        .execute(
            workspace.creator,
            TransitionCommand::ApproveRejection { assignment_id },
        )
        .await?;

    ensure!(outcome.event.is_none());
    let assignment = outcome
        .assignment
        .ok_or_else(|| eyre!("review returned no assignment"))?;
    ensure!(assignment.status() == AssignmentStatus::Active);
    ensure!(assignment.rejection_reason().is_none());
    ensure!(!workspace.stored(task_id).await?.is_unassigned());
    let events = workspace.notifier.event_types_for(task_id);
    ensure!(events.contains(&WorkflowEventType::RejectionOverturned));
    ensure!(!events.contains(&WorkflowEventType::RejectionApproved));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn retried_approval_after_a_send_back_is_refused(workspace: Workspace) -> Result<()> {
    let task_id = awaiting_approval(&workspace, "Replace gutters").await?;
    workspace.store.fail_next_writes(1);

    let failure = workspace
        .engine
        .execute(workspace.creator, TransitionCommand::ApproveCompletion { task_id })
        .await;
    let Err(error) = failure else {
        bail!("write should have failed");
    };
    let handle = error
        .retry_handle()
        .cloned()
        .ok_or_else(|| eyre!("persistence failure without retry handle"))?;
    ensure!(workspace.engine.coordinator().displayed_stage(task_id) == Some(Stage::Completed));

    workspace
        .engine
        .execute(
            workspace.admin,
            TransitionCommand::RejectCompletion {
                task_id,
                note: "needs rework".to_owned(),
            },
        )
        .await?;
    let retried = workspace.engine.retry(handle).await;

    ensure!(matches!(retried, Err(WorkflowError::InvalidTransition(_))));
    ensure!(workspace.stage_of(task_id).await? == Stage::InProgress);
    ensure!(workspace.engine.coordinator().displayed_stage(task_id) == Some(Stage::InProgress));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn store_refuses_approval_once_sent_back(workspace: Workspace) -> Result<()> {
    let task_id = awaiting_approval(&workspace, "Lag pipes").await?;
    let note = ApprovalNote::new("needs rework")?;
    workspace
        .store
        .resolve_approval(task_id, workspace.admin, ApprovalOutcome::Rejected, Some(&note))
        .await?;
    let before = workspace.stored(task_id).await?;

    let approval = workspace
        .store
        .resolve_approval(task_id, workspace.creator, ApprovalOutcome::Approved, None)
        .await;

    ensure!(matches!(approval, Err(StoreError::Conflict(_))));
    ensure!(workspace.stored(task_id).await? == before);
    ensure!(before.approval_status().is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn store_replays_a_recorded_decision(workspace: Workspace) -> Result<()> {
    let task_id = awaiting_approval(&workspace, "Sweep chimney").await?;
    let approved = workspace
        .store
        .resolve_approval(task_id, workspace.creator, ApprovalOutcome::Approved, None)
        .await?;

    let replay = workspace
        .store
        .resolve_approval(task_id, workspace.creator, ApprovalOutcome::Approved, None)
        .await?;

    ensure!(replay == approved);
    ensure!(replay.approval_status() == Some(ApprovalStatus::Approved));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn store_refuses_to_confirm_an_overturned_rejection(workspace: Workspace) -> Result<()> {
    let (_, assignment_id) = rejected_assignment(&workspace, "Clear drains").await?;
    workspace
        .store
        .record_assignment_resolution(assignment_id, AssignmentOutcome::RejectionOverturned, None)
        .await?;

    let confirmed = workspace
        .store
        .record_assignment_resolution(assignment_id, AssignmentOutcome::RejectionApproved, None)
        .await;

    ensure!(matches!(
        confirmed,
        Err(StoreError::Conflict(
            TaskDomainError::InvalidAssignmentTransition {
                from: AssignmentStatus::Active,
                ..
            }
        ))
    ));
    let stored = workspace
        .store
        .find_assignment(assignment_id)
        .await?
        .ok_or_else(|| eyre!("assignment missing"))?;
    ensure!(stored.status() == AssignmentStatus::Active);
    Ok(())
}
