//! Completion approval gate.

use super::{
    TransitionCommand, TransitionOutcome, WorkflowContext, WorkflowResult, context::store_failure,
};
use crate::task::{
    domain::{
        ActorId, ApprovalNote, ApprovalOutcome, ApprovalStatus, Assignment, AssignmentStatus,
        Stage, Task, TaskId, TransitionKind, WorkflowEvent, WorkflowEventType,
        status_change_event,
    },
    ports::{NotificationDispatcher, PermissionOracle, WorkflowStore},
};
use mockable::Clock;
use std::sync::Arc;
use tracing::{info, warn};

/// Guards the move from completed to approved.
///
/// ```text
/// completed --request_approval--> completed (approval pending)
/// completed (pending) --approve--> approved
/// completed (pending) --reject_approval(note)--> in_progress
/// ```
pub struct ApprovalGate<S, O, N, C>
where
    S: WorkflowStore,
    O: PermissionOracle,
    N: NotificationDispatcher,
    C: Clock + Send + Sync,
{
    context: Arc<WorkflowContext<S, O, N, C>>,
}

impl<S, O, N, C> Clone for ApprovalGate<S, O, N, C>
where
    S: WorkflowStore,
    O: PermissionOracle,
    N: NotificationDispatcher,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
        }
    }
}

impl<S, O, N, C> ApprovalGate<S, O, N, C>
where
    S: WorkflowStore,
    O: PermissionOracle,
    N: NotificationDispatcher,
    C: Clock + Send + Sync,
{
    /// Creates the gate over shared collaborators.
    #[must_use]
    pub const fn new(context: Arc<WorkflowContext<S, O, N, C>>) -> Self {
        Self { context }
    }

    /// Submits completed work for review.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::InvalidTransition`] unless the task is
    /// completed with no approval pending or granted, and
    /// [`super::WorkflowError::PermissionDenied`] unless the actor holds an
    /// accepted assignment on it.
    pub async fn request_approval(
        &self,
        actor: ActorId,
        task_id: TaskId,
    ) -> WorkflowResult<TransitionOutcome> {
        let command = TransitionCommand::RequestApproval { task_id };
        let task = self.context.require_task(task_id, actor, &command).await?;
        task.clone().request_approval(self.context.clock())?;
        let assignments = self.context.assignments_of(task_id, actor, &command).await?;
        let held = assignments.iter().find(|assignment| {
            assignment.assignee() == actor && assignment.status() == AssignmentStatus::Accepted
        });
        self.context
            .gate()
            .check(actor, &task, held, TransitionKind::RequestApproval)
            .await?;

        let updated = self
            .context
            .store()
            .request_approval(task_id, actor)
            .await
            .map_err(|err| store_failure(err, actor, &command))?;
        let event = WorkflowEvent::builder(WorkflowEventType::ApprovalRequested, task_id, actor)
            .with_states(approval_state(&task), approval_state(&updated))
            .notify(updated.created_by())
            .build(self.context.clock());
        let emitted = self.context.emit(event).await;
        info!(%task_id, %actor, "approval requested");
        Ok(TransitionOutcome::for_task(updated, Some(emitted)))
    }

    /// Approves pending work, making the task terminal.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::InvalidTransition`] unless approval is
    /// pending, and [`super::WorkflowError::PermissionDenied`] unless the
    /// actor is an administrator or the task creator.
    pub async fn approve(
        &self,
        actor: ActorId,
        task_id: TaskId,
    ) -> WorkflowResult<TransitionOutcome> {
        let command = TransitionCommand::ApproveCompletion { task_id };
        let task = self.context.require_task(task_id, actor, &command).await?;
        task.clone().approve(self.context.clock())?;
        self.context
            .gate()
            .check(actor, &task, None, TransitionKind::Approve)
            .await?;

        let updated = self
            .resolve(actor, &task, ApprovalOutcome::Approved, None, &command)
            .await?;
        let assignees = self.accepted_assignees(task_id).await;
        let event = status_change_event(WorkflowEventType::ApprovalGranted, actor, &task, &updated)
            .notify_all(assignees)
            .build(self.context.clock());
        let emitted = self.context.emit(event).await;
        info!(%task_id, %actor, "completion approved");
        Ok(TransitionOutcome::for_task(updated, Some(emitted)))
    }

    /// Sends pending work back to in-progress with a reviewer note, which
    /// is stored on the task and carried to the assignees.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::ValidationFailed`] for a blank note,
    /// before any store call.
    pub async fn reject_approval(
        &self,
        actor: ActorId,
        task_id: TaskId,
        note: &str,
    ) -> WorkflowResult<TransitionOutcome> {
        let validated = ApprovalNote::new(note)?;
        let command = TransitionCommand::RejectCompletion {
            task_id,
            note: note.to_owned(),
        };
        let task = self.context.require_task(task_id, actor, &command).await?;
        task.clone()
            .reject_approval(validated.clone(), self.context.clock())?;
        self.context
            .gate()
            .check(actor, &task, None, TransitionKind::RejectApproval)
            .await?;

        let updated = self
            .resolve(
                actor,
                &task,
                ApprovalOutcome::Rejected,
                Some(&validated),
                &command,
            )
            .await?;
        let assignees = self.accepted_assignees(task_id).await;
        let event = status_change_event(WorkflowEventType::ApprovalRejected, actor, &task, &updated)
            .with_reason(validated.as_str())
            .notify_all(assignees)
            .build(self.context.clock());
        let emitted = self.context.emit(event).await;
        info!(%task_id, %actor, "completion sent back");
        Ok(TransitionOutcome::for_task(updated, Some(emitted)))
    }

    async fn resolve(
        &self,
        actor: ActorId,
        task: &Task,
        outcome: ApprovalOutcome,
        note: Option<&ApprovalNote>,
        command: &TransitionCommand,
    ) -> WorkflowResult<Task> {
        let speculative = match outcome {
            ApprovalOutcome::Approved => Stage::Approved,
            ApprovalOutcome::Rejected => Stage::InProgress,
        };
        let pending = self.context.coordinator().begin_from(task, speculative);
        let result = self
            .context
            .store()
            .resolve_approval(task.id(), actor, outcome, note)
            .await;
        self.context.settle(&pending, result, actor, command)
    }

    /// Accepted assignees to notify. A failed lookup only narrows the
    /// recipients; the decision is already committed.
    async fn accepted_assignees(&self, task_id: TaskId) -> Vec<ActorId> {
        match self.context.store().assignments_for_task(task_id).await {
            Ok(assignments) => assignments
                .iter()
                .filter(|assignment| assignment.status() == AssignmentStatus::Accepted)
                .map(Assignment::assignee)
                .collect(),
            Err(err) => {
                warn!(%task_id, error = %err, "could not load assignees to notify");
                Vec::new()
            }
        }
    }
}

fn approval_state(task: &Task) -> &'static str {
    task.approval_status().map_or("none", ApprovalStatus::as_str)
}
