//! Task creation, board moves, archival and deletion.

use super::{
    TransitionCommand, TransitionOutcome, WorkflowContext, WorkflowResult, context::store_failure,
};
use crate::task::{
    domain::{
        ActorId, AssignmentStatus, MoveDirection, NewTask, Stage, Task, TaskId, TaskStatus,
        TransitionKind, WorkflowEvent, WorkflowEventType, normalize_status, plan_advance,
        plan_move, plan_revert, status_change_event,
    },
    ports::{NotificationDispatcher, PermissionOracle, StoreResult, WorkflowStore},
};
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives tasks through the ordered stages and manages their existence.
pub struct TaskLifecycleService<S, O, N, C>
where
    S: WorkflowStore,
    O: PermissionOracle,
    N: NotificationDispatcher,
    C: Clock + Send + Sync,
{
    context: Arc<WorkflowContext<S, O, N, C>>,
}

impl<S, O, N, C> Clone for TaskLifecycleService<S, O, N, C>
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

impl<S, O, N, C> TaskLifecycleService<S, O, N, C>
where
    S: WorkflowStore,
    O: PermissionOracle,
    N: NotificationDispatcher,
    C: Clock + Send + Sync,
{
    /// Creates the service over shared collaborators.
    #[must_use]
    pub const fn new(context: Arc<WorkflowContext<S, O, N, C>>) -> Self {
        Self { context }
    }

    /// Creates a pending task in the unassigned pool.
    ///
    /// Submitting the same [`NewTask`] again returns the stored task without
    /// emitting a second event.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::ValidationFailed`] for a blank title,
    /// [`super::WorkflowError::PermissionDenied`] without the create grant,
    /// and [`super::WorkflowError::PersistenceFailure`] when the write fails.
    pub async fn create_task(
        &self,
        actor: ActorId,
        new_task: NewTask,
    ) -> WorkflowResult<TransitionOutcome> {
        let command = TransitionCommand::CreateTask(new_task.clone());
        let task = Task::create(new_task, self.context.clock())?;
        let store = self.context.store();
        let existing = store
            .find_task(task.id())
            .await
            .map_err(|err| store_failure(err, actor, &command))?;
        if let Some(stored) = existing {
            debug!(task_id = %stored.id(), "task already created");
            return Ok(TransitionOutcome::for_task(stored, None));
        }

        self.context.gate().check_create(actor).await?;
        let stored = store
            .create_task(&task)
            .await
            .map_err(|err| store_failure(err, actor, &command))?;
        let event = WorkflowEvent::builder(WorkflowEventType::TaskCreated, stored.id(), actor)
            .with_states("none", stored.effective_stage().as_str())
            .notify(stored.created_by())
            .build(self.context.clock());
        let emitted = self.context.emit(event).await;
        info!(task_id = %stored.id(), %actor, "task created");
        Ok(TransitionOutcome::for_task(stored, Some(emitted)))
    }

    /// Moves a task forward by one stage.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::InvalidTransition`] when the task is
    /// terminal, archived, awaiting approval or would need the approval gate,
    /// and the permission and persistence errors of any transition.
    pub async fn advance(
        &self,
        actor: ActorId,
        task_id: TaskId,
    ) -> WorkflowResult<TransitionOutcome> {
        let command = TransitionCommand::Advance { task_id };
        let task = self.context.require_task(task_id, actor, &command).await?;
        let target = plan_advance(&task)?;
        self.change_stage(actor, task, target, TransitionKind::Advance, &command)
            .await
    }

    /// Moves a task backward, to `target` or one stage back.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::InvalidTransition`] when the target is
    /// not strictly behind the current stage, is the approved stage, or an
    /// approval request is outstanding.
    pub async fn revert(
        &self,
        actor: ActorId,
        task_id: TaskId,
        target: Option<Stage>,
    ) -> WorkflowResult<TransitionOutcome> {
        let command = TransitionCommand::Revert { task_id, target };
        let task = self.context.require_task(task_id, actor, &command).await?;
        let resolved = plan_revert(&task, target)?;
        self.change_stage(actor, task, resolved, TransitionKind::Revert, &command)
            .await
    }

    /// Drops a task into the board column named by `column`.
    ///
    /// The token is normalised first; the move must be a single step forward
    /// or any step back.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::InvalidTransition`] for any other move.
    pub async fn move_to_column(
        &self,
        actor: ActorId,
        task_id: TaskId,
        column: &str,
    ) -> WorkflowResult<TransitionOutcome> {
        let command = TransitionCommand::MoveToColumn {
            task_id,
            column: column.to_owned(),
        };
        let target = normalize_status(column);
        let task = self.context.require_task(task_id, actor, &command).await?;
        let kind = match plan_move(&task, target)? {
            MoveDirection::Advance => TransitionKind::Advance,
            MoveDirection::Revert => TransitionKind::Revert,
        };
        self.change_stage(actor, task, target, kind, &command).await
    }

    /// Archives a task. Archiving an archived task changes nothing.
    ///
    /// # Errors
    ///
    /// Returns the permission and persistence errors of any transition.
    pub async fn archive(
        &self,
        actor: ActorId,
        task_id: TaskId,
    ) -> WorkflowResult<TransitionOutcome> {
        let command = TransitionCommand::Archive { task_id };
        self.set_archived(actor, task_id, true, &command).await
    }

    /// Restores an archived task.
    ///
    /// # Errors
    ///
    /// Returns the permission and persistence errors of any transition.
    pub async fn restore(
        &self,
        actor: ActorId,
        task_id: TaskId,
    ) -> WorkflowResult<TransitionOutcome> {
        let command = TransitionCommand::Restore { task_id };
        self.set_archived(actor, task_id, false, &command).await
    }

    /// Deletes a task and its assignments, removing it from every local view.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::PermissionDenied`] unless the actor is
    /// an administrator or the creator.
    pub async fn delete(
        &self,
        actor: ActorId,
        task_id: TaskId,
    ) -> WorkflowResult<TransitionOutcome> {
        let command = TransitionCommand::Delete { task_id };
        let task = self.context.require_task(task_id, actor, &command).await?;
        self.context
            .gate()
            .check(actor, &task, None, TransitionKind::Delete)
            .await?;
        let assignees: Vec<ActorId> = self
            .context
            .assignments_of(task_id, actor, &command)
            .await?
            .iter()
            .filter(|assignment| assignment.status().is_live())
            .map(|assignment| assignment.assignee())
            .collect();

        self.context
            .store()
            .delete_task(task_id)
            .await
            .map_err(|err| store_failure(err, actor, &command))?;
        self.context.coordinator().forget(task_id);

        let event = WorkflowEvent::builder(WorkflowEventType::TaskDeleted, task_id, actor)
            .with_states(task.effective_stage().as_str(), "deleted")
            .notify(task.created_by())
            .notify_all(assignees)
            .build(self.context.clock());
        let emitted = self.context.emit(event).await;
        info!(%task_id, %actor, "task deleted");
        Ok(TransitionOutcome::for_task(task, Some(emitted)))
    }

    /// Finds a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns the store's error when the lookup fails.
    pub async fn find(&self, task_id: TaskId) -> StoreResult<Option<Task>> {
        self.context.store().find_task(task_id).await
    }

    async fn change_stage(
        &self,
        actor: ActorId,
        task: Task,
        target: Stage,
        kind: TransitionKind,
        command: &TransitionCommand,
    ) -> WorkflowResult<TransitionOutcome> {
        let task_id = task.id();
        self.context.gate().check(actor, &task, None, kind).await?;

        let pending = self.context.coordinator().begin_from(&task, target);
        let result = self
            .context
            .store()
            .update_status(task_id, TaskStatus::from(target))
            .await;
        let updated = self.context.settle(&pending, result, actor, command)?;
        if target == Stage::Completed {
            self.stamp_completion(task_id).await;
        }

        let event_type = match kind {
            TransitionKind::Revert => WorkflowEventType::StatusReverted,
            _ => WorkflowEventType::StatusAdvanced,
        };
        let event = status_change_event(event_type, actor, &task, &updated)
            .build(self.context.clock());
        let emitted = self.context.emit(event).await;
        info!(
            %task_id,
            %actor,
            from = %task.effective_stage(),
            to = %updated.effective_stage(),
            "task stage changed"
        );
        Ok(TransitionOutcome::for_task(updated, Some(emitted)))
    }

    async fn set_archived(
        &self,
        actor: ActorId,
        task_id: TaskId,
        archived: bool,
        command: &TransitionCommand,
    ) -> WorkflowResult<TransitionOutcome> {
        let task = self.context.require_task(task_id, actor, command).await?;
        self.context
            .gate()
            .check(actor, &task, None, TransitionKind::Archive)
            .await?;
        if task.is_archived() == archived {
            return Ok(TransitionOutcome::for_task(task, None));
        }

        let updated = self
            .context
            .store()
            .set_archived(task_id, archived)
            .await
            .map_err(|err| store_failure(err, actor, command))?;
        let (event_type, previous, next) = if archived {
            (WorkflowEventType::TaskArchived, "active", "archived")
        } else {
            (WorkflowEventType::TaskRestored, "archived", "active")
        };
        let event = WorkflowEvent::builder(event_type, task_id, actor)
            .with_states(previous, next)
            .notify(updated.created_by())
            .build(self.context.clock());
        let emitted = self.context.emit(event).await;
        info!(%task_id, %actor, archived, "task archival changed");
        Ok(TransitionOutcome::for_task(updated, Some(emitted)))
    }

    /// Stamps `completed_at` on accepted assignments once their task is
    /// completed. Failures are logged; the status change stands.
    async fn stamp_completion(&self, task_id: TaskId) {
        let store = self.context.store();
        let assignments = match store.assignments_for_task(task_id).await {
            Ok(assignments) => assignments,
            Err(err) => {
                warn!(%task_id, error = %err, "could not load assignments to stamp completion");
                return;
            }
        };
        for mut assignment in assignments
            .into_iter()
            .filter(|assignment| assignment.status() == AssignmentStatus::Accepted)
        {
            if !assignment.mark_completed(self.context.clock()) {
                continue;
            }
            let Some(completed_at) = assignment.completed_at() else {
                continue;
            };
            if let Err(err) = store
                .mark_assignment_completed(assignment.id(), completed_at)
                .await
            {
                warn!(
                    %task_id,
                    assignment_id = %assignment.id(),
                    error = %err,
                    "could not stamp assignment completion"
                );
            }
        }
    }
}
