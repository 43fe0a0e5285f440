//! Assignment lifecycle: assign, accept, reject and rejection review.

use super::{
    TransitionCommand, TransitionOutcome, WorkflowContext, WorkflowResult, context::store_failure,
};
use crate::task::{
    domain::{
        ActorId, Assignment, AssignmentId, AssignmentOutcome, RejectionReason, ReviewResolution,
        Task, TaskDomainError, TaskId, TransitionKind, WorkflowEvent, WorkflowEventType,
        assignment_event,
    },
    ports::{NotificationDispatcher, PermissionOracle, StoreError, WorkflowStore},
};
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info};

/// Drives assignments through acceptance, rejection and rejection review.
///
/// ```text
/// active --accept--> accepted
/// active --reject--> rejected_pending_review
/// rejected_pending_review --approve_rejection--> rejected
/// rejected_pending_review --reject_rejection--> active
/// ```
pub struct AssignmentLifecycleManager<S, O, N, C>
where
    S: WorkflowStore,
    O: PermissionOracle,
    N: NotificationDispatcher,
    C: Clock + Send + Sync,
{
    context: Arc<WorkflowContext<S, O, N, C>>,
}

impl<S, O, N, C> Clone for AssignmentLifecycleManager<S, O, N, C>
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

impl<S, O, N, C> AssignmentLifecycleManager<S, O, N, C>
where
    S: WorkflowStore,
    O: PermissionOracle,
    N: NotificationDispatcher,
    C: Clock + Send + Sync,
{
    /// Creates the manager over shared collaborators.
    #[must_use]
    pub const fn new(context: Arc<WorkflowContext<S, O, N, C>>) -> Self {
        Self { context }
    }

    /// Assigns a task to `assignee` under `assignment_id`, taking the task
    /// out of the unassigned pool.
    ///
    /// Replaying with an identifier that is already stored returns the
    /// stored assignment without a second event.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::InvalidTransition`] when the task is
    /// archived or the assignee already holds a live assignment on it.
    pub async fn assign(
        &self,
        actor: ActorId,
        task_id: TaskId,
        assignee: ActorId,
        assignment_id: AssignmentId,
    ) -> WorkflowResult<TransitionOutcome> {
        let command = TransitionCommand::Assign {
            task_id,
            assignee,
            assignment_id,
        };
        let task = self.context.require_task(task_id, actor, &command).await?;
        let store = self.context.store();
        let replayed = store
            .find_assignment(assignment_id)
            .await
            .map_err(|err| store_failure(err, actor, &command))?;
        if let Some(existing) = replayed {
            debug!(%assignment_id, "assignment already stored");
            let pooled = self.leave_pool(actor, task, &command).await?;
            return Ok(TransitionOutcome::for_assignment(pooled, existing, None));
        }

        if task.is_archived() {
            return Err(TaskDomainError::TaskArchived(task_id).into());
        }
        let assignments = self.context.assignments_of(task_id, actor, &command).await?;
        if assignments
            .iter()
            .any(|held| held.assignee() == assignee && held.status().is_live())
        {
            return Err(TaskDomainError::AssignmentAlreadyLive { task_id, assignee }.into());
        }
        self.context
            .gate()
            .check(actor, &task, None, TransitionKind::Assign)
            .await?;

        let assignment = Assignment::new(
            assignment_id,
            task_id,
            assignee,
            actor,
            self.context.clock(),
        );
        let stored = store
            .create_assignment(&assignment)
            .await
            .map_err(|err| store_failure(err, actor, &command))?;
        let updated = self.leave_pool(actor, task, &command).await?;

        let event = WorkflowEvent::builder(WorkflowEventType::AssignmentCreated, task_id, actor)
            .with_assignment(assignment_id)
            .with_states("none", stored.status().as_str())
            .notify(assignee)
            .notify(updated.created_by())
            .build(self.context.clock());
        let emitted = self.context.emit(event).await;
        info!(%task_id, %assignment_id, %assignee, %actor, "task assigned");
        Ok(TransitionOutcome::for_assignment(updated, stored, Some(emitted)))
    }

    /// Accepts an active assignment. Only the assignee may accept.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::InvalidTransition`] unless the
    /// assignment is active, and [`super::WorkflowError::PermissionDenied`]
    /// for anyone but the assignee.
    pub async fn accept(
        &self,
        actor: ActorId,
        assignment_id: AssignmentId,
    ) -> WorkflowResult<TransitionOutcome> {
        let command = TransitionCommand::AcceptAssignment { assignment_id };
        let (assignment, task) = self.load(assignment_id, actor, &command).await?;
        assignment.clone().accept(self.context.clock())?;
        self.context
            .gate()
            .check(actor, &task, Some(&assignment), TransitionKind::Accept)
            .await?;

        let stored = self
            .resolve(assignment_id, AssignmentOutcome::Accepted, None, actor, &command)
            .await?;
        Ok(self
            .finish(WorkflowEventType::AssignmentAccepted, actor, &assignment, stored, task)
            .await)
    }

    /// Rejects an active assignment, sending it to review.
    ///
    /// The reason is validated before anything is read from or written to
    /// the store.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::ValidationFailed`] for a reason
    /// shorter than [`RejectionReason::MIN_CHARS`] characters.
    pub async fn reject(
        &self,
        actor: ActorId,
        assignment_id: AssignmentId,
        reason: &str,
    ) -> WorkflowResult<TransitionOutcome> {
        let validated = RejectionReason::new(reason)?;
        let command = TransitionCommand::RejectAssignment {
            assignment_id,
            reason: reason.to_owned(),
        };
        let (assignment, task) = self.load(assignment_id, actor, &command).await?;
        assignment
            .clone()
            .reject(validated.clone(), self.context.clock())?;
        self.context
            .gate()
            .check(actor, &task, Some(&assignment), TransitionKind::Reject)
            .await?;

        let stored = self
            .resolve(
                assignment_id,
                AssignmentOutcome::Rejected,
                Some(&validated),
                actor,
                &command,
            )
            .await?;
        Ok(self
            .finish(WorkflowEventType::AssignmentRejected, actor, &assignment, stored, task)
            .await)
    }

    /// Confirms a rejection under review.
    ///
    /// When no other live assignment remains and pooling is enabled, the
    /// task returns to the unassigned pool. Calling this once the review is
    /// resolved either way is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::PermissionDenied`] unless the actor is
    /// an administrator or the task creator.
    pub async fn approve_rejection(
        &self,
        actor: ActorId,
        assignment_id: AssignmentId,
    ) -> WorkflowResult<TransitionOutcome> {
        let command = TransitionCommand::ApproveRejection { assignment_id };
        let (assignment, task) = self.load(assignment_id, actor, &command).await?;
        self.context
            .gate()
            .check(actor, &task, Some(&assignment), TransitionKind::ResolveRejection)
            .await?;
        if assignment.clone().approve_rejection(self.context.clock())
            == ReviewResolution::AlreadyResolved
        {
            debug!(%assignment_id, status = %assignment.status(), "rejection already resolved");
            return Ok(TransitionOutcome::for_assignment(task, assignment, None));
        }

        let Some(stored) = self
            .resolve_review(assignment_id, AssignmentOutcome::RejectionApproved, actor, &command)
            .await?
        else {
            return self.already_resolved(task, assignment_id, actor, &command).await;
        };
        let updated = self.return_to_pool(actor, task, assignment_id, &command).await?;
        Ok(self
            .finish(WorkflowEventType::RejectionApproved, actor, &assignment, stored, updated)
            .await)
    }

    /// Overturns a rejection under review, handing the task back to the same
    /// assignee with the rejection record cleared.
    ///
    /// Calling this once the review is resolved either way is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError::PermissionDenied`] unless the actor is
    /// an administrator or the task creator.
    pub async fn reject_rejection(
        &self,
        actor: ActorId,
        assignment_id: AssignmentId,
    ) -> WorkflowResult<TransitionOutcome> {
        let command = TransitionCommand::RejectRejection { assignment_id };
        let (assignment, task) = self.load(assignment_id, actor, &command).await?;
        self.context
            .gate()
            .check(actor, &task, Some(&assignment), TransitionKind::ResolveRejection)
            .await?;
        if assignment.clone().overturn_rejection(self.context.clock())
            == ReviewResolution::AlreadyResolved
        {
            debug!(%assignment_id, status = %assignment.status(), "rejection already resolved");
            return Ok(TransitionOutcome::for_assignment(task, assignment, None));
        }

        let Some(stored) = self
            .resolve_review(assignment_id, AssignmentOutcome::RejectionOverturned, actor, &command)
            .await?
        else {
            return self.already_resolved(task, assignment_id, actor, &command).await;
        };
        Ok(self
            .finish(WorkflowEventType::RejectionOverturned, actor, &assignment, stored, task)
            .await)
    }

    /// Lists the assignments of a task.
    ///
    /// # Errors
    ///
    /// Returns the store's error when the lookup fails.
    pub async fn assignments_for(
        &self,
        task_id: TaskId,
    ) -> crate::task::ports::StoreResult<Vec<Assignment>> {
        self.context.store().assignments_for_task(task_id).await
    }

    async fn load(
        &self,
        assignment_id: AssignmentId,
        actor: ActorId,
        command: &TransitionCommand,
    ) -> WorkflowResult<(Assignment, Task)> {
        let assignment = self
            .context
            .require_assignment(assignment_id, actor, command)
            .await?;
        let task = self
            .context
            .require_task(assignment.task_id(), actor, command)
            .await?;
        Ok((assignment, task))
    }

    async fn resolve(
        &self,
        assignment_id: AssignmentId,
        outcome: AssignmentOutcome,
        reason: Option<&RejectionReason>,
        actor: ActorId,
        command: &TransitionCommand,
    ) -> WorkflowResult<Assignment> {
        self.context
            .store()
            .record_assignment_resolution(assignment_id, outcome, reason)
            .await
            .map_err(|err| store_failure(err, actor, command))
    }

    /// Records a review outcome. Returns `None` when another resolution
    /// reached the store first, which makes this one a no-op.
    async fn resolve_review(
        &self,
        assignment_id: AssignmentId,
        outcome: AssignmentOutcome,
        actor: ActorId,
        command: &TransitionCommand,
    ) -> WorkflowResult<Option<Assignment>> {
        match self
            .context
            .store()
            .record_assignment_resolution(assignment_id, outcome, None)
            .await
        {
            Ok(stored) => Ok(Some(stored)),
            Err(StoreError::Conflict(violation)) => {
                debug!(%assignment_id, %violation, "review resolved concurrently");
                Ok(None)
            }
            Err(err) => Err(store_failure(err, actor, command)),
        }
    }

    async fn already_resolved(
        &self,
        task: Task,
        assignment_id: AssignmentId,
        actor: ActorId,
        command: &TransitionCommand,
    ) -> WorkflowResult<TransitionOutcome> {
        let current = self
            .context
            .require_assignment(assignment_id, actor, command)
            .await?;
        Ok(TransitionOutcome::for_assignment(task, current, None))
    }

    async fn finish(
        &self,
        event_type: WorkflowEventType,
        actor: ActorId,
        before: &Assignment,
        after: Assignment,
        task: Task,
    ) -> TransitionOutcome {
        let event = assignment_event(
            event_type,
            actor,
            before,
            &after,
            &task,
            self.context.clock(),
        );
        let emitted = self.context.emit(event).await;
        info!(
            task_id = %task.id(),
            assignment_id = %after.id(),
            %actor,
            from = %before.status(),
            to = %after.status(),
            "assignment status changed"
        );
        TransitionOutcome::for_assignment(task, after, Some(emitted))
    }

    async fn leave_pool(
        &self,
        actor: ActorId,
        task: Task,
        command: &TransitionCommand,
    ) -> WorkflowResult<Task> {
        if !task.is_unassigned() {
            return Ok(task);
        }
        self.context
            .store()
            .set_unassigned(task.id(), false)
            .await
            .map_err(|err| store_failure(err, actor, command))
    }

    async fn return_to_pool(
        &self,
        actor: ActorId,
        task: Task,
        resolved: AssignmentId,
        command: &TransitionCommand,
    ) -> WorkflowResult<Task> {
        if !self.context.config().pool_on_last_rejection || task.is_unassigned() {
            return Ok(task);
        }
        let others_live = self
            .context
            .assignments_of(task.id(), actor, command)
            .await?
            .iter()
            .any(|held| held.id() != resolved && held.status().is_live());
        if others_live {
            return Ok(task);
        }
        info!(task_id = %task.id(), "task returned to the unassigned pool");
        self.context
            .store()
            .set_unassigned(task.id(), true)
            .await
            .map_err(|err| store_failure(err, actor, command))
    }
}
