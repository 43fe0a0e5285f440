//! Single entry point for every workflow transition.

use super::{
    ApprovalGate, AssignmentLifecycleManager, RetryHandle, TaskLifecycleService,
    TransitionCommand, TransitionOutcome, WorkflowContext, WorkflowResult,
};
use crate::config::WorkflowConfig;
use crate::sync::services::{OptimisticCoordinator, ReconciliationFeed};
use crate::task::{
    domain::ActorId,
    ports::{
        FeedFilter, FeedResult, NotificationDispatcher, PermissionOracle, TaskFeed, WorkflowStore,
    },
};
use mockable::Clock;
use std::sync::Arc;
use tracing::instrument;

/// Facade routing [`TransitionCommand`]s to the lifecycle services.
///
/// Every command runs the same pipeline: input validation, lookup of the
/// authoritative task, workflow rules, the permission gate, the speculative
/// display change, the store write, then the event.
pub struct WorkflowEngine<S, O, N, C>
where
    S: WorkflowStore,
    O: PermissionOracle,
    N: NotificationDispatcher,
    C: Clock + Send + Sync,
{
    context: Arc<WorkflowContext<S, O, N, C>>,
    tasks: TaskLifecycleService<S, O, N, C>,
    assignments: AssignmentLifecycleManager<S, O, N, C>,
    approvals: ApprovalGate<S, O, N, C>,
}

impl<S, O, N, C> WorkflowEngine<S, O, N, C>
where
    S: WorkflowStore,
    O: PermissionOracle,
    N: NotificationDispatcher,
    C: Clock + Send + Sync,
{
    /// Wires the engine to its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        oracle: Arc<O>,
        notifier: Arc<N>,
        clock: Arc<C>,
        config: WorkflowConfig,
    ) -> Self {
        let context = Arc::new(WorkflowContext::new(store, oracle, notifier, clock, config));
        Self {
            tasks: TaskLifecycleService::new(Arc::clone(&context)),
            assignments: AssignmentLifecycleManager::new(Arc::clone(&context)),
            approvals: ApprovalGate::new(Arc::clone(&context)),
            context,
        }
    }

    /// Performs `command` on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`super::WorkflowError`] describing why nothing was committed.
    /// Persistence failures carry a [`RetryHandle`] for [`Self::retry`].
    #[instrument(skip(self, actor, command), fields(%actor, command = command.name()))]
    pub async fn execute(
        &self,
        actor: ActorId,
        command: TransitionCommand,
    ) -> WorkflowResult<TransitionOutcome> {
        match command {
            TransitionCommand::CreateTask(new_task) => {
                self.tasks.create_task(actor, new_task).await
            }
            TransitionCommand::Advance { task_id } => self.tasks.advance(actor, task_id).await,
            TransitionCommand::Revert { task_id, target } => {
                self.tasks.revert(actor, task_id, target).await
            }
            TransitionCommand::MoveToColumn { task_id, column } => {
                self.tasks.move_to_column(actor, task_id, &column).await
            }
            TransitionCommand::Archive { task_id } => self.tasks.archive(actor, task_id).await,
            TransitionCommand::Restore { task_id } => self.tasks.restore(actor, task_id).await,
            TransitionCommand::Delete { task_id } => self.tasks.delete(actor, task_id).await,
            TransitionCommand::Assign {
                task_id,
                assignee,
                assignment_id,
            } => {
                self.assignments
                    .assign(actor, task_id, assignee, assignment_id)
                    .await
            }
            TransitionCommand::AcceptAssignment { assignment_id } => {
                self.assignments.accept(actor, assignment_id).await
            }
            TransitionCommand::RejectAssignment {
                assignment_id,
                reason,
            } => self.assignments.reject(actor, assignment_id, &reason).await,
            TransitionCommand::ApproveRejection { assignment_id } => {
                self.assignments.approve_rejection(actor, assignment_id).await
            }
            TransitionCommand::RejectRejection { assignment_id } => {
                self.assignments.reject_rejection(actor, assignment_id).await
            }
            TransitionCommand::RequestApproval { task_id } => {
                self.approvals.request_approval(actor, task_id).await
            }
            TransitionCommand::ApproveCompletion { task_id } => {
                self.approvals.approve(actor, task_id).await
            }
            TransitionCommand::RejectCompletion { task_id, note } => {
                self.approvals.reject_approval(actor, task_id, &note).await
            }
        }
    }

    /// Re-runs a transition whose write failed.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::execute`].
    pub async fn retry(&self, handle: RetryHandle) -> WorkflowResult<TransitionOutcome> {
        let (actor, command) = handle.into_parts();
        self.execute(actor, command).await
    }

    /// Subscribes the engine's coordinator to a push feed.
    ///
    /// # Errors
    ///
    /// Returns the feed's error when the subscription cannot be opened.
    pub async fn connect_feed<F>(
        &self,
        feed: &F,
        filter: FeedFilter,
    ) -> FeedResult<ReconciliationFeed<C>>
    where
        F: TaskFeed + ?Sized,
    {
        ReconciliationFeed::connect(feed, filter, Arc::clone(self.context.coordinator())).await
    }

    /// Returns the task lifecycle service.
    #[must_use]
    pub const fn tasks(&self) -> &TaskLifecycleService<S, O, N, C> {
        &self.tasks
    }

    /// Returns the assignment lifecycle manager.
    #[must_use]
    pub const fn assignments(&self) -> &AssignmentLifecycleManager<S, O, N, C> {
        &self.assignments
    }

    /// Returns the approval gate.
    #[must_use]
    pub const fn approvals(&self) -> &ApprovalGate<S, O, N, C> {
        &self.approvals
    }

    /// Returns the optimistic coordinator owning the local views.
    #[must_use]
    pub fn coordinator(&self) -> &Arc<OptimisticCoordinator<C>> {
        self.context.coordinator()
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &WorkflowConfig {
        self.context.config()
    }
}
