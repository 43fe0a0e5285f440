//! Collaborators shared by the workflow services.

use super::{PermissionGate, RetryHandle, TransitionCommand, WorkflowError, WorkflowResult};
use crate::config::WorkflowConfig;
use crate::sync::{domain::PendingTransition, services::OptimisticCoordinator};
use crate::task::{
    domain::{ActorId, Assignment, AssignmentId, Task, TaskId, WorkflowEvent},
    ports::{NotificationDispatcher, PermissionOracle, StoreError, StoreResult, WorkflowStore},
};
use mockable::Clock;
use std::sync::Arc;
use tracing::warn;

/// Store, permission gate, notifier, coordinator and clock used by every
/// workflow service.
pub struct WorkflowContext<S, O, N, C>
where
    S: WorkflowStore,
    O: PermissionOracle,
    N: NotificationDispatcher,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    gate: PermissionGate<O>,
    notifier: Arc<N>,
    coordinator: Arc<OptimisticCoordinator<C>>,
    clock: Arc<C>,
    config: WorkflowConfig,
}

impl<S, O, N, C> WorkflowContext<S, O, N, C>
where
    S: WorkflowStore,
    O: PermissionOracle,
    N: NotificationDispatcher,
    C: Clock + Send + Sync,
{
    /// Wires the collaborators together with a fresh coordinator.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        oracle: Arc<O>,
        notifier: Arc<N>,
        clock: Arc<C>,
        config: WorkflowConfig,
    ) -> Self {
        let coordinator = Arc::new(OptimisticCoordinator::new(Arc::clone(&clock), &config));
        Self {
            store,
            gate: PermissionGate::new(oracle),
            notifier,
            coordinator,
            clock,
            config,
        }
    }

    /// Returns the backing store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the permission gate.
    #[must_use]
    pub const fn gate(&self) -> &PermissionGate<O> {
        &self.gate
    }

    /// Returns the optimistic coordinator.
    #[must_use]
    pub const fn coordinator(&self) -> &Arc<OptimisticCoordinator<C>> {
        &self.coordinator
    }

    /// Returns the clock.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub(crate) async fn require_task(
        &self,
        task_id: TaskId,
        actor: ActorId,
        command: &TransitionCommand,
    ) -> WorkflowResult<Task> {
        self.store
            .find_task(task_id)
            .await
            .map_err(|err| store_failure(err, actor, command))?
            .ok_or(WorkflowError::TaskNotFound(task_id))
    }

    pub(crate) async fn require_assignment(
        &self,
        assignment_id: AssignmentId,
        actor: ActorId,
        command: &TransitionCommand,
    ) -> WorkflowResult<Assignment> {
        self.store
            .find_assignment(assignment_id)
            .await
            .map_err(|err| store_failure(err, actor, command))?
            .ok_or(WorkflowError::AssignmentNotFound(assignment_id))
    }

    pub(crate) async fn assignments_of(
        &self,
        task_id: TaskId,
        actor: ActorId,
        command: &TransitionCommand,
    ) -> WorkflowResult<Vec<Assignment>> {
        self.store
            .assignments_for_task(task_id)
            .await
            .map_err(|err| store_failure(err, actor, command))
    }

    /// Confirms or rolls back a speculative change depending on the write.
    /// A committed write hands the saved task to the coordinator so older
    /// pushes cannot undo it.
    pub(crate) fn settle(
        &self,
        pending: &PendingTransition,
        result: StoreResult<Task>,
        actor: ActorId,
        command: &TransitionCommand,
    ) -> WorkflowResult<Task> {
        match result {
            Ok(saved) => {
                self.coordinator.confirm(pending, &saved);
                Ok(saved)
            }
            Err(err) => {
                self.coordinator.roll_back(pending);
                Err(store_failure(err, actor, command))
            }
        }
    }

    /// Hands the event to the dispatcher. Dispatch failures are logged and
    /// never undo the committed transition.
    pub(crate) async fn emit(&self, event: WorkflowEvent) -> WorkflowEvent {
        if let Err(err) = self.notifier.dispatch(&event).await {
            warn!(
                task_id = %event.task_id,
                event_type = %event.event_type,
                error = %err,
                "failed to dispatch workflow event"
            );
        }
        event
    }
}

/// Maps a store error onto the service taxonomy, attaching a retry handle
/// to genuine persistence failures. A conflict means the record moved on
/// since it was checked, so it is reported as an invalid transition.
pub(crate) fn store_failure(
    err: StoreError,
    actor: ActorId,
    command: &TransitionCommand,
) -> WorkflowError {
    match err {
        StoreError::TaskNotFound(task_id) => WorkflowError::TaskNotFound(task_id),
        StoreError::AssignmentNotFound(assignment_id) => {
            WorkflowError::AssignmentNotFound(assignment_id)
        }
        StoreError::Conflict(violation) => {
            warn!(%actor, command = command.name(), %violation, "store refused a stale transition");
            WorkflowError::InvalidTransition(violation)
        }
        source => {
            warn!(%actor, command = command.name(), error = %source, "store call failed");
            WorkflowError::PersistenceFailure {
                source,
                retry: Box::new(RetryHandle::new(actor, command.clone())),
            }
        }
    }
}
