//! Permission gate backed by the permission oracle.

use super::{WorkflowError, WorkflowResult};
use crate::task::{
    domain::{
        Action, ActorContext, ActorId, Assignment, DenialReason, Resource, Task, TaskId,
        TransitionKind, authorize,
    },
    ports::{PermissionOracle, PermissionResult},
};
use std::sync::Arc;
use tracing::debug;

/// Resolves an actor's grants fresh for every attempt and applies the
/// transition rules to them.
#[derive(Clone)]
pub struct PermissionGate<O: PermissionOracle> {
    oracle: Arc<O>,
}

impl<O: PermissionOracle> PermissionGate<O> {
    /// Creates a gate over `oracle`.
    #[must_use]
    pub const fn new(oracle: Arc<O>) -> Self {
        Self { oracle }
    }

    /// Looks up everything the rules need to know about `actor` for a task.
    ///
    /// # Errors
    ///
    /// Returns [`crate::task::ports::PermissionOracleError`] when any lookup
    /// fails.
    pub async fn actor_context(
        &self,
        actor: ActorId,
        task_id: TaskId,
    ) -> PermissionResult<ActorContext> {
        let is_admin = self.grant(actor, Action::Administer).await?;
        let can_update_tasks = self.grant(actor, Action::Update).await?;
        let can_assign_tasks = self.grant(actor, Action::Assign).await?;
        let is_accepted_assignee = self.oracle.is_accepted_assignee(actor, task_id).await?;
        Ok(ActorContext {
            actor,
            is_admin,
            can_update_tasks,
            can_assign_tasks,
            is_accepted_assignee,
        })
    }

    /// Checks whether `actor` may perform `kind` on `task`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::PermissionDenied`] with the reason for a
    /// refusal, or [`WorkflowError::OracleUnavailable`] when the grants could
    /// not be resolved.
    pub async fn check(
        &self,
        actor: ActorId,
        task: &Task,
        assignment: Option<&Assignment>,
        kind: TransitionKind,
    ) -> WorkflowResult<()> {
        let context = self.actor_context(actor, task.id()).await?;
        authorize(&context, task, assignment, kind).map_err(|reason| {
            debug!(%actor, task_id = %task.id(), %kind, %reason, "transition denied");
            WorkflowError::PermissionDenied(reason)
        })
    }

    /// Checks whether `actor` may create tasks.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::PermissionDenied`] unless the actor is an
    /// administrator or holds the create grant.
    pub async fn check_create(&self, actor: ActorId) -> WorkflowResult<()> {
        if self.grant(actor, Action::Administer).await? || self.grant(actor, Action::Create).await?
        {
            return Ok(());
        }
        debug!(%actor, "task creation denied");
        Err(WorkflowError::PermissionDenied(DenialReason::NotAuthorizedToCreate))
    }

    async fn grant(&self, actor: ActorId, action: Action) -> PermissionResult<bool> {
        self.oracle.has_grant(actor, Resource::Tasks, action).await
    }
}
