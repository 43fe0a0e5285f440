//! Authorisation rules for workflow transitions.
//!
//! The rules are evaluated against an [`ActorContext`] resolved fresh from
//! the permission oracle on each attempt; nothing here performs lookups.

use super::{ActorId, Assignment, AssignmentStatus, Task};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of transition an actor is attempting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Forward status change.
    Advance,
    /// Backward status change.
    Revert,
    /// Accepting an assignment.
    Accept,
    /// Rejecting an assignment.
    Reject,
    /// Opening the approval gate.
    RequestApproval,
    /// Granting an approval request.
    Approve,
    /// Sending completed work back.
    RejectApproval,
    /// Confirming or overturning an assignment rejection.
    ResolveRejection,
    /// Assigning the task to an actor.
    Assign,
    /// Archiving or restoring the task.
    Archive,
    /// Deleting the task outright.
    Delete,
}

impl TransitionKind {
    /// Returns the canonical name of the transition kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Advance => "advance",
            Self::Revert => "revert",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::RequestApproval => "request_approval",
            Self::Approve => "approve",
            Self::RejectApproval => "reject_approval",
            Self::ResolveRejection => "resolve_rejection",
            Self::Assign => "assign",
            Self::Archive => "archive",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource a grant applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Task records.
    Tasks,
}

/// Action a grant permits on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Full administrative control.
    Administer,
    /// Creating new records.
    Create,
    /// Updating any record.
    Update,
    /// Assigning records to actors.
    Assign,
}

/// What the permission oracle reported about an actor for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorContext {
    /// The acting actor.
    pub actor: ActorId,
    /// Holds the administrator grant.
    pub is_admin: bool,
    /// Holds the general "update tasks" grant.
    pub can_update_tasks: bool,
    /// Holds the "assign tasks" grant.
    pub can_assign_tasks: bool,
    /// Holds an active, accepted assignment on the task.
    pub is_accepted_assignee: bool,
}

impl ActorContext {
    /// Creates a context with no grants.
    #[must_use]
    pub const fn unprivileged(actor: ActorId) -> Self {
        Self {
            actor,
            is_admin: false,
            can_update_tasks: false,
            can_assign_tasks: false,
            is_accepted_assignee: false,
        }
    }

    /// Creates an administrator context.
    #[must_use]
    pub const fn administrator(actor: ActorId) -> Self {
        Self {
            is_admin: true,
            ..Self::unprivileged(actor)
        }
    }
}

/// Why a transition was refused, for rendering an actionable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DenialReason {
    /// Forward moves need an admin, updater, the creator or an accepted assignee.
    #[error("advancing needs an administrator, task updater, the creator or an accepted assignee")]
    NotAuthorizedToAdvance,
    /// Reverting is reserved for administrators.
    #[error("only administrators may move a task backwards")]
    AdministratorRequired,
    /// The transition concerns a specific assignment that was not supplied.
    #[error("this action requires an assignment")]
    AssignmentRequired,
    /// Only the named assignee may respond to an assignment.
    #[error("only the assignee may respond to this assignment")]
    NotAssignee,
    /// Approval requests come from accepted assignees.
    #[error("only an actor holding an accepted assignment may request approval")]
    AcceptedAssignmentRequired,
    /// Reviewing is reserved for administrators and the task creator.
    #[error("only administrators or the task creator may review this task")]
    NotApprover,
    /// Assigning needs an admin, the creator or the assign grant.
    #[error("only administrators, the task creator or assigners may assign this task")]
    NotAuthorizedToAssign,
    /// Archival needs an admin, the creator or the update grant.
    #[error("only administrators, the task creator or task updaters may archive this task")]
    NotAuthorizedToArchive,
    /// Deletion is reserved for administrators and the task creator.
    #[error("only administrators or the task creator may delete this task")]
    NotAuthorizedToDelete,
    /// Creating tasks needs the create grant.
    #[error("creating tasks requires the create grant")]
    NotAuthorizedToCreate,
}

/// Decides whether `context.actor` may perform `kind` on `task`.
///
/// # Errors
///
/// Returns the [`DenialReason`] describing the missing relationship or grant.
pub fn authorize(
    context: &ActorContext,
    task: &Task,
    assignment: Option<&Assignment>,
    kind: TransitionKind,
) -> Result<(), DenialReason> {
    let is_creator = task.created_by() == context.actor;
    let allowed = match kind {
        TransitionKind::Advance => {
            context.is_admin
                || context.can_update_tasks
                || is_creator
                || context.is_accepted_assignee
        }
        TransitionKind::Revert => context.is_admin,
        TransitionKind::Accept | TransitionKind::Reject => {
            let Some(held) = assignment else {
                return Err(DenialReason::AssignmentRequired);
            };
            held.assignee() == context.actor
        }
        TransitionKind::RequestApproval => {
            context.is_accepted_assignee
                || assignment.is_some_and(|held| {
                    held.assignee() == context.actor
                        && held.status() == AssignmentStatus::Accepted
                })
        }
        TransitionKind::Approve
        | TransitionKind::RejectApproval
        | TransitionKind::ResolveRejection => context.is_admin || is_creator,
        TransitionKind::Assign => context.is_admin || context.can_assign_tasks || is_creator,
        TransitionKind::Archive => context.is_admin || context.can_update_tasks || is_creator,
        TransitionKind::Delete => context.is_admin || is_creator,
    };

    if allowed {
        Ok(())
    } else {
        Err(denial_for(kind))
    }
}

const fn denial_for(kind: TransitionKind) -> DenialReason {
    match kind {
        TransitionKind::Advance => DenialReason::NotAuthorizedToAdvance,
        TransitionKind::Revert => DenialReason::AdministratorRequired,
        TransitionKind::Accept | TransitionKind::Reject => DenialReason::NotAssignee,
        TransitionKind::RequestApproval => DenialReason::AcceptedAssignmentRequired,
        TransitionKind::Approve
        | TransitionKind::RejectApproval
        | TransitionKind::ResolveRejection => DenialReason::NotApprover,
        TransitionKind::Assign => DenialReason::NotAuthorizedToAssign,
        TransitionKind::Archive => DenialReason::NotAuthorizedToArchive,
        TransitionKind::Delete => DenialReason::NotAuthorizedToDelete,
    }
}
