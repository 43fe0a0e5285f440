//! Transition commands and their results.

use crate::task::domain::{
    ActorId, Assignment, AssignmentId, NewTask, Stage, Task, TaskId, WorkflowEvent,
};

/// A transition an actor asks the engine to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionCommand {
    /// Create a task.
    CreateTask(NewTask),
    /// Move a task forward by one stage.
    Advance {
        /// Task to move.
        task_id: TaskId,
    },
    /// Move a task backward, to `target` or one stage back.
    Revert {
        /// Task to move.
        task_id: TaskId,
        /// Destination stage.
        target: Option<Stage>,
    },
    /// Drop a task into a board column identified by a raw status token.
    MoveToColumn {
        /// Task to move.
        task_id: TaskId,
        /// Column token, normalised before use.
        column: String,
    },
    /// Archive a task.
    Archive {
        /// Task to archive.
        task_id: TaskId,
    },
    /// Restore an archived task.
    Restore {
        /// Task to restore.
        task_id: TaskId,
    },
    /// Delete a task and its assignments.
    Delete {
        /// Task to delete.
        task_id: TaskId,
    },
    /// Assign a task to an actor.
    Assign {
        /// Task to assign.
        task_id: TaskId,
        /// Actor receiving the assignment.
        assignee: ActorId,
        /// Identifier the assignment is stored under.
        assignment_id: AssignmentId,
    },
    /// Accept an active assignment.
    AcceptAssignment {
        /// Assignment to accept.
        assignment_id: AssignmentId,
    },
    /// Reject an active assignment with a reason.
    RejectAssignment {
        /// Assignment to reject.
        assignment_id: AssignmentId,
        /// Free-text reason, validated before use.
        reason: String,
    },
    /// Confirm a rejection under review.
    ApproveRejection {
        /// Assignment under review.
        assignment_id: AssignmentId,
    },
    /// Overturn a rejection under review.
    RejectRejection {
        /// Assignment under review.
        assignment_id: AssignmentId,
    },
    /// Open the approval gate on completed work.
    RequestApproval {
        /// Task to submit.
        task_id: TaskId,
    },
    /// Approve completed work.
    ApproveCompletion {
        /// Task under review.
        task_id: TaskId,
    },
    /// Send completed work back with a note.
    RejectCompletion {
        /// Task under review.
        task_id: TaskId,
        /// Reviewer note, validated before use.
        note: String,
    },
}

impl TransitionCommand {
    /// Builds an assignment command with a fresh assignment identifier.
    #[must_use]
    pub fn assign(task_id: TaskId, assignee: ActorId) -> Self {
        Self::Assign {
            task_id,
            assignee,
            assignment_id: AssignmentId::new(),
        }
    }

    /// Returns a short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateTask(_) => "create_task",
            Self::Advance { .. } => "advance",
            Self::Revert { .. } => "revert",
            Self::MoveToColumn { .. } => "move_to_column",
            Self::Archive { .. } => "archive",
            Self::Restore { .. } => "restore",
            Self::Delete { .. } => "delete",
            Self::Assign { .. } => "assign",
            Self::AcceptAssignment { .. } => "accept_assignment",
            Self::RejectAssignment { .. } => "reject_assignment",
            Self::ApproveRejection { .. } => "approve_rejection",
            Self::RejectRejection { .. } => "reject_rejection",
            Self::RequestApproval { .. } => "request_approval",
            Self::ApproveCompletion { .. } => "approve_completion",
            Self::RejectCompletion { .. } => "reject_completion",
        }
    }
}

/// Everything needed to re-run a transition whose write failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryHandle {
    actor: ActorId,
    command: TransitionCommand,
}

impl RetryHandle {
    /// Captures a transition for retrying.
    #[must_use]
    pub const fn new(actor: ActorId, command: TransitionCommand) -> Self {
        Self { actor, command }
    }

    /// Returns the actor who attempted the transition.
    #[must_use]
    pub const fn actor(&self) -> ActorId {
        self.actor
    }

    /// Returns the command to re-run.
    #[must_use]
    pub const fn command(&self) -> &TransitionCommand {
        &self.command
    }

    /// Splits the handle into actor and command.
    #[must_use]
    pub fn into_parts(self) -> (ActorId, TransitionCommand) {
        (self.actor, self.command)
    }
}

/// State after a transition, and the event it emitted.
///
/// `event` is `None` when the command changed nothing, such as resolving an
/// already-resolved rejection or replaying a creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// Task after the transition. For deletions, the task as last stored.
    pub task: Task,
    /// Assignment involved, if any.
    pub assignment: Option<Assignment>,
    /// Event emitted for the transition.
    pub event: Option<WorkflowEvent>,
}

impl TransitionOutcome {
    /// Outcome of a task-level change.
    #[must_use]
    pub const fn for_task(task: Task, event: Option<WorkflowEvent>) -> Self {
        Self {
            task,
            assignment: None,
            event,
        }
    }

    /// Outcome of an assignment-level change.
    #[must_use]
    pub const fn for_assignment(
        task: Task,
        assignment: Assignment,
        event: Option<WorkflowEvent>,
    ) -> Self {
        Self {
            task,
            assignment: Some(assignment),
            event,
        }
    }

    /// Returns whether the command changed nothing.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.event.is_none()
    }
}
