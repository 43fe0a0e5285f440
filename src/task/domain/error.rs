//! Error types for task workflow validation and parsing.

use super::{ActorId, AssignmentId, AssignmentStatus, Stage, TaskId};
use thiserror::Error;

/// Input validation failures caught before any persistence call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// An assignment rejection reason is shorter than the required minimum.
    #[error("rejection reason must be at least {minimum} characters (got {actual})")]
    RejectionReasonTooShort {
        /// Required number of characters.
        minimum: usize,
        /// Number of characters supplied after trimming.
        actual: usize,
    },

    /// An approval rejection note is empty after trimming.
    #[error("approval rejection note must not be empty")]
    EmptyApprovalNote,

    /// A task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// A priority lies outside the supported range.
    #[error("priority {0} is out of range, expected 1..=5")]
    PriorityOutOfRange(u8),
}

/// Workflow rule violations raised by the task and assignment aggregates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The requested stage is not reachable from the current effective stage.
    #[error("task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Task identifier.
        task_id: TaskId,
        /// Current effective stage.
        from: Stage,
        /// Requested stage.
        to: Stage,
    },

    /// The approved stage is only reachable through the approval gate.
    #[error("task {0} requires an approval decision to reach the approved stage")]
    ApprovalRequired(TaskId),

    /// The task already sits on the terminal stage.
    #[error("task {0} is already approved")]
    TerminalStage(TaskId),

    /// An outstanding approval request blocks status changes.
    #[error("task {0} has an approval request outstanding")]
    ApprovalPending(TaskId),

    /// Reverting may never land on the approved stage.
    #[error("task {0} cannot be reverted onto the approved stage")]
    RevertOntoApproved(TaskId),

    /// The approval sub-flow does not allow the requested action.
    #[error("task {task_id} cannot {action} while on stage {stage}")]
    InvalidApprovalTransition {
        /// Task identifier.
        task_id: TaskId,
        /// Attempted approval action.
        action: &'static str,
        /// Current effective stage.
        stage: Stage,
    },

    /// Archived tasks are frozen until restored.
    #[error("task {0} is archived")]
    TaskArchived(TaskId),

    /// The assignment state machine does not allow the requested action.
    #[error("assignment {assignment_id} cannot {action} while {from}")]
    InvalidAssignmentTransition {
        /// Assignment identifier.
        assignment_id: AssignmentId,
        /// Current assignment status.
        from: AssignmentStatus,
        /// Attempted action.
        action: &'static str,
    },

    /// The assignee already holds a live assignment on the task.
    #[error("actor {assignee} already holds a live assignment on task {task_id}")]
    AssignmentAlreadyLive {
        /// Task identifier.
        task_id: TaskId,
        /// Assignee identifier.
        assignee: ActorId,
    },
}

/// Error returned while strictly parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

/// Error returned while parsing approval statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown approval status: {0}")]
pub struct ParseApprovalStatusError(pub String);

/// Error returned while parsing assignment statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown assignment status: {0}")]
pub struct ParseAssignmentStatusError(pub String);
