//! Canonical workflow stages and the legal transition graph.
//!
//! Every status change, whether forward, backward or through a board column
//! drop, is planned here before permissions are consulted.

use super::{ApprovalStatus, Task, TaskDomainError, TaskStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display lane of a task within the four-stage workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Stage 0.
    Pending,
    /// Stage 1.
    InProgress,
    /// Stage 2.
    Completed,
    /// Stage 3, terminal.
    Approved,
}

/// Stages in workflow order.
pub const STAGES: [Stage; 4] = [
    Stage::Pending,
    Stage::InProgress,
    Stage::Completed,
    Stage::Approved,
];

impl Stage {
    /// Returns the zero-based position of the stage.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Completed => 2,
            Self::Approved => 3,
        }
    }

    /// Returns the stage at `index`, if any.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        STAGES.get(index).copied()
    }

    /// Returns the canonical lane name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Approved => "approved",
        }
    }

    /// Returns whether the stage is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes the display stage from a stored status and approval status.
///
/// Completed work only reaches the approved lane once its approval status is
/// `approved`. The legacy `approved` status and `cancelled` map to lane 3.
#[must_use]
pub const fn effective_stage(status: TaskStatus, approval: Option<ApprovalStatus>) -> Stage {
    match (status, approval) {
        (TaskStatus::Completed, Some(ApprovalStatus::Approved)) => Stage::Approved,
        (TaskStatus::Completed, _) => Stage::Completed,
        (TaskStatus::Pending, _) => Stage::Pending,
        (TaskStatus::InProgress, _) => Stage::InProgress,
        (TaskStatus::Approved | TaskStatus::Cancelled, _) => Stage::Approved,
    }
}

/// Returns the stage immediately after `current_index`, or `None` when
/// already terminal.
#[must_use]
pub fn next_stage(current_index: usize) -> Option<Stage> {
    current_index
        .checked_add(1)
        .and_then(Stage::from_index)
}

/// Returns the stage immediately before `current_index`, or `None` at the
/// first stage.
#[must_use]
pub fn previous_stage(current_index: usize) -> Option<Stage> {
    current_index
        .checked_sub(1)
        .and_then(Stage::from_index)
}

/// Plans a forward advance of `task` by one stage.
///
/// # Errors
///
/// Returns [`TaskDomainError`] when the task is archived, has an approval
/// request outstanding, is already terminal, or would need the approval gate
/// to move on.
pub fn plan_advance(task: &Task) -> Result<Stage, TaskDomainError> {
    ensure_movable(task)?;
    let current = task.effective_stage();
    let target = next_stage(current.index()).ok_or(TaskDomainError::TerminalStage(task.id()))?;
    if target == Stage::Approved {
        return Err(TaskDomainError::ApprovalRequired(task.id()));
    }
    Ok(target)
}

/// Plans moving `task` back to `target`, or to the previous stage when no
/// target is given.
///
/// # Errors
///
/// Returns [`TaskDomainError`] when the task is archived, has an approval
/// request outstanding, the target is the approved stage, or the target is
/// not strictly behind the current stage.
pub fn plan_revert(task: &Task, target: Option<Stage>) -> Result<Stage, TaskDomainError> {
    ensure_movable(task)?;
    let current = task.effective_stage();
    let Some(resolved) = target.or_else(|| previous_stage(current.index())) else {
        return Err(TaskDomainError::InvalidTransition {
            task_id: task.id(),
            from: current,
            to: current,
        });
    };
    if resolved == Stage::Approved {
        return Err(TaskDomainError::RevertOntoApproved(task.id()));
    }
    if resolved >= current {
        return Err(TaskDomainError::InvalidTransition {
            task_id: task.id(),
            from: current,
            to: resolved,
        });
    }
    Ok(resolved)
}

/// Direction of a planned board move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    /// Forward by exactly one stage.
    Advance,
    /// Backward to an earlier stage.
    Revert,
}

/// Interprets dropping `task` into the column for `target`.
///
/// # Errors
///
/// Returns [`TaskDomainError::InvalidTransition`] when `target` is neither
/// the next stage nor an earlier one, and propagates the advance and revert
/// planning errors otherwise.
pub fn plan_move(task: &Task, target: Stage) -> Result<MoveDirection, TaskDomainError> {
    let current = task.effective_stage();
    if target < current {
        plan_revert(task, Some(target))?;
        return Ok(MoveDirection::Revert);
    }
    if next_stage(current.index()) == Some(target) {
        plan_advance(task)?;
        return Ok(MoveDirection::Advance);
    }
    Err(TaskDomainError::InvalidTransition {
        task_id: task.id(),
        from: current,
        to: target,
    })
}

fn ensure_movable(task: &Task) -> Result<(), TaskDomainError> {
    if task.is_archived() {
        return Err(TaskDomainError::TaskArchived(task.id()));
    }
    if task.approval_status() == Some(ApprovalStatus::Pending) {
        return Err(TaskDomainError::ApprovalPending(task.id()));
    }
    Ok(())
}
