//! Persistence port for tasks and assignments.
//!
//! Every command is keyed by task or assignment identifier plus the kind of
//! change, so replaying a command after a failed or timed-out call never
//! duplicates its effect.

use crate::task::domain::{
    ActorId, ApprovalNote, ApprovalOutcome, Assignment, AssignmentId, AssignmentOutcome,
    RejectionReason, Task, TaskDomainError, TaskId, TaskStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Backing store contract consumed by the workflow services.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Stores a new task and returns the stored record. Storing a task whose
    /// identifier already exists returns the existing record unchanged.
    async fn create_task(&self, task: &Task) -> StoreResult<Task>;

    /// Finds a task by identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_task(&self, task_id: TaskId) -> StoreResult<Option<Task>>;

    /// Writes a new raw status, leaving the approval sub-flow.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`] when the task does not exist and
    /// [`StoreError::Conflict`] while an approval request is outstanding.
    async fn update_status(&self, task_id: TaskId, status: TaskStatus) -> StoreResult<Task>;

    /// Sets or clears the archived flag.
    async fn set_archived(&self, task_id: TaskId, archived: bool) -> StoreResult<Task>;

    /// Sets or clears the unassigned pool flag.
    async fn set_unassigned(&self, task_id: TaskId, unassigned: bool) -> StoreResult<Task>;

    /// Physically removes a task and its assignments. Deleting a missing
    /// task is a no-op.
    async fn delete_task(&self, task_id: TaskId) -> StoreResult<()>;

    /// Stores a new assignment and returns the stored record. Storing an
    /// assignment whose identifier already exists returns the existing record.
    async fn create_assignment(&self, assignment: &Assignment) -> StoreResult<Assignment>;

    /// Finds an assignment by identifier.
    async fn find_assignment(&self, assignment_id: AssignmentId)
    -> StoreResult<Option<Assignment>>;

    /// Lists every assignment of a task, oldest first.
    async fn assignments_for_task(&self, task_id: TaskId) -> StoreResult<Vec<Assignment>>;

    /// Records how an assignment was resolved.
    ///
    /// Acceptance and rejection apply only to active assignments, review
    /// outcomes only to rejections pending review. Recording the outcome
    /// the assignment already carries returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AssignmentNotFound`] when the assignment does not
    /// exist and [`StoreError::Conflict`] when its status does not allow the
    /// outcome.
    async fn record_assignment_resolution(
        &self,
        assignment_id: AssignmentId,
        outcome: AssignmentOutcome,
        reason: Option<&RejectionReason>,
    ) -> StoreResult<Assignment>;

    /// Stamps the completion time on an assignment, keeping an existing stamp.
    async fn mark_assignment_completed(
        &self,
        assignment_id: AssignmentId,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<Assignment>;

    /// Opens the approval gate on a completed task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] unless the task is completed with no
    /// decision outstanding or granted; an outstanding request is returned
    /// unchanged.
    async fn request_approval(&self, task_id: TaskId, actor_id: ActorId) -> StoreResult<Task>;

    /// Records the reviewer's decision on a pending approval request.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] unless a request is pending. Replaying
    /// a decision that was already recorded returns the task unchanged.
    async fn resolve_approval(
        &self,
        task_id: TaskId,
        actor_id: ActorId,
        outcome: ApprovalOutcome,
        note: Option<&ApprovalNote>,
    ) -> StoreResult<Task>;
}

/// Errors returned by store implementations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The task was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The assignment was not found.
    #[error("assignment not found: {0}")]
    AssignmentNotFound(AssignmentId),

    /// The stored record no longer allows the change, typically because a
    /// concurrent command changed it first.
    #[error("conflicting change: {0}")]
    Conflict(TaskDomainError),

    /// The store could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
