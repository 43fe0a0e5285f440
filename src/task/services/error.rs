//! Errors surfaced by the workflow services.

use super::RetryHandle;
use crate::task::{
    domain::{AssignmentId, DenialReason, TaskDomainError, TaskId, ValidationError},
    ports::{PermissionOracleError, StoreError},
};
use thiserror::Error;

/// Result type for workflow service operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Why a transition did not happen.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The actor lacks the grant or relationship the transition needs.
    #[error("permission denied: {0}")]
    PermissionDenied(#[from] DenialReason),

    /// Input failed validation; nothing was sent to the store.
    #[error(transparent)]
    ValidationFailed(#[from] ValidationError),

    /// The workflow does not allow the transition from the current state.
    #[error(transparent)]
    InvalidTransition(#[from] TaskDomainError),

    /// The store call failed; local state was rolled back.
    #[error("failed to persist {}: {source}", .retry.command().name())]
    PersistenceFailure {
        /// Underlying store failure.
        source: StoreError,
        /// Re-runs the same transition.
        retry: Box<RetryHandle>,
    },

    /// The task does not exist.
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    /// The assignment does not exist.
    #[error("assignment {0} not found")]
    AssignmentNotFound(AssignmentId),

    /// The permission oracle could not answer; the transition is denied.
    #[error(transparent)]
    OracleUnavailable(#[from] PermissionOracleError),
}

impl WorkflowError {
    /// Returns the retry handle of a persistence failure.
    #[must_use]
    pub fn retry_handle(&self) -> Option<&RetryHandle> {
        match self {
            Self::PersistenceFailure { retry, .. } => Some(retry),
            _ => None,
        }
    }

    /// Returns whether an explicit retry may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PersistenceFailure { .. })
    }
}
