//! Permission oracle port.
//!
//! The oracle is queried fresh on every transition attempt; any caching
//! belongs behind an implementation of this trait.

use crate::task::domain::{Action, ActorId, Resource, TaskId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for permission lookups.
pub type PermissionResult<T> = Result<T, PermissionOracleError>;

/// Source of grants and assignment relationships.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionOracle: Send + Sync {
    /// Returns whether `actor` holds `action` on `resource`.
    async fn has_grant(
        &self,
        actor: ActorId,
        resource: Resource,
        action: Action,
    ) -> PermissionResult<bool>;

    /// Returns whether `actor` holds an active, accepted assignment on the
    /// task.
    async fn is_accepted_assignee(&self, actor: ActorId, task_id: TaskId)
    -> PermissionResult<bool>;
}

/// Errors returned by permission oracle implementations.
#[derive(Debug, Clone, Error)]
pub enum PermissionOracleError {
    /// The oracle could not answer.
    #[error("permission lookup failed: {0}")]
    Lookup(Arc<dyn std::error::Error + Send + Sync>),
}

impl PermissionOracleError {
    /// Wraps a lookup error.
    pub fn lookup(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Lookup(Arc::new(err))
    }
}
