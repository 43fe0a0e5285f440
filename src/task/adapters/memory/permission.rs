//! Grant-table permission oracle backed by the in-memory store.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use super::InMemoryWorkflowStore;
use crate::task::{
    domain::{Action, ActorId, Resource, TaskId},
    ports::{PermissionOracle, PermissionOracleError, PermissionResult},
};

/// Permission oracle holding explicit grants in memory.
///
/// Assignment relationships are read from the store on every call, so an
/// acceptance becomes visible to the oracle as soon as it is persisted.
#[derive(Clone)]
pub struct InMemoryPermissionOracle {
    grants: Arc<RwLock<HashSet<(ActorId, Resource, Action)>>>,
    store: Arc<InMemoryWorkflowStore>,
}

impl InMemoryPermissionOracle {
    /// Creates an oracle with no grants.
    #[must_use]
    pub fn new(store: Arc<InMemoryWorkflowStore>) -> Self {
        Self {
            grants: Arc::default(),
            store,
        }
    }

    /// Gives `actor` permission to perform `action` on `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionOracleError`] when the grant table lock is
    /// poisoned.
    pub fn grant(
        &self,
        actor: ActorId,
        resource: Resource,
        action: Action,
    ) -> PermissionResult<()> {
        let mut grants = self.grants.write().map_err(|err| {
            PermissionOracleError::lookup(std::io::Error::other(err.to_string()))
        })?;
        grants.insert((actor, resource, action));
        Ok(())
    }

    /// Withdraws a grant. Revoking a missing grant is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionOracleError`] when the grant table lock is
    /// poisoned.
    pub fn revoke(
        &self,
        actor: ActorId,
        resource: Resource,
        action: Action,
    ) -> PermissionResult<()> {
        let mut grants = self.grants.write().map_err(|err| {
            PermissionOracleError::lookup(std::io::Error::other(err.to_string()))
        })?;
        grants.remove(&(actor, resource, action));
        Ok(())
    }
}

#[async_trait]
impl PermissionOracle for InMemoryPermissionOracle {
    async fn has_grant(
        &self,
        actor: ActorId,
        resource: Resource,
        action: Action,
    ) -> PermissionResult<bool> {
        let grants = self.grants.read().map_err(|err| {
            PermissionOracleError::lookup(std::io::Error::other(err.to_string()))
        })?;
        Ok(grants.contains(&(actor, resource, action)))
    }

    async fn is_accepted_assignee(
        &self,
        actor: ActorId,
        task_id: TaskId,
    ) -> PermissionResult<bool> {
        self.store
            .holds_accepted_assignment(actor, task_id)
            .map_err(PermissionOracleError::lookup)
    }
}
