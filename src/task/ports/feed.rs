//! Real-time push feed of authoritative task snapshots.

use crate::task::domain::{ProjectId, Task, TaskId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Full task state as pushed by the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    /// Task state at [`Task::revision`].
    pub task: Task,
    /// When the store published the snapshot.
    pub published_at: DateTime<Utc>,
}

impl TaskSnapshot {
    /// Creates a snapshot of `task`.
    #[must_use]
    pub const fn new(task: Task, published_at: DateTime<Utc>) -> Self {
        Self { task, published_at }
    }

    /// Returns the snapshot's task identifier.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task.id()
    }

    /// Returns the store revision of the snapshot.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.task.revision()
    }
}

/// Selects which snapshots a subscription receives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    project_id: Option<ProjectId>,
    task_ids: Option<HashSet<TaskId>>,
    include_archived: bool,
}

impl FeedFilter {
    /// Matches every non-archived task.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts the feed to one project.
    #[must_use]
    pub const fn for_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Restricts the feed to specific tasks.
    #[must_use]
    pub fn for_tasks(mut self, task_ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.task_ids = Some(task_ids.into_iter().collect());
        self
    }

    /// Includes archived tasks.
    #[must_use]
    pub const fn including_archived(mut self) -> Self {
        self.include_archived = true;
        self
    }

    /// Returns whether `task` passes the filter.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        if task.is_archived() && !self.include_archived {
            return false;
        }
        if let Some(project_id) = self.project_id
            && task.project_id() != Some(project_id)
        {
            return false;
        }
        self.task_ids
            .as_ref()
            .is_none_or(|ids| ids.contains(&task.id()))
    }
}

/// Cloneable switch that ends a subscription.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionHandle {
    closed: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    /// Creates an open handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops delivery. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Returns whether delivery has been stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Receiving end of a feed subscription.
///
/// Once unsubscribed no further snapshot is yielded, including snapshots
/// already buffered.
#[derive(Debug)]
pub struct FeedSubscription {
    receiver: mpsc::UnboundedReceiver<TaskSnapshot>,
    handle: SubscriptionHandle,
}

impl FeedSubscription {
    /// Wraps a snapshot receiver and the handle controlling it.
    #[must_use]
    pub const fn new(
        receiver: mpsc::UnboundedReceiver<TaskSnapshot>,
        handle: SubscriptionHandle,
    ) -> Self {
        Self { receiver, handle }
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `None` once unsubscribed or when the feed closes.
    pub async fn next(&mut self) -> Option<TaskSnapshot> {
        if self.handle.is_closed() {
            return None;
        }
        let snapshot = self.receiver.recv().await?;
        if self.handle.is_closed() {
            return None;
        }
        Some(snapshot)
    }

    /// Returns a buffered snapshot without waiting.
    pub fn try_next(&mut self) -> Option<TaskSnapshot> {
        if self.handle.is_closed() {
            return None;
        }
        self.receiver.try_recv().ok()
    }

    /// Returns a handle that can end this subscription from elsewhere.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Stops delivery and drops the buffered backlog. Idempotent.
    pub fn unsubscribe(&mut self) {
        self.handle.unsubscribe();
        self.receiver.close();
    }

    /// Returns whether delivery has been stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}

/// Push stream of full task snapshots.
#[async_trait]
pub trait TaskFeed: Send + Sync {
    /// Subscribes to snapshots matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] when the subscription cannot be established.
    async fn subscribe(&self, filter: FeedFilter) -> FeedResult<FeedSubscription>;
}

/// Errors returned by feed implementations.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// The feed connection is down.
    #[error("feed disconnected: {0}")]
    Disconnected(String),

    /// Transport-layer failure.
    #[error("feed transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl FeedError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
