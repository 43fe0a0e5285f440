//! Notification dispatcher port.

use crate::task::domain::WorkflowEvent;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for notification dispatch.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Receiver of committed workflow events.
///
/// Delivery mechanics (email, toasts, ...) live behind this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Hands one event to the dispatcher.
    async fn dispatch(&self, event: &WorkflowEvent) -> NotificationResult<()>;
}

/// Errors returned by notification dispatchers.
#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    /// The dispatcher refused or failed to accept the event.
    #[error("notification dispatch failed: {0}")]
    Dispatch(Arc<dyn std::error::Error + Send + Sync>),
}

impl NotificationError {
    /// Wraps a dispatch error.
    pub fn dispatch(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Dispatch(Arc::new(err))
    }
}
