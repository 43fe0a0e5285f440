//! Notification dispatcher that records events in memory.

use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};

use crate::task::{
    domain::{TaskId, WorkflowEvent, WorkflowEventType},
    ports::{NotificationDispatcher, NotificationResult},
};

/// Dispatcher that keeps every event it receives, in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    events: Arc<RwLock<Vec<WorkflowEvent>>>,
}

impl RecordingDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the recorded event types for one task, in order.
    #[must_use]
    pub fn event_types_for(&self, task_id: TaskId) -> Vec<WorkflowEventType> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.task_id == task_id)
            .map(|event| event.event_type)
            .collect()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, event: &WorkflowEvent) -> NotificationResult<()> {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}
