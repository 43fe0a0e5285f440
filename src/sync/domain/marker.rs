//! Speculative status markers.

use crate::task::domain::{Stage, TaskId};
use chrono::{DateTime, TimeDelta, Utc};

/// Speculative stage shown for a task until the store confirms it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimisticMarker {
    /// Stage the user asked for.
    pub speculative: Stage,
    /// When the speculative stage was last (re)applied.
    pub applied_at: DateTime<Utc>,
    /// Identifies the request that set the marker.
    pub generation: u64,
}

impl OptimisticMarker {
    /// Returns whether the marker has outlived `grace_window` at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, grace_window: TimeDelta) -> bool {
        now.signed_duration_since(self.applied_at) > grace_window
    }
}

/// Ticket returned when a speculative change is applied, used to confirm or
/// roll back that specific request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransition {
    /// Task being changed.
    pub task_id: TaskId,
    /// Stage displayed before the change.
    pub previous: Stage,
    /// Stage displayed speculatively.
    pub speculative: Stage,
    /// Generation of the marker this request set.
    pub generation: u64,
}
