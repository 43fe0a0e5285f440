//! Merge rule for authoritative snapshots against optimistic markers.

use super::OptimisticMarker;
use crate::task::domain::{Stage, Task, TaskId};
use chrono::{DateTime, TimeDelta, Utc};

/// What happened when a snapshot was merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No marker was held; the snapshot was adopted.
    Adopted {
        /// Task concerned.
        task_id: TaskId,
        /// Stage now displayed.
        stage: Stage,
    },
    /// The snapshot matched the marker, which was cleared.
    Confirmed {
        /// Task concerned.
        task_id: TaskId,
        /// Stage now displayed.
        stage: Stage,
    },
    /// The snapshot contradicted a fresh marker and was not displayed.
    Deferred {
        /// Task concerned.
        task_id: TaskId,
        /// Stage kept on display.
        speculative: Stage,
        /// Stage the snapshot carried.
        authoritative: Stage,
    },
    /// The marker had outlived the grace window and was discarded in favour
    /// of the snapshot.
    StaleMarkerDiscarded {
        /// Task concerned.
        task_id: TaskId,
        /// Stage now displayed.
        stage: Stage,
        /// Stage the discarded marker held.
        speculative: Stage,
    },
    /// The snapshot was older than one already merged.
    OutdatedSnapshotIgnored {
        /// Task concerned.
        task_id: TaskId,
        /// Revision of the ignored snapshot.
        revision: u64,
        /// Newest revision already merged.
        latest: u64,
    },
}

impl ReconcileOutcome {
    /// Returns the task the outcome concerns.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        match *self {
            Self::Adopted { task_id, .. }
            | Self::Confirmed { task_id, .. }
            | Self::Deferred { task_id, .. }
            | Self::StaleMarkerDiscarded { task_id, .. }
            | Self::OutdatedSnapshotIgnored { task_id, .. } => task_id,
        }
    }

    /// Returns the stage the snapshot placed on display, if any.
    #[must_use]
    pub const fn adopted_stage(&self) -> Option<Stage> {
        match *self {
            Self::Adopted { stage, .. }
            | Self::Confirmed { stage, .. }
            | Self::StaleMarkerDiscarded { stage, .. } => Some(stage),
            Self::Deferred { .. } | Self::OutdatedSnapshotIgnored { .. } => None,
        }
    }

    /// Returns whether the snapshot's content was merged into the views.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        self.adopted_stage().is_some()
    }
}

/// Decides how an incoming snapshot of `task` merges with the local state.
///
/// `last_revision` is the newest revision already merged for the task. A
/// marker only defers a contradicting snapshot while
/// `now - applied_at` does not exceed `grace_window`.
#[must_use]
pub fn reconcile(
    task: &Task,
    marker: Option<&OptimisticMarker>,
    last_revision: Option<u64>,
    now: DateTime<Utc>,
    grace_window: TimeDelta,
) -> ReconcileOutcome {
    let task_id = task.id();
    if let Some(latest) = last_revision
        && task.revision() < latest
    {
        return ReconcileOutcome::OutdatedSnapshotIgnored {
            task_id,
            revision: task.revision(),
            latest,
        };
    }

    let stage = task.effective_stage();
    let Some(held) = marker else {
        return ReconcileOutcome::Adopted { task_id, stage };
    };
    if held.speculative == stage {
        return ReconcileOutcome::Confirmed { task_id, stage };
    }
    if held.is_expired(now, grace_window) {
        return ReconcileOutcome::StaleMarkerDiscarded {
            task_id,
            stage,
            speculative: held.speculative,
        };
    }
    ReconcileOutcome::Deferred {
        task_id,
        speculative: held.speculative,
        authoritative: stage,
    }
}
