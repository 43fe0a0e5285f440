//! Optimistic update coordinator.

use crate::config::WorkflowConfig;
use crate::sync::domain::{
    LocalViews, OptimisticMarker, PendingTransition, ReconcileOutcome, TaskRow, ViewKey, reconcile,
};
use crate::task::domain::{Stage, Task, TaskId, normalize_status};
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Applies speculative stage changes to every local view and merges
/// authoritative snapshots without letting stale pushes revert them.
///
/// At most one marker is held per task. A newer request overwrites the
/// marker and restarts its grace window; confirming or rolling back an
/// older request then leaves the newer marker alone.
pub struct OptimisticCoordinator<C: Clock + Send + Sync> {
    state: Mutex<CoordinatorState>,
    clock: Arc<C>,
    grace_window: TimeDelta,
}

#[derive(Default)]
struct CoordinatorState {
    markers: HashMap<TaskId, OptimisticMarker>,
    displayed: HashMap<TaskId, Stage>,
    revisions: HashMap<TaskId, u64>,
    committed: HashMap<TaskId, Stage>,
    deferred: HashMap<TaskId, Task>,
    views: LocalViews,
    next_generation: u64,
}

impl CoordinatorState {
    fn show(&mut self, task_id: TaskId, stage: Stage) {
        self.displayed.insert(task_id, stage);
        self.views.set_stage(task_id, stage);
    }

    fn is_current(&self, task: &Task) -> bool {
        self.revisions
            .get(&task.id())
            .is_none_or(|latest| task.revision() >= *latest)
    }

    /// Remembers `task` as the newest state the store is known to hold.
    fn record(&mut self, task: &Task) {
        self.revisions.insert(task.id(), task.revision());
        self.committed.insert(task.id(), task.effective_stage());
    }

    fn adopt(&mut self, task: &Task, stage: Stage) {
        self.record(task);
        self.displayed.insert(task.id(), stage);
        self.views.merge(task, stage);
    }

    /// Puts the newest known store state back on display once no marker is
    /// held, preferring a deferred snapshot that is still current.
    fn restore(&mut self, task_id: TaskId) -> Option<Stage> {
        if let Some(snapshot) = self.deferred.remove(&task_id)
            && self.is_current(&snapshot)
        {
            let stage = snapshot.effective_stage();
            self.adopt(&snapshot, stage);
            return Some(stage);
        }
        let stage = self.committed.get(&task_id).copied()?;
        self.show(task_id, stage);
        Some(stage)
    }

    fn merge(
        &mut self,
        task: &Task,
        now: DateTime<Utc>,
        grace_window: TimeDelta,
    ) -> ReconcileOutcome {
        let task_id = task.id();
        let outcome = reconcile(
            task,
            self.markers.get(&task_id),
            self.revisions.get(&task_id).copied(),
            now,
            grace_window,
        );
        match outcome {
            ReconcileOutcome::Adopted { stage, .. } => self.adopt(task, stage),
            ReconcileOutcome::Confirmed { stage, .. }
            | ReconcileOutcome::StaleMarkerDiscarded { stage, .. } => {
                self.markers.remove(&task_id);
                self.deferred.remove(&task_id);
                self.adopt(task, stage);
            }
            ReconcileOutcome::Deferred { .. } => {
                self.record(task);
                self.deferred.insert(task_id, task.clone());
            }
            ReconcileOutcome::OutdatedSnapshotIgnored { .. } => {}
        }
        debug!(%task_id, revision = task.revision(), ?outcome, "reconciled snapshot");
        outcome
    }
}

impl<C: Clock + Send + Sync> OptimisticCoordinator<C> {
    /// Creates a coordinator using the configured grace window.
    #[must_use]
    pub fn new(clock: Arc<C>, config: &WorkflowConfig) -> Self {
        Self {
            state: Mutex::default(),
            clock,
            grace_window: config.grace_window(),
        }
    }

    /// Returns the grace window markers are held for.
    #[must_use]
    pub const fn grace_window(&self) -> TimeDelta {
        self.grace_window
    }

    /// Installs a named view showing `tasks` and seeds the display cache
    /// from them.
    ///
    /// Tasks with an outstanding marker keep their speculative stage in the
    /// new view. Rows older than a revision already merged are shown at the
    /// stage currently displayed.
    pub fn register_view(&self, key: ViewKey, tasks: &[Task]) {
        let mut state = self.lock();
        for task in tasks {
            if !state.is_current(task) {
                continue;
            }
            state.record(task);
            if !state.markers.contains_key(&task.id()) {
                state.displayed.insert(task.id(), task.effective_stage());
            }
        }
        let rows = tasks
            .iter()
            .map(|task| {
                let stage = state
                    .displayed
                    .get(&task.id())
                    .copied()
                    .unwrap_or_else(|| task.effective_stage());
                TaskRow::from_task(task, stage)
            })
            .collect();
        state.views.insert(key, rows);
    }

    /// Removes a named view.
    pub fn drop_view(&self, key: &ViewKey) {
        self.lock().views.remove(key);
    }

    /// Returns a copy of a view's rows.
    #[must_use]
    pub fn view(&self, key: &ViewKey) -> Option<Vec<TaskRow>> {
        self.lock().views.rows(key).map(<[TaskRow]>::to_vec)
    }

    /// Returns the stage currently displayed for a task.
    #[must_use]
    pub fn displayed_stage(&self, task_id: TaskId) -> Option<Stage> {
        self.lock().displayed.get(&task_id).copied()
    }

    /// Returns the marker held for a task.
    #[must_use]
    pub fn marker(&self, task_id: TaskId) -> Option<OptimisticMarker> {
        self.lock().markers.get(&task_id).copied()
    }

    /// Shows `requested` for the task in every view before the write is
    /// confirmed.
    ///
    /// The token is normalised, so board column identifiers are accepted.
    /// `authoritative` seeds the committed stage when the coordinator has
    /// not seen the task yet.
    pub fn begin(
        &self,
        task_id: TaskId,
        requested: &str,
        authoritative: Stage,
    ) -> PendingTransition {
        self.begin_stage(task_id, normalize_status(requested), authoritative)
    }

    /// Shows `speculative` for the task in every view; see [`Self::begin`].
    pub fn begin_stage(
        &self,
        task_id: TaskId,
        speculative: Stage,
        authoritative: Stage,
    ) -> PendingTransition {
        let applied_at = self.clock.utc();
        let mut state = self.lock();
        state.committed.entry(task_id).or_insert(authoritative);
        Self::apply_marker(&mut state, task_id, speculative, applied_at)
    }

    /// Merges `current`, freshly read from the store, as a snapshot and then
    /// shows `speculative` for it.
    pub fn begin_from(&self, current: &Task, speculative: Stage) -> PendingTransition {
        let now = self.clock.utc();
        let mut state = self.lock();
        state.merge(current, now, self.grace_window);
        state
            .committed
            .entry(current.id())
            .or_insert_with(|| current.effective_stage());
        Self::apply_marker(&mut state, current.id(), speculative, now)
    }

    fn apply_marker(
        state: &mut CoordinatorState,
        task_id: TaskId,
        speculative: Stage,
        applied_at: DateTime<Utc>,
    ) -> PendingTransition {
        let previous = state
            .displayed
            .get(&task_id)
            .or_else(|| state.committed.get(&task_id))
            .copied()
            .unwrap_or(speculative);
        state.next_generation += 1;
        let generation = state.next_generation;
        state.markers.insert(
            task_id,
            OptimisticMarker {
                speculative,
                applied_at,
                generation,
            },
        );
        state.show(task_id, speculative);
        debug!(
            %task_id,
            from = %previous,
            to = %speculative,
            generation,
            "applied speculative stage"
        );
        PendingTransition {
            task_id,
            previous,
            speculative,
            generation,
        }
    }

    /// Records `saved`, the task as the store returned it, and clears the
    /// marker set by `pending`.
    ///
    /// The saved revision is remembered even when a newer request has
    /// replaced the marker, so later pushes older than the write are
    /// ignored and a failing newer request rolls back to `saved`. Returns
    /// `false` when the marker belonged to another request.
    pub fn confirm(&self, pending: &PendingTransition, saved: &Task) -> bool {
        let task_id = pending.task_id;
        let mut state = self.lock();
        let owned = holds_generation(&state, pending);
        if owned {
            state.markers.remove(&task_id);
        }
        if state.is_current(saved) {
            state.record(saved);
            state.deferred.insert(task_id, saved.clone());
        }
        if !state.markers.contains_key(&task_id) {
            state.restore(task_id);
        }
        debug!(
            %task_id,
            stage = %pending.speculative,
            revision = saved.revision(),
            owned,
            "write confirmed"
        );
        owned
    }

    /// Puts the last committed stage back on display after the write
    /// failed.
    ///
    /// Returns `false` when a newer request has replaced the marker; the
    /// newer speculative stage stays on display until it settles.
    pub fn roll_back(&self, pending: &PendingTransition) -> bool {
        let task_id = pending.task_id;
        let mut state = self.lock();
        if !holds_generation(&state, pending) {
            return false;
        }
        state.markers.remove(&task_id);
        let restored = state.restore(task_id).unwrap_or_else(|| {
            state.show(task_id, pending.previous);
            pending.previous
        });
        warn!(
            %task_id,
            speculative = %pending.speculative,
            %restored,
            "rolled back speculative stage"
        );
        true
    }

    /// Merges an authoritative snapshot of `task` into the local state.
    pub fn apply_snapshot(&self, task: &Task) -> ReconcileOutcome {
        let now = self.clock.utc();
        self.lock().merge(task, now, self.grace_window)
    }

    /// Discards markers that have outlived the grace window and puts the
    /// newest known store state back on display: the latest deferred
    /// snapshot when one arrived, otherwise the last committed stage.
    ///
    /// Markers whose write never completes therefore converge without
    /// waiting for another push.
    pub fn sweep_expired(&self) -> Vec<ReconcileOutcome> {
        let now = self.clock.utc();
        let mut state = self.lock();
        let expired: Vec<(TaskId, OptimisticMarker)> = state
            .markers
            .iter()
            .filter(|(_, marker)| marker.is_expired(now, self.grace_window))
            .map(|(task_id, marker)| (*task_id, *marker))
            .collect();

        let mut outcomes = Vec::new();
        for (task_id, marker) in expired {
            state.markers.remove(&task_id);
            let Some(stage) = state.restore(task_id) else {
                warn!(
                    %task_id,
                    speculative = %marker.speculative,
                    "expired marker has no committed stage"
                );
                continue;
            };
            warn!(
                %task_id,
                speculative = %marker.speculative,
                %stage,
                "speculative stage expired unconfirmed"
            );
            outcomes.push(ReconcileOutcome::StaleMarkerDiscarded {
                task_id,
                stage,
                speculative: marker.speculative,
            });
        }
        outcomes
    }

    /// Drops every trace of a deleted task.
    pub fn forget(&self, task_id: TaskId) {
        let mut state = self.lock();
        state.markers.remove(&task_id);
        state.displayed.remove(&task_id);
        state.revisions.remove(&task_id);
        state.committed.remove(&task_id);
        state.deferred.remove(&task_id);
        state.views.remove_task(task_id);
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn holds_generation(state: &CoordinatorState, pending: &PendingTransition) -> bool {
    state
        .markers
        .get(&pending.task_id)
        .is_some_and(|marker| marker.generation == pending.generation)
}
