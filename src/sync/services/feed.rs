//! Adapter from the push feed to the optimistic coordinator.

use super::OptimisticCoordinator;
use crate::sync::domain::ReconcileOutcome;
use crate::task::ports::{FeedFilter, FeedResult, FeedSubscription, SubscriptionHandle, TaskFeed};
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info};

/// Subscription that routes every pushed snapshot through
/// [`OptimisticCoordinator::apply_snapshot`].
///
/// After unsubscribing no further snapshot reaches the coordinator, even if
/// it was already buffered.
pub struct ReconciliationFeed<C: Clock + Send + Sync> {
    subscription: FeedSubscription,
    coordinator: Arc<OptimisticCoordinator<C>>,
}

impl<C: Clock + Send + Sync> ReconciliationFeed<C> {
    /// Subscribes to `feed` with `filter`.
    ///
    /// # Errors
    ///
    /// Returns the feed's error when the subscription cannot be opened.
    pub async fn connect<F>(
        feed: &F,
        filter: FeedFilter,
        coordinator: Arc<OptimisticCoordinator<C>>,
    ) -> FeedResult<Self>
    where
        F: TaskFeed + ?Sized,
    {
        let subscription = feed.subscribe(filter).await?;
        info!("reconciliation feed connected");
        Ok(Self {
            subscription,
            coordinator,
        })
    }

    /// Waits for the next snapshot and merges it.
    ///
    /// Returns `None` once unsubscribed or when the feed closes.
    pub async fn next(&mut self) -> Option<ReconcileOutcome> {
        let snapshot = self.subscription.next().await?;
        Some(self.coordinator.apply_snapshot(&snapshot.task))
    }

    /// Merges every snapshot already buffered without waiting, then sweeps
    /// expired markers.
    pub fn drain(&mut self) -> Vec<ReconcileOutcome> {
        let mut outcomes = Vec::new();
        while let Some(snapshot) = self.subscription.try_next() {
            outcomes.push(self.coordinator.apply_snapshot(&snapshot.task));
        }
        outcomes.extend(self.coordinator.sweep_expired());
        outcomes
    }

    /// Merges snapshots until the subscription ends, returning how many
    /// were processed.
    pub async fn run(mut self) -> usize {
        let mut processed = 0_usize;
        while let Some(outcome) = self.next().await {
            processed += 1;
            debug!(
                task_id = %outcome.task_id(),
                applied = outcome.is_applied(),
                "feed snapshot processed"
            );
        }
        info!(processed, "reconciliation feed finished");
        processed
    }

    /// Returns a handle that stops delivery from elsewhere.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.subscription.handle()
    }

    /// Stops delivery. Idempotent.
    pub fn unsubscribe(&mut self) {
        self.subscription.unsubscribe();
    }

    /// Returns whether delivery has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.subscription.is_closed()
    }

    /// Returns the coordinator snapshots are merged into.
    #[must_use]
    pub const fn coordinator(&self) -> &Arc<OptimisticCoordinator<C>> {
        &self.coordinator
    }
}
