//! In-memory broadcast feed of task snapshots.

use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;

use crate::task::ports::{
    FeedFilter, FeedResult, FeedSubscription, SubscriptionHandle, TaskFeed, TaskSnapshot,
};

/// Thread-safe fan-out of snapshots to filtered subscribers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskFeed {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

#[derive(Debug)]
struct Subscriber {
    filter: FeedFilter,
    sender: mpsc::UnboundedSender<TaskSnapshot>,
    handle: SubscriptionHandle,
}

impl Subscriber {
    fn is_gone(&self) -> bool {
        self.handle.is_closed() || self.sender.is_closed()
    }
}

impl InMemoryTaskFeed {
    /// Creates a feed with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `snapshot` to every open subscriber whose filter matches.
    ///
    /// Returns the number of subscribers the snapshot was delivered to.
    /// Closed subscriptions are pruned along the way.
    pub fn publish(&self, snapshot: &TaskSnapshot) -> usize {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|subscriber| !subscriber.is_gone());
        subscribers
            .iter()
            .filter(|subscriber| subscriber.filter.matches(&snapshot.task))
            .filter(|subscriber| subscriber.sender.send(snapshot.clone()).is_ok())
            .count()
    }

    /// Returns the number of subscriptions still open.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|subscriber| !subscriber.is_gone())
            .count()
    }
}

#[async_trait]
impl TaskFeed for InMemoryTaskFeed {
    async fn subscribe(&self, filter: FeedFilter) -> FeedResult<FeedSubscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = SubscriptionHandle::new();
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                filter,
                sender,
                handle: handle.clone(),
            });
        Ok(FeedSubscription::new(receiver, handle))
    }
}
