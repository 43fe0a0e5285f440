//! Services that keep local views consistent with the store.

mod coordinator;
mod feed;

pub use coordinator::OptimisticCoordinator;
pub use feed::ReconciliationFeed;
