//! Port contracts for the task workflow.
//!
//! Ports define the collaborators the workflow core consumes: the backing
//! store, its real-time feed, the permission oracle, and the notification
//! dispatcher that receives committed workflow events.

pub mod feed;
pub mod notifier;
pub mod permission;
pub mod store;

pub use feed::{
    FeedError, FeedFilter, FeedResult, FeedSubscription, SubscriptionHandle, TaskFeed,
    TaskSnapshot,
};
pub use notifier::{NotificationDispatcher, NotificationError, NotificationResult};
pub use permission::{PermissionOracle, PermissionOracleError, PermissionResult};
pub use store::{StoreError, StoreResult, WorkflowStore};
