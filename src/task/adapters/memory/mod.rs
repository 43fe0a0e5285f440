//! In-memory adapters for tests and embedded use.

mod feed;
mod notifier;
mod permission;
mod store;

pub use feed::InMemoryTaskFeed;
pub use notifier::RecordingDispatcher;
pub use permission::InMemoryPermissionOracle;
pub use store::InMemoryWorkflowStore;
