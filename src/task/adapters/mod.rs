//! Adapter implementations for the task workflow ports.
//!
//! # Available Adapters
//!
//! - [`memory::InMemoryWorkflowStore`]: thread-safe store that also pushes
//!   snapshots through an [`memory::InMemoryTaskFeed`]
//! - [`memory::InMemoryPermissionOracle`]: grant table backed by the
//!   in-memory store's assignments
//! - [`memory::RecordingDispatcher`]: collects dispatched events

pub mod memory;
