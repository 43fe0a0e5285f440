//! Tasklane: task lifecycle and assignment workflow core.
//!
//! This crate moves work items through ordered stages, runs the assignment
//! and completion-approval sub-flows, and keeps locally displayed state
//! consistent while speculative changes and authoritative pushes race each
//! other.
//!
//! # Architecture
//!
//! Tasklane follows hexagonal architecture principles:
//!
//! - **Domain**: Pure workflow rules with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for the store, feed, permission
//!   oracle and notification dispatcher
//! - **Adapters**: In-memory implementations of those ports
//!
//! # Modules
//!
//! - [`config`]: Engine configuration
//! - [`sync`]: Optimistic display state and reconciliation
//! - [`task`]: Workflow definition, permission gate and lifecycle services

pub mod config;
pub mod sync;
pub mod task;
