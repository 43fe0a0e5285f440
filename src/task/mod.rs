//! Task workflow for Tasklane.
//!
//! Tasks advance through `pending`, `in_progress`, `completed` and
//! `approved`. Assignments branch into accept and reject sub-flows with a
//! review step, and completed work passes an explicit approval gate before
//! it becomes terminal. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
