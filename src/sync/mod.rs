//! Optimistic display state and reconciliation with the push feed.
//!
//! User actions are shown immediately as speculative stages; authoritative
//! snapshots from the backing store's feed are merged in without letting a
//! slightly stale push revert a change the user has just made.
//!
//! - Marker, view and reconciliation types in [`domain`]
//! - The coordinator and feed adapter in [`services`]

pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;
