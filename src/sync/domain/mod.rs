//! Pure state types for optimistic display and reconciliation.

mod marker;
mod reconcile;
mod view;

pub use marker::{OptimisticMarker, PendingTransition};
pub use reconcile::{ReconcileOutcome, reconcile};
pub use view::{LocalViews, TaskRow, ViewKey};
