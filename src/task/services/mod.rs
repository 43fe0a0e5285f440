//! Application services for the task workflow.
//!
//! [`WorkflowEngine`] is the entry point; the lifecycle services behind it
//! share one [`WorkflowContext`].

mod approval;
mod assignment;
mod command;
mod context;
mod engine;
mod error;
mod gate;
mod lifecycle;

pub use approval::ApprovalGate;
pub use assignment::AssignmentLifecycleManager;
pub use command::{RetryHandle, TransitionCommand, TransitionOutcome};
pub use context::WorkflowContext;
pub use engine::WorkflowEngine;
pub use error::{WorkflowError, WorkflowResult};
pub use gate::PermissionGate;
pub use lifecycle::TaskLifecycleService;
