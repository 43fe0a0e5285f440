//! Domain model for the task workflow.
//!
//! The domain holds the workflow definition, the permission rules, the task
//! and assignment aggregates, and the event payloads emitted for committed
//! transitions. Nothing here performs I/O.

mod assignment;
mod error;
mod event;
mod ids;
mod permission;
mod reason;
mod status;
mod task;
mod workflow;

pub use assignment::{
    Assignment, AssignmentOutcome, AssignmentStatus, PersistedAssignmentData, ReviewResolution,
};
pub use error::{
    ParseApprovalStatusError, ParseAssignmentStatusError, ParseTaskStatusError, TaskDomainError,
    ValidationError,
};
pub use event::{
    WorkflowEvent, WorkflowEventBuilder, WorkflowEventType, assignment_event, status_change_event,
};
pub use ids::{ActorId, AssignmentId, Priority, ProjectId, TaskId};
pub use permission::{Action, ActorContext, DenialReason, Resource, TransitionKind, authorize};
pub use reason::{ApprovalNote, RejectionReason};
pub use status::{ApprovalOutcome, ApprovalStatus, TaskStatus, normalize_status, parse_status_token};
pub use task::{NewTask, PersistedTaskData, Task};
pub use workflow::{
    MoveDirection, STAGES, Stage, effective_stage, next_stage, plan_advance, plan_move,
    plan_revert, previous_stage,
};
