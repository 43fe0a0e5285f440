//! Workflow event payloads handed to the notification dispatcher.

use super::{ActorId, Assignment, AssignmentId, Task, TaskId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of committed workflow transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEventType {
    /// A task was created.
    TaskCreated,
    /// A task moved forward.
    StatusAdvanced,
    /// A task moved backward.
    StatusReverted,
    /// A task was archived.
    TaskArchived,
    /// An archived task was restored.
    TaskRestored,
    /// A task was deleted.
    TaskDeleted,
    /// A task was assigned.
    AssignmentCreated,
    /// An assignee accepted.
    AssignmentAccepted,
    /// An assignee rejected; review pending.
    AssignmentRejected,
    /// A reviewer confirmed a rejection.
    RejectionApproved,
    /// A reviewer overturned a rejection.
    RejectionOverturned,
    /// Completed work entered the approval gate.
    ApprovalRequested,
    /// Completed work was approved.
    ApprovalGranted,
    /// Completed work was sent back.
    ApprovalRejected,
}

impl WorkflowEventType {
    /// Returns the canonical event type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreated => "task_created",
            Self::StatusAdvanced => "status_advanced",
            Self::StatusReverted => "status_reverted",
            Self::TaskArchived => "task_archived",
            Self::TaskRestored => "task_restored",
            Self::TaskDeleted => "task_deleted",
            Self::AssignmentCreated => "assignment_created",
            Self::AssignmentAccepted => "assignment_accepted",
            Self::AssignmentRejected => "assignment_rejected",
            Self::RejectionApproved => "rejection_approved",
            Self::RejectionOverturned => "rejection_overturned",
            Self::ApprovalRequested => "approval_requested",
            Self::ApprovalGranted => "approval_granted",
            Self::ApprovalRejected => "approval_rejected",
        }
    }
}

impl fmt::Display for WorkflowEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload describing one committed transition.
///
/// Serialises to camelCase JSON:
///
/// ```
/// use tasklane::task::domain::{ActorId, TaskId, WorkflowEvent, WorkflowEventType};
/// use mockable::DefaultClock;
///
/// let event = WorkflowEvent::builder(
///     WorkflowEventType::StatusAdvanced,
///     TaskId::new(),
///     ActorId::new(),
/// )
/// .with_states("pending", "in_progress")
/// .build(&DefaultClock);
/// let json = serde_json::to_value(&event).expect("serialisable");
/// assert_eq!(json["type"], "status_advanced");
/// assert_eq!(json["newState"], "in_progress");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEvent {
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: WorkflowEventType,
    /// Task the transition applied to.
    pub task_id: TaskId,
    /// Assignment involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<AssignmentId>,
    /// Actor who performed the transition.
    pub actor_id: ActorId,
    /// State before the transition.
    pub previous_state: String,
    /// State after the transition.
    pub new_state: String,
    /// Rejection reason or reviewer note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Actors the dispatcher should notify.
    pub recipients: Vec<ActorId>,
    /// When the transition was committed.
    pub occurred_at: DateTime<Utc>,
}

impl WorkflowEvent {
    /// Starts building an event payload.
    #[must_use]
    pub const fn builder(
        event_type: WorkflowEventType,
        task_id: TaskId,
        actor_id: ActorId,
    ) -> WorkflowEventBuilder {
        WorkflowEventBuilder {
            event_type,
            task_id,
            actor_id,
            assignment_id: None,
            previous_state: String::new(),
            new_state: String::new(),
            reason: None,
            recipients: Vec::new(),
        }
    }
}

/// Builder for [`WorkflowEvent`].
#[derive(Debug, Clone)]
pub struct WorkflowEventBuilder {
    event_type: WorkflowEventType,
    task_id: TaskId,
    actor_id: ActorId,
    assignment_id: Option<AssignmentId>,
    previous_state: String,
    new_state: String,
    reason: Option<String>,
    recipients: Vec<ActorId>,
}

impl WorkflowEventBuilder {
    /// Sets the involved assignment.
    #[must_use]
    pub const fn with_assignment(mut self, assignment_id: AssignmentId) -> Self {
        self.assignment_id = Some(assignment_id);
        self
    }

    /// Sets the before and after states.
    #[must_use]
    pub fn with_states(mut self, previous: impl Into<String>, new: impl Into<String>) -> Self {
        self.previous_state = previous.into();
        self.new_state = new.into();
        self
    }

    /// Sets the free-text reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Adds a recipient, skipping the acting actor and duplicates.
    #[must_use]
    pub fn notify(mut self, recipient: ActorId) -> Self {
        if recipient != self.actor_id && !self.recipients.contains(&recipient) {
            self.recipients.push(recipient);
        }
        self
    }

    /// Adds several recipients.
    #[must_use]
    pub fn notify_all(self, recipients: impl IntoIterator<Item = ActorId>) -> Self {
        recipients
            .into_iter()
            .fold(self, |builder, recipient| builder.notify(recipient))
    }

    /// Finishes the payload, stamping it with the clock's time.
    #[must_use]
    pub fn build(self, clock: &impl Clock) -> WorkflowEvent {
        WorkflowEvent {
            event_type: self.event_type,
            task_id: self.task_id,
            assignment_id: self.assignment_id,
            actor_id: self.actor_id,
            previous_state: self.previous_state,
            new_state: self.new_state,
            reason: self.reason,
            recipients: self.recipients,
            occurred_at: clock.utc(),
        }
    }
}

/// Starts the event for a status change between two task states.
///
/// The creator is always notified; callers add assignees and reasons.
#[must_use]
pub fn status_change_event(
    event_type: WorkflowEventType,
    actor: ActorId,
    before: &Task,
    after: &Task,
) -> WorkflowEventBuilder {
    WorkflowEvent::builder(event_type, after.id(), actor)
        .with_states(before.effective_stage().as_str(), after.effective_stage().as_str())
        .notify(after.created_by())
}

/// Shapes the event for an assignment status change.
#[must_use]
pub fn assignment_event(
    event_type: WorkflowEventType,
    actor: ActorId,
    before: &Assignment,
    after: &Assignment,
    task: &Task,
    clock: &impl Clock,
) -> WorkflowEvent {
    let builder = WorkflowEvent::builder(event_type, after.task_id(), actor)
        .with_assignment(after.id())
        .with_states(before.status().as_str(), after.status().as_str())
        .notify(task.created_by())
        .notify(after.assignee());
    match after.rejection_reason() {
        Some(reason) => builder.with_reason(reason.as_str()).build(clock),
        None => builder.build(clock),
    }
}
