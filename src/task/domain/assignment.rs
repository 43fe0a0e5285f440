//! Assignment aggregate and its accept/reject/review state machine.
//!
//! ```text
//! active --accept--> accepted
//! active --reject(reason)--> rejected_pending_review
//! rejected_pending_review --approve rejection--> rejected
//! rejected_pending_review --reject the rejection--> active
//! ```
//!
//! A rejected assignment is never re-activated except by overturning the
//! rejection while it is still under review.

use super::{
    ActorId, AssignmentId, ParseAssignmentStatusError, RejectionReason, TaskDomainError, TaskId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Assigned and awaiting the assignee's response.
    Active,
    /// Accepted by the assignee.
    Accepted,
    /// Rejected by the assignee, awaiting the creator's review.
    RejectedPendingReview,
    /// Rejection confirmed by the reviewer.
    Rejected,
}

impl AssignmentStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Accepted => "accepted",
            Self::RejectedPendingReview => "rejected_pending_review",
            Self::Rejected => "rejected",
        }
    }

    /// Returns whether the assignment still binds its assignee to the task.
    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AssignmentStatus {
    type Error = ParseAssignmentStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "active" => Ok(Self::Active),
            "accepted" => Ok(Self::Accepted),
            "rejected_pending_review" => Ok(Self::RejectedPendingReview),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseAssignmentStatusError(value.to_owned())),
        }
    }
}

/// Resolution recorded against an assignment in the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentOutcome {
    /// The assignee accepted.
    Accepted,
    /// The assignee rejected; review pending.
    Rejected,
    /// The reviewer confirmed the rejection.
    RejectionApproved,
    /// The reviewer overturned the rejection.
    RejectionOverturned,
}

impl AssignmentOutcome {
    /// Returns the assignment status the outcome leads to.
    #[must_use]
    pub const fn resulting_status(self) -> AssignmentStatus {
        match self {
            Self::Accepted => AssignmentStatus::Accepted,
            Self::Rejected => AssignmentStatus::RejectedPendingReview,
            Self::RejectionApproved => AssignmentStatus::Rejected,
            Self::RejectionOverturned => AssignmentStatus::Active,
        }
    }

    /// Returns the assignment status the outcome may be recorded from.
    #[must_use]
    pub const fn required_status(self) -> AssignmentStatus {
        match self {
            Self::Accepted | Self::Rejected => AssignmentStatus::Active,
            Self::RejectionApproved | Self::RejectionOverturned => {
                AssignmentStatus::RejectedPendingReview
            }
        }
    }

    /// Returns the action name used in transition errors.
    #[must_use]
    pub const fn action(self) -> &'static str {
        match self {
            Self::Accepted => "accept",
            Self::Rejected => "reject",
            Self::RejectionApproved => "approve rejection",
            Self::RejectionOverturned => "overturn rejection",
        }
    }
}

/// Result of resolving a rejection under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewResolution {
    /// This call resolved the review.
    Resolved,
    /// The review had already been resolved; nothing changed.
    AlreadyResolved,
}

/// A task assigned to one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    id: AssignmentId,
    task_id: TaskId,
    assignee: ActorId,
    assigned_by: ActorId,
    status: AssignmentStatus,
    rejection_reason: Option<RejectionReason>,
    assigned_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedAssignmentData {
    /// Persisted assignment identifier.
    pub id: AssignmentId,
    /// Assigned task.
    pub task_id: TaskId,
    /// Actor the task is assigned to.
    pub assignee: ActorId,
    /// Actor who created the assignment.
    pub assigned_by: ActorId,
    /// Persisted status.
    pub status: AssignmentStatus,
    /// Reason given for a rejection, if any.
    pub rejection_reason: Option<RejectionReason>,
    /// Assignment timestamp.
    pub assigned_at: DateTime<Utc>,
    /// Acceptance timestamp.
    pub accepted_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Latest mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    /// Creates an active assignment under a caller-chosen identifier.
    #[must_use]
    pub fn new(
        id: AssignmentId,
        task_id: TaskId,
        assignee: ActorId,
        assigned_by: ActorId,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id,
            task_id,
            assignee,
            assigned_by,
            status: AssignmentStatus::Active,
            rejection_reason: None,
            assigned_at: timestamp,
            accepted_at: None,
            completed_at: None,
            updated_at: timestamp,
        }
    }

    /// Reconstructs an assignment from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedAssignmentData) -> Self {
        Self {
            id: data.id,
            task_id: data.task_id,
            assignee: data.assignee,
            assigned_by: data.assigned_by,
            status: data.status,
            rejection_reason: data.rejection_reason,
            assigned_at: data.assigned_at,
            accepted_at: data.accepted_at,
            completed_at: data.completed_at,
            updated_at: data.updated_at,
        }
    }

    /// Decomposes the assignment into its persisted representation.
    #[must_use]
    pub fn into_persisted(self) -> PersistedAssignmentData {
        PersistedAssignmentData {
            id: self.id,
            task_id: self.task_id,
            assignee: self.assignee,
            assigned_by: self.assigned_by,
            status: self.status,
            rejection_reason: self.rejection_reason,
            assigned_at: self.assigned_at,
            accepted_at: self.accepted_at,
            completed_at: self.completed_at,
            updated_at: self.updated_at,
        }
    }

    /// Returns the assignment identifier.
    #[must_use]
    pub const fn id(&self) -> AssignmentId {
        self.id
    }

    /// Returns the assigned task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the assignee.
    #[must_use]
    pub const fn assignee(&self) -> ActorId {
        self.assignee
    }

    /// Returns the actor who made the assignment.
    #[must_use]
    pub const fn assigned_by(&self) -> ActorId {
        self.assigned_by
    }

    /// Returns the assignment status.
    #[must_use]
    pub const fn status(&self) -> AssignmentStatus {
        self.status
    }

    /// Returns the rejection reason while a rejection stands.
    #[must_use]
    pub const fn rejection_reason(&self) -> Option<&RejectionReason> {
        self.rejection_reason.as_ref()
    }

    /// Returns the assignment timestamp.
    #[must_use]
    pub const fn assigned_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }

    /// Returns the acceptance timestamp.
    #[must_use]
    pub const fn accepted_at(&self) -> Option<DateTime<Utc>> {
        self.accepted_at
    }

    /// Returns the completion timestamp.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Accepts an active assignment.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidAssignmentTransition`] unless the
    /// assignment is active.
    pub fn accept(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.ensure_status(AssignmentStatus::Active, "accept")?;
        let timestamp = clock.utc();
        self.status = AssignmentStatus::Accepted;
        self.accepted_at = Some(timestamp);
        self.updated_at = timestamp;
        Ok(())
    }

    /// Rejects an active assignment, sending it to review.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidAssignmentTransition`] unless the
    /// assignment is active.
    pub fn reject(
        &mut self,
        reason: RejectionReason,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.ensure_status(AssignmentStatus::Active, "reject")?;
        self.status = AssignmentStatus::RejectedPendingReview;
        self.rejection_reason = Some(reason);
        self.touch(clock);
        Ok(())
    }

    /// Confirms a rejection under review.
    ///
    /// Calling this once the review has been resolved either way is a no-op.
    pub fn approve_rejection(&mut self, clock: &impl Clock) -> ReviewResolution {
        if self.status != AssignmentStatus::RejectedPendingReview {
            return ReviewResolution::AlreadyResolved;
        }
        self.status = AssignmentStatus::Rejected;
        self.touch(clock);
        ReviewResolution::Resolved
    }

    /// Overturns a rejection under review, handing the task back to the
    /// same assignee and clearing the rejection record.
    ///
    /// Calling this once the review has been resolved either way is a no-op.
    pub fn overturn_rejection(&mut self, clock: &impl Clock) -> ReviewResolution {
        if self.status != AssignmentStatus::RejectedPendingReview {
            return ReviewResolution::AlreadyResolved;
        }
        self.status = AssignmentStatus::Active;
        self.rejection_reason = None;
        self.touch(clock);
        ReviewResolution::Resolved
    }

    /// Stamps the completion time on an accepted assignment.
    ///
    /// Returns `true` when the timestamp was newly recorded.
    pub fn mark_completed(&mut self, clock: &impl Clock) -> bool {
        if self.status != AssignmentStatus::Accepted || self.completed_at.is_some() {
            return false;
        }
        let timestamp = clock.utc();
        self.completed_at = Some(timestamp);
        self.updated_at = timestamp;
        true
    }

    fn ensure_status(
        &self,
        expected: AssignmentStatus,
        action: &'static str,
    ) -> Result<(), TaskDomainError> {
        if self.status == expected {
            return Ok(());
        }
        Err(TaskDomainError::InvalidAssignmentTransition {
            assignment_id: self.id,
            from: self.status,
            action,
        })
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
