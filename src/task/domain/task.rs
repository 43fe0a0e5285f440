//! Task aggregate root and the completion approval gate.

use super::{
    ActorId, ApprovalNote, ApprovalStatus, Priority, ProjectId, Stage, TaskDomainError, TaskId,
    TaskStatus, ValidationError, effective_stage, plan_advance, plan_revert,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Parameter object describing a task to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    id: TaskId,
    title: String,
    created_by: ActorId,
    description: Option<String>,
    priority: Priority,
    due_date: Option<DateTime<Utc>>,
    project_id: Option<ProjectId>,
}

impl NewTask {
    /// Creates a task description with the required fields.
    ///
    /// The identifier is fixed here so that resubmitting the same value
    /// never creates a second task.
    #[must_use]
    pub fn new(title: impl Into<String>, created_by: ActorId) -> Self {
        Self {
            id: TaskId::new(),
            title: title.into(),
            created_by,
            description: None,
            priority: Priority::default(),
            due_date: None,
            project_id: None,
        }
    }

    /// Sets the task description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the task priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the due date.
    #[must_use]
    pub const fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Sets the owning project.
    #[must_use]
    pub const fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Returns the identifier the task will be stored under.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the actor creating the task.
    #[must_use]
    pub const fn created_by(&self) -> ActorId {
        self.created_by
    }
}

/// Work item moving through the four-stage workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    id: TaskId,
    title: String,
    description: Option<String>,
    status: TaskStatus,
    approval_status: Option<ApprovalStatus>,
    review_note: Option<ApprovalNote>,
    created_by: ActorId,
    priority: Priority,
    due_date: Option<DateTime<Utc>>,
    project_id: Option<ProjectId>,
    is_archived: bool,
    is_unassigned: bool,
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted title.
    pub title: String,
    /// Persisted description.
    pub description: Option<String>,
    /// Persisted raw status.
    pub status: TaskStatus,
    /// Persisted approval status.
    pub approval_status: Option<ApprovalStatus>,
    /// Latest reviewer note from a rejected approval.
    pub review_note: Option<ApprovalNote>,
    /// Creator of the task.
    pub created_by: ActorId,
    /// Persisted priority.
    pub priority: Priority,
    /// Persisted due date.
    pub due_date: Option<DateTime<Utc>>,
    /// Persisted project reference.
    pub project_id: Option<ProjectId>,
    /// Whether the task is archived.
    pub is_archived: bool,
    /// Whether the task sits in the unassigned pool.
    pub is_unassigned: bool,
    /// Monotonic store revision.
    pub revision: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a pending, unassigned task.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyTitle`] when the title is blank.
    pub fn create(new_task: NewTask, clock: &impl Clock) -> Result<Self, ValidationError> {
        let title = new_task.title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let timestamp = clock.utc();
        Ok(Self {
            id: new_task.id,
            title: title.to_owned(),
            description: new_task.description,
            status: TaskStatus::Pending,
            approval_status: None,
            review_note: None,
            created_by: new_task.created_by,
            priority: new_task.priority,
            due_date: new_task.due_date,
            project_id: new_task.project_id,
            is_archived: false,
            is_unassigned: true,
            revision: 0,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            title: data.title,
            description: data.description,
            status: data.status,
            approval_status: data.approval_status,
            review_note: data.review_note,
            created_by: data.created_by,
            priority: data.priority,
            due_date: data.due_date,
            project_id: data.project_id,
            is_archived: data.is_archived,
            is_unassigned: data.is_unassigned,
            revision: data.revision,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Decomposes the task into its persisted representation.
    #[must_use]
    pub fn into_persisted(self) -> PersistedTaskData {
        PersistedTaskData {
            id: self.id,
            title: self.title,
            description: self.description,
            status: self.status,
            approval_status: self.approval_status,
            review_note: self.review_note,
            created_by: self.created_by,
            priority: self.priority,
            due_date: self.due_date,
            project_id: self.project_id,
            is_archived: self.is_archived,
            is_unassigned: self.is_unassigned,
            revision: self.revision,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the task description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the raw stored status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the approval status, if the approval gate has been entered.
    #[must_use]
    pub const fn approval_status(&self) -> Option<ApprovalStatus> {
        self.approval_status
    }

    /// Returns the latest reviewer note from a rejected approval.
    #[must_use]
    pub const fn review_note(&self) -> Option<&ApprovalNote> {
        self.review_note.as_ref()
    }

    /// Returns the creator of the task.
    #[must_use]
    pub const fn created_by(&self) -> ActorId {
        self.created_by
    }

    /// Returns the task priority.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the due date, if any.
    #[must_use]
    pub const fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    /// Returns the owning project, if any.
    #[must_use]
    pub const fn project_id(&self) -> Option<ProjectId> {
        self.project_id
    }

    /// Returns whether the task is archived.
    #[must_use]
    pub const fn is_archived(&self) -> bool {
        self.is_archived
    }

    /// Returns whether the task sits in the unassigned pool.
    #[must_use]
    pub const fn is_unassigned(&self) -> bool {
        self.is_unassigned
    }

    /// Returns the store revision the task was read at.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the display stage derived from status and approval status.
    #[must_use]
    pub const fn effective_stage(&self) -> Stage {
        effective_stage(self.status, self.approval_status)
    }

    /// Moves the task forward by one stage.
    ///
    /// # Errors
    ///
    /// Returns the planning errors of [`plan_advance`].
    pub fn advance(&mut self, clock: &impl Clock) -> Result<Stage, TaskDomainError> {
        let target = plan_advance(self)?;
        self.write_status(TaskStatus::from(target), clock);
        Ok(target)
    }

    /// Moves the task back to `target`, or one stage back when `None`.
    ///
    /// Reverting leaves the approval sub-flow entirely.
    ///
    /// # Errors
    ///
    /// Returns the planning errors of [`plan_revert`].
    pub fn revert(
        &mut self,
        target: Option<Stage>,
        clock: &impl Clock,
    ) -> Result<Stage, TaskDomainError> {
        let resolved = plan_revert(self, target)?;
        self.write_status(TaskStatus::from(resolved), clock);
        Ok(resolved)
    }

    /// Opens the approval gate on completed work.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::TaskArchived`] for archived tasks and
    /// [`TaskDomainError::InvalidApprovalTransition`] unless the task is
    /// completed with no approval pending or granted.
    pub fn request_approval(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.ensure_active()?;
        let eligible = self.status == TaskStatus::Completed
            && !matches!(
                self.approval_status,
                Some(ApprovalStatus::Pending | ApprovalStatus::Approved)
            );
        if !eligible {
            return Err(self.approval_violation("request approval"));
        }
        self.approval_status = Some(ApprovalStatus::Pending);
        self.touch(clock);
        Ok(())
    }

    /// Grants a pending approval request, making the task terminal.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidApprovalTransition`] unless an
    /// approval request is pending.
    pub fn approve(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.ensure_approval_pending("approve")?;
        self.approval_status = Some(ApprovalStatus::Approved);
        self.touch(clock);
        Ok(())
    }

    /// Sends pending work back to the active board with a reviewer note.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidApprovalTransition`] unless an
    /// approval request is pending.
    pub fn reject_approval(
        &mut self,
        note: ApprovalNote,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.ensure_approval_pending("reject approval")?;
        self.status = TaskStatus::InProgress;
        self.approval_status = None;
        self.review_note = Some(note);
        self.touch(clock);
        Ok(())
    }

    /// Archives the task. Archiving an archived task changes nothing.
    pub fn archive(&mut self, clock: &impl Clock) {
        if !self.is_archived {
            self.is_archived = true;
            self.touch(clock);
        }
    }

    /// Restores an archived task.
    pub fn restore(&mut self, clock: &impl Clock) {
        if self.is_archived {
            self.is_archived = false;
            self.touch(clock);
        }
    }

    /// Sets or clears the unassigned pool flag.
    pub fn set_unassigned(&mut self, unassigned: bool, clock: &impl Clock) {
        if self.is_unassigned != unassigned {
            self.is_unassigned = unassigned;
            self.touch(clock);
        }
    }

    fn write_status(&mut self, status: TaskStatus, clock: &impl Clock) {
        self.status = status;
        self.approval_status = None;
        self.touch(clock);
    }

    fn ensure_active(&self) -> Result<(), TaskDomainError> {
        if self.is_archived {
            return Err(TaskDomainError::TaskArchived(self.id));
        }
        Ok(())
    }

    fn ensure_approval_pending(&self, action: &'static str) -> Result<(), TaskDomainError> {
        self.ensure_active()?;
        if self.approval_status == Some(ApprovalStatus::Pending) {
            Ok(())
        } else {
            Err(self.approval_violation(action))
        }
    }

    const fn approval_violation(&self, action: &'static str) -> TaskDomainError {
        TaskDomainError::InvalidApprovalTransition {
            task_id: self.id,
            action,
            stage: self.effective_stage(),
        }
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
