//! In-memory workflow store that pushes snapshots on every task mutation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::{Clock, DefaultClock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::InMemoryTaskFeed;
use crate::task::{
    domain::{
        ActorId, ApprovalNote, ApprovalOutcome, ApprovalStatus, Assignment, AssignmentId,
        AssignmentOutcome, AssignmentStatus, PersistedAssignmentData, PersistedTaskData,
        RejectionReason, Task, TaskDomainError, TaskId, TaskStatus, effective_stage,
    },
    ports::{
        FeedFilter, FeedResult, FeedSubscription, StoreError, StoreResult, TaskFeed,
        TaskSnapshot, WorkflowStore,
    },
};

/// Thread-safe in-memory store for tasks and assignments.
///
/// Each task mutation bumps the task's revision and publishes a snapshot
/// through [`Self::feed`]. Commands that would not change anything leave the
/// revision untouched and publish nothing, which makes them safe to replay.
#[derive(Clone)]
pub struct InMemoryWorkflowStore {
    state: Arc<RwLock<InMemoryWorkflowState>>,
    feed: InMemoryTaskFeed,
    clock: Arc<dyn Clock + Send + Sync>,
    injected_failures: Arc<AtomicUsize>,
}

#[derive(Debug, Default)]
struct InMemoryWorkflowState {
    tasks: HashMap<TaskId, Task>,
    assignments: HashMap<AssignmentId, Assignment>,
    task_index: HashMap<TaskId, Vec<AssignmentId>>,
}

impl Default for InMemoryWorkflowStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }
}

impl InMemoryWorkflowStore {
    /// Creates an empty store stamped by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            state: Arc::default(),
            feed: InMemoryTaskFeed::new(),
            clock,
            injected_failures: Arc::default(),
        }
    }

    /// Returns the feed snapshots are published on.
    #[must_use]
    pub const fn feed(&self) -> &InMemoryTaskFeed {
        &self.feed
    }

    /// Makes the next `count` write commands fail with
    /// [`StoreError::Unavailable`] without touching any state.
    pub fn fail_next_writes(&self, count: usize) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    /// Returns whether `actor` holds an accepted assignment on the task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] when the state lock is poisoned.
    pub fn holds_accepted_assignment(&self, actor: ActorId, task_id: TaskId) -> StoreResult<bool> {
        let state = self.read_state()?;
        Ok(assignments_of(&state, task_id).any(|assignment| {
            assignment.assignee() == actor && assignment.status() == AssignmentStatus::Accepted
        }))
    }

    fn read_state(&self) -> StoreResult<RwLockReadGuard<'_, InMemoryWorkflowState>> {
        self.state
            .read()
            .map_err(|err| StoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write_state(&self) -> StoreResult<RwLockWriteGuard<'_, InMemoryWorkflowState>> {
        self.state
            .write()
            .map_err(|err| StoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn take_injected_failure(&self) -> StoreResult<()> {
        let injected = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected write failure".to_owned()));
        }
        Ok(())
    }

    /// Applies `change` to a task, bumping its revision and publishing a
    /// snapshot only when something actually changed. A refused change
    /// leaves the task untouched.
    fn mutate_task(
        &self,
        task_id: TaskId,
        change: impl FnOnce(&mut PersistedTaskData) -> StoreResult<()>,
    ) -> StoreResult<Task> {
        self.take_injected_failure()?;
        let mut state = self.write_state()?;
        let current = state
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or(StoreError::TaskNotFound(task_id))?;

        let mut data = current.clone().into_persisted();
        change(&mut data)?;
        if Task::from_persisted(data.clone()) == current {
            return Ok(current);
        }

        let now = self.clock.utc();
        data.revision += 1;
        data.updated_at = now;
        let updated = Task::from_persisted(data);
        state.tasks.insert(task_id, updated.clone());
        self.feed.publish(&TaskSnapshot::new(updated.clone(), now));
        Ok(updated)
    }

    fn mutate_assignment(
        &self,
        assignment_id: AssignmentId,
        change: impl FnOnce(&mut PersistedAssignmentData, DateTime<Utc>) -> StoreResult<()>,
    ) -> StoreResult<Assignment> {
        self.take_injected_failure()?;
        let mut state = self.write_state()?;
        let current = state
            .assignments
            .get(&assignment_id)
            .cloned()
            .ok_or(StoreError::AssignmentNotFound(assignment_id))?;

        let now = self.clock.utc();
        let mut data = current.clone().into_persisted();
        change(&mut data, now)?;
        if Assignment::from_persisted(data.clone()) == current {
            return Ok(current);
        }

        data.updated_at = now;
        let updated = Assignment::from_persisted(data);
        state.assignments.insert(assignment_id, updated.clone());
        Ok(updated)
    }
}

fn approval_conflict(
    task_id: TaskId,
    data: &PersistedTaskData,
    action: &'static str,
) -> StoreError {
    StoreError::Conflict(TaskDomainError::InvalidApprovalTransition {
        task_id,
        action,
        stage: effective_stage(data.status, data.approval_status),
    })
}

fn assignments_of(
    state: &InMemoryWorkflowState,
    task_id: TaskId,
) -> impl Iterator<Item = &Assignment> {
    state
        .task_index
        .get(&task_id)
        .into_iter()
        .flatten()
        .filter_map(|id| state.assignments.get(id))
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn create_task(&self, task: &Task) -> StoreResult<Task> {
        self.take_injected_failure()?;
        let mut state = self.write_state()?;
        if let Some(existing) = state.tasks.get(&task.id()) {
            return Ok(existing.clone());
        }

        let now = self.clock.utc();
        let mut data = task.clone().into_persisted();
        data.revision += 1;
        let stored = Task::from_persisted(data);
        state.tasks.insert(stored.id(), stored.clone());
        self.feed.publish(&TaskSnapshot::new(stored.clone(), now));
        Ok(stored)
    }

    async fn find_task(&self, task_id: TaskId) -> StoreResult<Option<Task>> {
        let state = self.read_state()?;
        Ok(state.tasks.get(&task_id).cloned())
    }

    async fn update_status(&self, task_id: TaskId, status: TaskStatus) -> StoreResult<Task> {
        self.mutate_task(task_id, |data| {
            if data.approval_status == Some(ApprovalStatus::Pending) {
                return Err(StoreError::Conflict(TaskDomainError::ApprovalPending(task_id)));
            }
            data.status = status;
            data.approval_status = None;
            Ok(())
        })
    }

    async fn set_archived(&self, task_id: TaskId, archived: bool) -> StoreResult<Task> {
        self.mutate_task(task_id, |data| {
            data.is_archived = archived;
            Ok(())
        })
    }

    async fn set_unassigned(&self, task_id: TaskId, unassigned: bool) -> StoreResult<Task> {
        self.mutate_task(task_id, |data| {
            data.is_unassigned = unassigned;
            Ok(())
        })
    }

    async fn delete_task(&self, task_id: TaskId) -> StoreResult<()> {
        self.take_injected_failure()?;
        let mut state = self.write_state()?;
        state.tasks.remove(&task_id);
        for assignment_id in state.task_index.remove(&task_id).unwrap_or_default() {
            state.assignments.remove(&assignment_id);
        }
        Ok(())
    }

    async fn create_assignment(&self, assignment: &Assignment) -> StoreResult<Assignment> {
        self.take_injected_failure()?;
        let mut state = self.write_state()?;
        if let Some(existing) = state.assignments.get(&assignment.id()) {
            return Ok(existing.clone());
        }
        if !state.tasks.contains_key(&assignment.task_id()) {
            return Err(StoreError::TaskNotFound(assignment.task_id()));
        }

        state
            .task_index
            .entry(assignment.task_id())
            .or_default()
            .push(assignment.id());
        state.assignments.insert(assignment.id(), assignment.clone());
        Ok(assignment.clone())
    }

    async fn find_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> StoreResult<Option<Assignment>> {
        let state = self.read_state()?;
        Ok(state.assignments.get(&assignment_id).cloned())
    }

    async fn assignments_for_task(&self, task_id: TaskId) -> StoreResult<Vec<Assignment>> {
        let state = self.read_state()?;
        Ok(assignments_of(&state, task_id).cloned().collect())
    }

    async fn record_assignment_resolution(
        &self,
        assignment_id: AssignmentId,
        outcome: AssignmentOutcome,
        reason: Option<&RejectionReason>,
    ) -> StoreResult<Assignment> {
        self.mutate_assignment(assignment_id, |data, now| {
            let target = outcome.resulting_status();
            if data.status == target {
                return Ok(());
            }
            if data.status != outcome.required_status() {
                return Err(StoreError::Conflict(
                    TaskDomainError::InvalidAssignmentTransition {
                        assignment_id,
                        from: data.status,
                        action: outcome.action(),
                    },
                ));
            }
            data.status = target;
            match outcome {
                AssignmentOutcome::Accepted => data.accepted_at = Some(now),
                AssignmentOutcome::Rejected => data.rejection_reason = reason.cloned(),
                AssignmentOutcome::RejectionOverturned => data.rejection_reason = None,
                AssignmentOutcome::RejectionApproved => {}
            }
            Ok(())
        })
    }

    async fn mark_assignment_completed(
        &self,
        assignment_id: AssignmentId,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<Assignment> {
        self.mutate_assignment(assignment_id, |data, _| {
            data.completed_at = data.completed_at.or(Some(completed_at));
            Ok(())
        })
    }

    async fn request_approval(&self, task_id: TaskId, _actor_id: ActorId) -> StoreResult<Task> {
        self.mutate_task(task_id, |data| match (data.status, data.approval_status) {
            (_, Some(ApprovalStatus::Pending)) => Ok(()),
            (TaskStatus::Completed, None | Some(ApprovalStatus::Rejected)) => {
                data.approval_status = Some(ApprovalStatus::Pending);
                Ok(())
            }
            _ => Err(approval_conflict(task_id, data, "request approval")),
        })
    }

    async fn resolve_approval(
        &self,
        task_id: TaskId,
        _actor_id: ActorId,
        outcome: ApprovalOutcome,
        note: Option<&ApprovalNote>,
    ) -> StoreResult<Task> {
        self.mutate_task(task_id, |data| {
            let pending = data.status == TaskStatus::Completed
                && data.approval_status == Some(ApprovalStatus::Pending);
            match outcome {
                ApprovalOutcome::Approved if pending => {
                    data.approval_status = Some(ApprovalStatus::Approved);
                    Ok(())
                }
                ApprovalOutcome::Approved
                    if data.status == TaskStatus::Completed
                        && data.approval_status == Some(ApprovalStatus::Approved) =>
                {
                    Ok(())
                }
                ApprovalOutcome::Rejected if pending => {
                    data.status = TaskStatus::InProgress;
                    data.approval_status = None;
                    data.review_note = note.cloned();
                    Ok(())
                }
                ApprovalOutcome::Rejected
                    if data.status == TaskStatus::InProgress
                        && data.approval_status.is_none()
                        && data.review_note.as_ref() == note =>
                {
                    Ok(())
                }
                ApprovalOutcome::Approved => Err(approval_conflict(task_id, data, "approve")),
                ApprovalOutcome::Rejected => {
                    Err(approval_conflict(task_id, data, "reject approval"))
                }
            }
        })
    }
}

#[async_trait]
impl TaskFeed for InMemoryWorkflowStore {
    async fn subscribe(&self, filter: FeedFilter) -> FeedResult<FeedSubscription> {
        self.feed.subscribe(filter).await
    }
}
