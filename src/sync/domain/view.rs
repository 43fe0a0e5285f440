//! Named local views holding display rows for tasks.

use crate::task::domain::{ApprovalStatus, Priority, Stage, Task, TaskId};
use std::collections::HashMap;
use std::fmt;

/// Name of a cached local view, such as a board or a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewKey(String);

impl ViewKey {
    /// Creates a view key.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display row for one task inside a local view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    /// Task shown by the row.
    pub task_id: TaskId,
    /// Title at the time of the last merge.
    pub title: String,
    /// Lane the row is currently shown in.
    pub stage: Stage,
    /// Approval status at the time of the last merge.
    pub approval_status: Option<ApprovalStatus>,
    /// Priority at the time of the last merge.
    pub priority: Priority,
    /// Whether the task is archived.
    pub is_archived: bool,
}

impl TaskRow {
    /// Builds a row showing `task` in the given lane.
    #[must_use]
    pub fn from_task(task: &Task, stage: Stage) -> Self {
        Self {
            task_id: task.id(),
            title: task.title().to_owned(),
            stage,
            approval_status: task.approval_status(),
            priority: task.priority(),
            is_archived: task.is_archived(),
        }
    }
}

/// Collection of named views. A task may appear in any number of them.
#[derive(Debug, Clone, Default)]
pub struct LocalViews {
    views: HashMap<ViewKey, Vec<TaskRow>>,
}

impl LocalViews {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or replaces a view.
    pub fn insert(&mut self, key: ViewKey, rows: Vec<TaskRow>) {
        self.views.insert(key, rows);
    }

    /// Removes a view, returning its rows.
    pub fn remove(&mut self, key: &ViewKey) -> Option<Vec<TaskRow>> {
        self.views.remove(key)
    }

    /// Returns the rows of a view.
    #[must_use]
    pub fn rows(&self, key: &ViewKey) -> Option<&[TaskRow]> {
        self.views.get(key).map(Vec::as_slice)
    }

    /// Returns the registered view names.
    pub fn keys(&self) -> impl Iterator<Item = &ViewKey> {
        self.views.keys()
    }

    /// Moves every row for `task_id` into `stage`, returning how many rows
    /// changed.
    pub fn set_stage(&mut self, task_id: TaskId, stage: Stage) -> usize {
        let mut changed = 0;
        for row in self.rows_for_mut(task_id) {
            if row.stage != stage {
                row.stage = stage;
                changed += 1;
            }
        }
        changed
    }

    /// Refreshes every row for the task from `task`, shown in `stage`.
    pub fn merge(&mut self, task: &Task, stage: Stage) {
        let refreshed = TaskRow::from_task(task, stage);
        for row in self.rows_for_mut(task.id()) {
            row.clone_from(&refreshed);
        }
    }

    /// Drops every row for `task_id`.
    pub fn remove_task(&mut self, task_id: TaskId) {
        for rows in self.views.values_mut() {
            rows.retain(|row| row.task_id != task_id);
        }
    }

    fn rows_for_mut(&mut self, task_id: TaskId) -> impl Iterator<Item = &mut TaskRow> {
        self.views
            .values_mut()
            .flatten()
            .filter(move |row| row.task_id == task_id)
    }
}
