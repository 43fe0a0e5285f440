//! Shared fixtures for the in-memory workflow integration tests.

use crate::test_helpers::ManualClock;
use eyre::{Result, eyre};
use rstest::fixture;
use std::sync::Arc;
use tasklane::config::WorkflowConfig;
use tasklane::task::{
    adapters::memory::{InMemoryPermissionOracle, InMemoryWorkflowStore, RecordingDispatcher},
    domain::{Action, ActorId, AssignmentId, NewTask, Resource, Stage, Task, TaskId},
    ports::WorkflowStore,
    services::{TransitionCommand, WorkflowEngine},
};

/// Engine type used throughout the integration tests.
pub type TestEngine = WorkflowEngine<
    InMemoryWorkflowStore,
    InMemoryPermissionOracle,
    RecordingDispatcher,
    ManualClock,
>;

/// An engine wired to in-memory adapters, plus the actors used by tests.
///
/// `creator` holds the create grant, `admin` the administer grant, and
/// `worker` and `bystander` hold nothing.
pub struct Workspace {
    pub engine: TestEngine,
    pub store: Arc<InMemoryWorkflowStore>,
    pub oracle: Arc<InMemoryPermissionOracle>,
    pub notifier: Arc<RecordingDispatcher>,
    pub clock: Arc<ManualClock>,
    pub admin: ActorId,
    pub creator: ActorId,
    pub worker: ActorId,
    pub bystander: ActorId,
}

impl Workspace {
    /// Builds a workspace using `config`.
    ///
    /// # Panics
    ///
    /// Panics if the initial grants cannot be recorded.
    #[must_use]
    pub fn with_config(config: WorkflowConfig) -> Self {
        let clock = Arc::new(ManualClock::fixed());
        let store = Arc::new(InMemoryWorkflowStore::with_clock(Arc::clone(&clock) as Arc<dyn mockable::Clock + Send + Sync>));
        let oracle = Arc::new(InMemoryPermissionOracle::new(Arc::clone(&store)));
        let notifier = Arc::new(RecordingDispatcher::new());
        let engine = WorkflowEngine::new(
            Arc::clone(&store),
            Arc::clone(&oracle),
            Arc::clone(&notifier),
            Arc::clone(&clock),
            config,
        );
        let admin = ActorId::new();
        let creator = ActorId::new();
        oracle
            .grant(admin, Resource::Tasks, Action::Administer)
            .expect("grant administer");
        oracle
            .grant(creator, Resource::Tasks, Action::Create)
            .expect("grant create");
        Self {
            engine,
            store,
            oracle,
            notifier,
            clock,
            admin,
            creator,
            worker: ActorId::new(),
            bystander: ActorId::new(),
        }
    }

    /// Creates a task owned by `creator`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses the creation.
    pub async fn create_task(&self, title: &str) -> Result<Task> {
        let outcome = self
            .engine
            .execute(
                self.creator,
                TransitionCommand::CreateTask(NewTask::new(title, self.creator)),
            )
            .await?;
        Ok(outcome.task)
    }

    /// Assigns the task to `worker` on behalf of `creator`.
    ///
    /// # Errors
    ///
    /// Returns an error if the assignment is refused.
    pub async fn assign_worker(&self, task_id: TaskId) -> Result<AssignmentId> {
        let outcome = self
            .engine
            .execute(self.creator, TransitionCommand::assign(task_id, self.worker))
            .await?;
        let assignment = outcome
            .assignment
            .ok_or_else(|| eyre!("assign returned no assignment"))?;
        Ok(assignment.id())
    }

    /// Assigns the task to `worker`, who accepts it.
    ///
    /// # Errors
    ///
    /// Returns an error if either step is refused.
    pub async fn assign_and_accept(&self, task_id: TaskId) -> Result<AssignmentId> {
        let assignment_id = self.assign_worker(task_id).await?;
        self.engine
            .execute(
                self.worker,
                TransitionCommand::AcceptAssignment { assignment_id },
            )
            .await?;
        Ok(assignment_id)
    }

    /// Creates a task, has `worker` accept it and advances it to completed.
    ///
    /// # Errors
    ///
    /// Returns an error if any step is refused.
    pub async fn completed_task(&self, title: &str) -> Result<(Task, AssignmentId)> {
        let task = self.create_task(title).await?;
        let assignment_id = self.assign_and_accept(task.id()).await?;
        for _ in 0..2 {
            self.engine
                .execute(self.worker, TransitionCommand::Advance { task_id: task.id() })
                .await?;
        }
        Ok((self.stored(task.id()).await?, assignment_id))
    }

    /// Reads the authoritative task from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is missing or the lookup fails.
    pub async fn stored(&self, task_id: TaskId) -> Result<Task> {
        self.store
            .find_task(task_id)
            .await?
            .ok_or_else(|| eyre!("task {task_id} missing from store"))
    }

    /// Reads the authoritative display stage of a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is missing or the lookup fails.
    pub async fn stage_of(&self, task_id: TaskId) -> Result<Stage> {
        Ok(self.stored(task_id).await?.effective_stage())
    }
}

/// Provides a workspace with the default configuration.
#[fixture]
pub fn workspace() -> Workspace {
    Workspace::with_config(WorkflowConfig::default())
}
