//! In-memory integration tests for merging pushed snapshots into local
//! views.

use super::helpers::{Workspace, workspace};
use chrono::TimeDelta;
use eyre::{Result, bail, ensure, eyre};
use mockable::Clock;
use rstest::rstest;
use tasklane::sync::domain::{ReconcileOutcome, ViewKey};
use tasklane::task::{
    domain::{Stage, Task, TaskStatus},
    ports::{FeedFilter, TaskSnapshot, WorkflowStore},
    services::TransitionCommand,
};

fn board() -> ViewKey {
    ViewKey::new("board")
}

fn board_stage(workspace: &Workspace, task: &Task) -> Result<Stage> {
    let rows = workspace
        .engine
        .coordinator()
        .view(&board())
        .ok_or_else(|| eyre!("board view missing"))?;
    rows.iter()
        .find(|row| row.task_id == task.id())
        .map(|row| row.stage)
        .ok_or_else(|| eyre!("task missing from board"))
}

async fn shown_task(workspace: &Workspace, title: &str) -> Result<Task> {
    let task = workspace.create_task(title).await?;
    let stored = workspace.stored(task.id()).await?;
    workspace
        .engine
        .coordinator()
        .register_view(board(), std::slice::from_ref(&stored));
    Ok(stored)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn remote_changes_reach_the_board(workspace: Workspace) -> Result<()> {
    let task = shown_task(&workspace, "Defrost freezer").await?;
    let mut feed = workspace
        .engine
        .connect_feed(workspace.store.feed(), FeedFilter::all())
        .await?;

    workspace
        .store
        .update_status(task.id(), TaskStatus::InProgress)
        .await?;
    let outcomes = feed.drain();

    ensure!(
        outcomes
            == vec![ReconcileOutcome::Adopted {
                task_id: task.id(),
                stage: Stage::InProgress,
            }]
    );
    ensure!(board_stage(&workspace, &task)? == Stage::InProgress);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn in_flight_change_survives_an_older_push(workspace: Workspace) -> Result<()> {
    let task = shown_task(&workspace, "Swap filters").await?;
    let mut feed = workspace
        .engine
        .connect_feed(workspace.store.feed(), FeedFilter::all())
        .await?;
    let pending =
        workspace
            .engine
            .coordinator()
            .begin(task.id(), "board:1:in_progress", Stage::Pending);
    workspace.clock.advance(TimeDelta::milliseconds(1));

    workspace.store.set_unassigned(task.id(), false).await?;
    let stale = feed.drain();
    ensure!(matches!(stale.as_slice(), [ReconcileOutcome::Deferred { .. }]));
    ensure!(board_stage(&workspace, &task)? == Stage::InProgress);

    workspace
        .store
        .update_status(task.id(), TaskStatus::InProgress)
        .await?;
    let landed = feed.drain();
    ensure!(matches!(landed.as_slice(), [ReconcileOutcome::Confirmed { .. }]));
    ensure!(workspace.engine.coordinator().marker(task.id()).is_none());
    let saved = workspace.stored(task.id()).await?;
    ensure!(!workspace.engine.coordinator().confirm(&pending, &saved));
    ensure!(board_stage(&workspace, &task)? == Stage::InProgress);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unconfirmed_change_yields_after_the_grace_window(workspace: Workspace) -> Result<()> {
    let task = shown_task(&workspace, "Test alarms").await?;
    let mut feed = workspace
        .engine
        .connect_feed(workspace.store.feed(), FeedFilter::all())
        .await?;
    workspace
        .engine
        .coordinator()
        .begin_stage(task.id(), Stage::InProgress, Stage::Pending);

    workspace.store.set_unassigned(task.id(), false).await?;
    ensure!(matches!(
        feed.drain().as_slice(),
        [ReconcileOutcome::Deferred { .. }]
    ));

    let grace = workspace.engine.coordinator().grace_window();
    workspace.clock.advance(grace + TimeDelta::seconds(1));
    let swept = feed.drain();

    ensure!(matches!(
        swept.as_slice(),
        [ReconcileOutcome::StaleMarkerDiscarded {
            stage: Stage::Pending,
            speculative: Stage::InProgress,
            ..
        }]
    ));
    ensure!(board_stage(&workspace, &task)? == Stage::Pending);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn engine_writes_echo_back_without_disturbing_the_board(workspace: Workspace) -> Result<()> {
    let task = shown_task(&workspace, "Restock first aid").await?;
    let mut feed = workspace
        .engine
        .connect_feed(workspace.store.feed(), FeedFilter::all())
        .await?;

    workspace
        .engine
        .tasks()
        .advance(workspace.creator, task.id())
        .await?;
    ensure!(board_stage(&workspace, &task)? == Stage::InProgress);

    let echoed = feed.drain();
    ensure!(echoed.iter().all(ReconcileOutcome::is_applied));
    ensure!(board_stage(&workspace, &task)? == Stage::InProgress);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn saved_change_ignores_a_push_older_than_the_write(workspace: Workspace) -> Result<()> {
    let task = shown_task(&workspace, "Bleed radiators").await?;
    workspace
        .engine
        .tasks()
        .advance(workspace.creator, task.id())
        .await?;
    let mut feed = workspace
        .engine
        .connect_feed(workspace.store.feed(), FeedFilter::all())
        .await?;

    workspace
        .store
        .feed()
        .publish(&TaskSnapshot::new(task.clone(), workspace.clock.utc()));
    let outcomes = feed.drain();

    ensure!(
        outcomes
            == vec![ReconcileOutcome::OutdatedSnapshotIgnored {
                task_id: task.id(),
                revision: task.revision(),
                latest: workspace.stored(task.id()).await?.revision(),
            }]
    );
    ensure!(board_stage(&workspace, &task)? == Stage::InProgress);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn overlapping_failed_writes_fall_back_to_the_saved_stage(
    workspace: Workspace,
) -> Result<()> {
    let task = shown_task(&workspace, "Reseal windows").await?;
    let earlier =
        workspace
            .engine
            .coordinator()
            .begin_stage(task.id(), Stage::InProgress, Stage::Pending);
    workspace.store.fail_next_writes(2);

    let failure = workspace
        .engine
        .execute(workspace.creator, TransitionCommand::Advance { task_id: task.id() })
        .await;
    let Err(error) = failure else {
        bail!("write should have failed");
    };
    ensure!(board_stage(&workspace, &task)? == Stage::Pending);
    let handle = error
        .retry_handle()
        .cloned()
        .ok_or_else(|| eyre!("persistence failure without retry handle"))?;
    ensure!(workspace.engine.retry(handle).await.is_err());
    ensure!(!workspace.engine.coordinator().roll_back(&earlier));

    ensure!(board_stage(&workspace, &task)? == Stage::Pending);
    ensure!(workspace.engine.coordinator().marker(task.id()).is_none());
    ensure!(workspace.stage_of(task.id()).await? == Stage::Pending);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unsubscribed_feed_stops_updating_the_board(workspace: Workspace) -> Result<()> {
    let task = shown_task(&workspace, "Service boiler").await?;
    let mut feed = workspace
        .engine
        .connect_feed(workspace.store.feed(), FeedFilter::all())
        .await?;
    let handle = feed.handle();

    handle.unsubscribe();
    workspace
        .store
        .update_status(task.id(), TaskStatus::InProgress)
        .await?;

    ensure!(feed.is_closed());
    ensure!(feed.drain().is_empty());
    ensure!(board_stage(&workspace, &task)? == Stage::Pending);
    ensure!(workspace.store.feed().subscriber_count() == 0);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn filtered_feed_ignores_other_tasks(workspace: Workspace) -> Result<()> {
    let watched = shown_task(&workspace, "Drain tanks").await?;
    let other = workspace.create_task("Oil hinges").await?;
    let mut feed = workspace
        .engine
        .connect_feed(
            workspace.store.feed(),
            FeedFilter::all().for_tasks([watched.id()]),
        )
        .await?;

    workspace
        .store
        .update_status(other.id(), TaskStatus::InProgress)
        .await?;

    ensure!(feed.drain().is_empty());
    ensure!(workspace.engine.coordinator().displayed_stage(other.id()).is_none());
    Ok(())
}
