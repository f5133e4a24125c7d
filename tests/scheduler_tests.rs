//! Scheduler behavior: pending-job uniqueness, interval scheduling,
//! execution, cancellation, and pruning.

mod common;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{ActiveModelTrait, Set};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use vidarr::config::JobsConfig;
use vidarr::entities::job;
use vidarr::models::fmt_rfc3339;
use vidarr::models::state::{JobState, JobType};
use vidarr::services::scheduler::{JobExecutor, JobScheduler};

struct CountingExecutor(AtomicUsize);

#[async_trait]
impl JobExecutor for CountingExecutor {
    async fn execute(&self, _token: CancellationToken) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Never finishes on its own; only cancellation ends it.
struct BlockingExecutor;

#[async_trait]
impl JobExecutor for BlockingExecutor {
    async fn execute(&self, _token: CancellationToken) -> Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

struct FailingExecutor;

#[async_trait]
impl JobExecutor for FailingExecutor {
    async fn execute(&self, _token: CancellationToken) -> Result<()> {
        anyhow::bail!("boom")
    }
}

async fn age_job(store: &vidarr::db::Store, id: i32, minutes: i64) {
    let model = store.get_job(id).await.unwrap().unwrap();
    let mut active: job::ActiveModel = model.into();
    active.updated_at = Set(fmt_rfc3339(Utc::now() - ChronoDuration::minutes(minutes)));
    active.update(&store.conn).await.unwrap();
}

#[tokio::test]
async fn at_most_one_pending_job_per_type() {
    let store = common::temp_store().await;

    store.create_pending_job(JobType::MovieIndex).await.unwrap();
    let second = store.create_pending_job(JobType::MovieIndex).await;
    assert!(second.is_err(), "second pending job of a type must fail");

    let pending = store.list_pending_jobs_by_type(JobType::MovieIndex).await.unwrap();
    assert_eq!(pending.len(), 1, "the failed insert wrote nothing");

    // Other types are unaffected.
    store.create_pending_job(JobType::SeriesIndex).await.unwrap();
}

#[tokio::test]
async fn schedules_immediately_without_history_and_respects_interval_after() {
    let store = common::temp_store().await;
    let mut scheduler = JobScheduler::new(store.clone(), JobsConfig::default());
    scheduler.register(
        JobType::MovieIndex,
        Arc::new(CountingExecutor(AtomicUsize::new(0))),
    );
    let scheduler = Arc::new(scheduler);

    // No terminal history: schedule right away.
    scheduler.check_and_schedule_job(JobType::MovieIndex).await.unwrap();
    let pending = store.list_pending_jobs_by_type(JobType::MovieIndex).await.unwrap();
    assert_eq!(pending.len(), 1);

    // Run it to completion.
    scheduler.execute_job(pending[0].clone()).await;
    let finished = store.get_job(pending[0].id).await.unwrap().unwrap();
    assert_eq!(finished.state, JobState::Done.as_str());

    // Fresh terminal run: the 10 minute default interval has not elapsed.
    scheduler.check_and_schedule_job(JobType::MovieIndex).await.unwrap();
    assert!(
        store
            .list_pending_jobs_by_type(JobType::MovieIndex)
            .await
            .unwrap()
            .is_empty()
    );

    // Age the finished run past the interval: due again.
    age_job(&store, finished.id, 20).await;
    scheduler.check_and_schedule_job(JobType::MovieIndex).await.unwrap();
    assert_eq!(
        store
            .list_pending_jobs_by_type(JobType::MovieIndex)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn running_job_can_be_cancelled() {
    let store = common::temp_store().await;
    let mut scheduler = JobScheduler::new(store.clone(), JobsConfig::default());
    scheduler.register(JobType::MovieIndex, Arc::new(BlockingExecutor));
    let scheduler = Arc::new(scheduler);

    let job = store.create_pending_job(JobType::MovieIndex).await.unwrap();

    let task = {
        let scheduler = Arc::clone(&scheduler);
        let job = job.clone();
        tokio::spawn(async move {
            scheduler.execute_job(job).await;
        })
    };

    // Wait for the executor to be registered in the running-jobs map.
    let mut tracked = false;
    for _ in 0..100 {
        if scheduler.is_tracked(job.id) {
            tracked = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(tracked, "job never showed up in the running registry");

    scheduler.cancel_job(job.id).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("cancellation did not end the job in time")
        .unwrap();

    assert!(!scheduler.is_tracked(job.id));
    let finished = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(finished.state, JobState::Cancelled.as_str());
}

#[tokio::test]
async fn cancel_pending_terminal_and_unknown_jobs() {
    let store = common::temp_store().await;
    let scheduler = Arc::new(JobScheduler::new(store.clone(), JobsConfig::default()));

    // Pending: flips straight to cancelled.
    let pending = store.create_pending_job(JobType::SeriesIndex).await.unwrap();
    scheduler.cancel_job(pending.id).await.unwrap();
    assert_eq!(
        store.get_job(pending.id).await.unwrap().unwrap().state,
        JobState::Cancelled.as_str()
    );

    // Terminal: a no-op.
    scheduler.cancel_job(pending.id).await.unwrap();
    assert_eq!(
        store.get_job(pending.id).await.unwrap().unwrap().state,
        JobState::Cancelled.as_str()
    );

    // Unknown id: an error.
    assert!(scheduler.cancel_job(999_999).await.is_err());
}

#[tokio::test]
async fn unknown_job_type_records_an_error() {
    let store = common::temp_store().await;
    // No executor registered at all.
    let scheduler = Arc::new(JobScheduler::new(store.clone(), JobsConfig::default()));

    let job = store.create_pending_job(JobType::IndexerSync).await.unwrap();
    scheduler.execute_job(job.clone()).await;

    let finished = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(finished.state, JobState::Error.as_str());
    assert_eq!(
        finished.error.as_deref(),
        Some("no executor found for job type")
    );
}

#[tokio::test]
async fn failed_executor_records_the_message() {
    let store = common::temp_store().await;
    let mut scheduler = JobScheduler::new(store.clone(), JobsConfig::default());
    scheduler.register(JobType::MovieReconcile, Arc::new(FailingExecutor));
    let scheduler = Arc::new(scheduler);

    let job = store.create_pending_job(JobType::MovieReconcile).await.unwrap();
    scheduler.execute_job(job.clone()).await;

    let finished = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(finished.state, JobState::Error.as_str());
    assert_eq!(finished.error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn pruning_keeps_the_most_recent_terminal_rows() {
    let store = common::temp_store().await;

    // Three finished runs, oldest first.
    let mut ids = Vec::new();
    for age in [30_i64, 20, 10] {
        let job = store.create_pending_job(JobType::MovieIndex).await.unwrap();
        store
            .update_job_state(job.id, JobState::Done, None)
            .await
            .unwrap();
        age_job(&store, job.id, age).await;
        ids.push(job.id);
    }

    // Zero retention disables pruning entirely.
    assert_eq!(store.prune_jobs(0).await.unwrap(), 0);
    assert_eq!(store.list_jobs(0, 100).await.unwrap().len(), 3);

    let removed = store.prune_jobs(1).await.unwrap();
    assert_eq!(removed, 2);

    let remaining = store.list_jobs(0, 100).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, ids[2], "newest run survives");
}
