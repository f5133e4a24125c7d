//! The periodic job runner. Job rows are persisted with their own transition
//! log; the scheduler's single loop wakes on a short ticker, schedules
//! pending jobs for any type whose interval has elapsed, and dispatches each
//! pending job to its executor in a separate task with a cancellation token.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::JobsConfig;
use crate::db::Store;
use crate::entities::job;
use crate::models::parse_rfc3339;
use crate::models::state::{JobState, JobType};
use crate::services::indexer_cache::IndexerCacheService;
use crate::services::indexing::IndexingService;
use crate::services::reconcile::Reconciler;

const TICK_SECONDS: u64 = 2;
const PRUNE_SECONDS: u64 = 60;

#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Run the job to completion, observing the token and returning promptly
    /// once it fires.
    async fn execute(&self, token: CancellationToken) -> Result<()>;
}

pub struct JobScheduler {
    store: Store,
    config: JobsConfig,
    executors: HashMap<JobType, Arc<dyn JobExecutor>>,
    running: Mutex<HashMap<i32, CancellationToken>>,
}

/// Removes the running-jobs entry no matter how the executor path exits.
struct RunningGuard<'a> {
    running: &'a Mutex<HashMap<i32, CancellationToken>>,
    id: i32,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut map) = self.running.lock() {
            map.remove(&self.id);
        }
    }
}

impl JobScheduler {
    #[must_use]
    pub fn new(store: Store, config: JobsConfig) -> Self {
        Self {
            store,
            config,
            executors: HashMap::new(),
            running: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&mut self, job_type: JobType, executor: Arc<dyn JobExecutor>) {
        self.executors.insert(job_type, executor);
    }

    /// The scheduler loop. One cooperative task: every tick runs the
    /// interval check for each job type and dispatches pending jobs; a
    /// slower ticker prunes old job rows.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!("Job scheduler started");
        let mut tick = interval(Duration::from_secs(TICK_SECONDS));
        let mut prune_tick = interval(Duration::from_secs(PRUNE_SECONDS));

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = tick.tick() => Arc::clone(&self).tick().await,
                _ = prune_tick.tick() => {
                    match self.store.prune_jobs(self.config.min_jobs_to_keep).await {
                        Ok(0) => {}
                        Ok(removed) => debug!(removed, "pruned old job rows"),
                        Err(e) => warn!(error = %e, "job pruning failed"),
                    }
                }
            }
        }
        info!("Job scheduler stopped");
    }

    async fn tick(self: Arc<Self>) {
        for job_type in JobType::ALL {
            if let Err(e) = self.check_and_schedule_job(job_type).await {
                warn!(job_type = %job_type, error = %e, "scheduling check failed");
            }
        }

        match self.store.list_pending_jobs().await {
            Ok(jobs) => {
                for job in jobs {
                    let scheduler = Arc::clone(&self);
                    tokio::spawn(async move {
                        scheduler.execute_job(job).await;
                    });
                }
            }
            Err(e) => warn!(error = %e, "listing pending jobs failed"),
        }
    }

    /// Schedule a new pending job when the newest terminal run of this type
    /// is older than the configured interval (or there has never been one).
    /// A currently-running job does not block this once the previous run's
    /// timestamp is old enough.
    pub async fn check_and_schedule_job(&self, job_type: JobType) -> Result<()> {
        if !self.store.list_pending_jobs_by_type(job_type).await?.is_empty() {
            return Ok(());
        }

        let due = match self.store.newest_terminal_job(job_type).await? {
            None => true,
            Some(last) => match parse_rfc3339(&last.updated_at) {
                Some(finished_at) => {
                    Utc::now() - finished_at >= self.interval_for(job_type)
                }
                None => true,
            },
        };

        if due {
            // Creation can lose a race against another scheduling path;
            // that just means the job already exists.
            if let Err(e) = self.store.create_pending_job(job_type).await {
                debug!(job_type = %job_type, error = %e, "pending job not created");
            }
        }
        Ok(())
    }

    /// Claim and run one job. The pending->running transition is the claim;
    /// whoever loses it walks away.
    pub async fn execute_job(&self, job: job::Model) {
        match self.store.try_mark_job_running(job.id).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                warn!(job = job.id, error = %e, "claiming job failed");
                return;
            }
        }

        let executor = job
            .job_type
            .parse::<JobType>()
            .ok()
            .and_then(|t| self.executors.get(&t).cloned());
        let Some(executor) = executor else {
            error!(job = job.id, job_type = %job.job_type, "no executor found for job type");
            self.finish_job(
                job.id,
                JobState::Error,
                Some("no executor found for job type".to_string()),
            )
            .await;
            return;
        };

        let token = CancellationToken::new();
        if let Ok(mut map) = self.running.lock() {
            map.insert(job.id, token.clone());
        }
        let _guard = RunningGuard {
            running: &self.running,
            id: job.id,
        };

        let start = std::time::Instant::now();
        info!(event = "job_started", job = job.id, job_type = %job.job_type, "Job started");

        let outcome = tokio::select! {
            result = executor.execute(token.clone()) => Some(result),
            () = token.cancelled() => None,
        };
        drop(_guard);

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            None => {
                info!(event = "job_cancelled", job = job.id, job_type = %job.job_type, duration_ms, "Job cancelled");
                metrics::counter!("vidarr_jobs_cancelled_total").increment(1);
                self.finish_job(job.id, JobState::Cancelled, None).await;
            }
            Some(Ok(())) => {
                info!(event = "job_finished", job = job.id, job_type = %job.job_type, duration_ms, "Job finished");
                metrics::counter!("vidarr_jobs_done_total").increment(1);
                self.finish_job(job.id, JobState::Done, None).await;
            }
            Some(Err(e)) => {
                error!(event = "job_failed", job = job.id, job_type = %job.job_type, duration_ms, error = %e, "Job failed");
                metrics::counter!("vidarr_jobs_failed_total").increment(1);
                self.finish_job(job.id, JobState::Error, Some(e.to_string())).await;
            }
        }
    }

    async fn finish_job(&self, id: i32, state: JobState, error: Option<String>) {
        if let Err(e) = self.store.update_job_state(id, state, error).await {
            warn!(job = id, error = %e, "recording job outcome failed");
        }
    }

    /// Cancel by id: fire the token when the job is live, flip pending jobs
    /// straight to cancelled, and leave finished jobs alone. Unknown ids
    /// are an error.
    pub async fn cancel_job(&self, id: i32) -> Result<()> {
        let token = self
            .running
            .lock()
            .map_err(|_| anyhow!("running-jobs registry poisoned"))?
            .get(&id)
            .cloned();
        if let Some(token) = token {
            token.cancel();
            return Ok(());
        }

        let job = self
            .store
            .get_job(id)
            .await?
            .ok_or_else(|| anyhow!("job {id} not found"))?;

        let state: JobState = job.state.parse()?;
        if state.is_terminal() {
            return Ok(());
        }
        // Pending, or running with no live token (e.g. after a restart).
        self.store.update_job_state(id, JobState::Cancelled, None).await
    }

    #[must_use]
    pub fn is_tracked(&self, id: i32) -> bool {
        self.running.lock().map(|m| m.contains_key(&id)).unwrap_or(false)
    }

    /// One synchronous pass over every job type, used by the one-shot CLI
    /// check mode.
    pub async fn run_once(&self) -> Result<()> {
        for job_type in JobType::ALL {
            if let Err(e) = self.store.create_pending_job(job_type).await {
                debug!(job_type = %job_type, error = %e, "pending job not created");
            }
        }
        for job in self.store.list_pending_jobs().await? {
            self.execute_job(job).await;
        }
        Ok(())
    }

    fn interval_for(&self, job_type: JobType) -> ChronoDuration {
        ChronoDuration::minutes(self.config.interval_minutes(job_type))
    }
}

// ----------------------------------------------------------------------
// Executors
// ----------------------------------------------------------------------

pub struct MovieIndexExecutor(pub Arc<IndexingService>);

#[async_trait]
impl JobExecutor for MovieIndexExecutor {
    async fn execute(&self, _token: CancellationToken) -> Result<()> {
        self.0.index_movie_library().await
    }
}

pub struct SeriesIndexExecutor(pub Arc<IndexingService>);

#[async_trait]
impl JobExecutor for SeriesIndexExecutor {
    async fn execute(&self, _token: CancellationToken) -> Result<()> {
        self.0.index_series_library().await
    }
}

pub struct MovieReconcileExecutor(pub Arc<Reconciler>);

#[async_trait]
impl JobExecutor for MovieReconcileExecutor {
    async fn execute(&self, token: CancellationToken) -> Result<()> {
        self.0.reconcile_movies(&token).await
    }
}

pub struct SeriesReconcileExecutor(pub Arc<Reconciler>);

#[async_trait]
impl JobExecutor for SeriesReconcileExecutor {
    async fn execute(&self, token: CancellationToken) -> Result<()> {
        self.0.reconcile_series(&token).await
    }
}

pub struct IndexerSyncExecutor(pub Arc<IndexerCacheService>);

#[async_trait]
impl JobExecutor for IndexerSyncExecutor {
    async fn execute(&self, _token: CancellationToken) -> Result<()> {
        self.0.refresh_all().await
    }
}
