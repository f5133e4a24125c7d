use anyhow::Result;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::db::repositories::transition::record_initial;
use crate::entities::{job, prelude::*, transition};
use crate::models::now_rfc3339;
use crate::models::state::{EntityKind, JobState, JobType};

const TERMINAL_STATES: [&str; 3] = ["done", "error", "cancelled"];

pub struct JobRepository {
    conn: DatabaseConnection,
}

impl JobRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a pending job of the given type. At most one pending job per
    /// type may exist; a second insert fails and writes nothing.
    pub async fn create_pending(&self, job_type: JobType) -> Result<job::Model> {
        let created = self
            .conn
            .transaction::<_, job::Model, DbErr>(move |txn| {
                Box::pin(async move {
                    let pending = Job::find()
                        .filter(job::Column::JobType.eq(job_type.as_str()))
                        .filter(job::Column::State.eq(JobState::Pending.as_str()))
                        .count(txn)
                        .await?;
                    if pending > 0 {
                        return Err(DbErr::Custom(format!(
                            "a pending {job_type} job already exists"
                        )));
                    }

                    let now = now_rfc3339();
                    let row = job::ActiveModel {
                        job_type: Set(job_type.as_str().to_string()),
                        state: Set(JobState::Pending.as_str().to_string()),
                        error: Set(None),
                        created_at: Set(now.clone()),
                        updated_at: Set(now),
                        ..Default::default()
                    };
                    let model = row.insert(txn).await?;
                    record_initial(txn, EntityKind::Job, model.id, JobState::Pending.as_str())
                        .await?;
                    Ok(model)
                })
            })
            .await?;
        Ok(created)
    }

    pub async fn get(&self, id: i32) -> Result<Option<job::Model>> {
        Ok(Job::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn list(&self, offset: u64, limit: u64) -> Result<Vec<job::Model>> {
        Ok(Job::find()
            .order_by_desc(job::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_pending(&self) -> Result<Vec<job::Model>> {
        Ok(Job::find()
            .filter(job::Column::State.eq(JobState::Pending.as_str()))
            .order_by_asc(job::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_pending_by_type(&self, job_type: JobType) -> Result<Vec<job::Model>> {
        Ok(Job::find()
            .filter(job::Column::JobType.eq(job_type.as_str()))
            .filter(job::Column::State.eq(JobState::Pending.as_str()))
            .order_by_asc(job::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_running(&self) -> Result<Vec<job::Model>> {
        Ok(Job::find()
            .filter(job::Column::State.eq(JobState::Running.as_str()))
            .order_by_asc(job::Column::Id)
            .all(&self.conn)
            .await?)
    }

    /// Newest finished run of a type; scheduling intervals are measured
    /// from its `updated_at`.
    pub async fn newest_terminal(&self, job_type: JobType) -> Result<Option<job::Model>> {
        Ok(Job::find()
            .filter(job::Column::JobType.eq(job_type.as_str()))
            .filter(job::Column::State.is_in(TERMINAL_STATES))
            .order_by_desc(job::Column::UpdatedAt)
            .order_by_desc(job::Column::Id)
            .one(&self.conn)
            .await?)
    }

    pub async fn list_errors_since(&self, cutoff: &str) -> Result<Vec<job::Model>> {
        Ok(Job::find()
            .filter(job::Column::State.eq(JobState::Error.as_str()))
            .filter(job::Column::UpdatedAt.gte(cutoff.to_string()))
            .order_by_desc(job::Column::UpdatedAt)
            .all(&self.conn)
            .await?)
    }

    /// Per type, keep the `keep` most recent terminal rows and delete the
    /// rest together with their transition history. `keep <= 0` disables
    /// pruning entirely.
    pub async fn prune(&self, keep: i64) -> Result<u64> {
        if keep <= 0 {
            return Ok(0);
        }

        let mut removed = 0u64;
        for job_type in JobType::ALL {
            let terminal = Job::find()
                .filter(job::Column::JobType.eq(job_type.as_str()))
                .filter(job::Column::State.is_in(TERMINAL_STATES))
                .order_by_desc(job::Column::UpdatedAt)
                .order_by_desc(job::Column::Id)
                .all(&self.conn)
                .await?;

            #[allow(clippy::cast_sign_loss)]
            let stale: Vec<i32> = terminal.iter().skip(keep as usize).map(|j| j.id).collect();
            if stale.is_empty() {
                continue;
            }

            let ids = stale.clone();
            removed += self
                .conn
                .transaction::<_, u64, DbErr>(move |txn| {
                    Box::pin(async move {
                        Transition::delete_many()
                            .filter(transition::Column::EntityType.eq(EntityKind::Job.as_str()))
                            .filter(transition::Column::EntityId.is_in(ids.clone()))
                            .exec(txn)
                            .await?;
                        let res = Job::delete_many()
                            .filter(job::Column::Id.is_in(ids))
                            .exec(txn)
                            .await?;
                        Ok(res.rows_affected)
                    })
                })
                .await?;
        }
        Ok(removed)
    }
}
