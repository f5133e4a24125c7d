//! The append-only transition log and every state write that goes through it.
//!
//! All entity state changes funnel into this repository so the log append,
//! the `most_recent` flip, the denormalized state column, and the upward
//! cascade (episode -> season -> series) happen in one transaction.

use anyhow::Result;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::str::FromStr;

use crate::entities::{episode, movie, prelude::*, season, series, transition};
use crate::models::now_rfc3339;
use crate::models::state::{
    EntityKind, EpisodeState, JobState, MovieState, SeasonState, SeriesState, TransitionMetadata,
    UnknownState,
};

pub struct TransitionRepository {
    conn: DatabaseConnection,
}

fn parse_state<T: FromStr<Err = UnknownState>>(raw: &str) -> Result<T, DbErr> {
    raw.parse().map_err(|e: UnknownState| DbErr::Custom(e.to_string()))
}

/// Append a transition row for an entity, demoting the previous
/// `most_recent` row in the same statement batch. Callers are responsible
/// for updating the entity's denormalized state column alongside.
async fn append<C: ConnectionTrait>(
    conn: &C,
    kind: EntityKind,
    entity_id: i32,
    from_state: Option<&str>,
    to_state: &str,
    metadata: Option<&TransitionMetadata>,
) -> Result<(), DbErr> {
    Transition::update_many()
        .col_expr(transition::Column::MostRecent, Expr::value(false))
        .filter(transition::Column::EntityType.eq(kind.as_str()))
        .filter(transition::Column::EntityId.eq(entity_id))
        .filter(transition::Column::MostRecent.eq(true))
        .exec(conn)
        .await?;

    let metadata_json = match metadata {
        Some(m) if !m.is_empty() => Some(
            serde_json::to_string(m).map_err(|e| DbErr::Custom(e.to_string()))?,
        ),
        _ => None,
    };

    let row = transition::ActiveModel {
        entity_type: Set(kind.as_str().to_string()),
        entity_id: Set(entity_id),
        from_state: Set(from_state.map(ToString::to_string)),
        to_state: Set(to_state.to_string()),
        most_recent: Set(true),
        metadata: Set(metadata_json),
        created_at: Set(now_rfc3339()),
        ..Default::default()
    };
    Transition::insert(row).exec(conn).await?;
    Ok(())
}

pub(crate) async fn record_initial<C: ConnectionTrait>(
    conn: &C,
    kind: EntityKind,
    entity_id: i32,
    to_state: &str,
) -> Result<(), DbErr> {
    append(conn, kind, entity_id, None, to_state, None).await
}

async fn movie_update<C: ConnectionTrait>(
    conn: &C,
    id: i32,
    to: MovieState,
    metadata: Option<&TransitionMetadata>,
) -> Result<bool, DbErr> {
    let movie = Movie::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("movie {id}")))?;

    if movie.state == to.as_str() {
        return Ok(false);
    }

    append(conn, EntityKind::Movie, id, Some(&movie.state), to.as_str(), metadata).await?;

    let mut active: movie::ActiveModel = movie.into();
    active.state = Set(to.as_str().to_string());
    active.updated_at = Set(now_rfc3339());
    if let Some(meta) = metadata
        && meta.download_id.is_some()
    {
        active.download_id = Set(meta.download_id.clone());
        active.download_client_id = Set(meta.download_client_id);
    }
    active.update(conn).await?;
    Ok(true)
}

async fn episode_update<C: ConnectionTrait>(
    conn: &C,
    id: i32,
    to: EpisodeState,
    metadata: Option<&TransitionMetadata>,
) -> Result<Option<i32>, DbErr> {
    let episode = Episode::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("episode {id}")))?;

    if episode.state == to.as_str() {
        return Ok(None);
    }

    append(conn, EntityKind::Episode, id, Some(&episode.state), to.as_str(), metadata).await?;

    let season_id = episode.season_id;
    let mut active: episode::ActiveModel = episode.into();
    active.state = Set(to.as_str().to_string());
    active.updated_at = Set(now_rfc3339());
    if let Some(meta) = metadata {
        active.is_entire_season_download = Set(meta.is_entire_season_download);
    }
    active.update(conn).await?;
    Ok(Some(season_id))
}

async fn season_set_state<C: ConnectionTrait>(
    conn: &C,
    season: season::Model,
    to: SeasonState,
    metadata: Option<&TransitionMetadata>,
) -> Result<Option<i32>, DbErr> {
    if season.state == to.as_str() {
        return Ok(None);
    }

    append(conn, EntityKind::Season, season.id, Some(&season.state), to.as_str(), metadata).await?;

    let series_id = season.series_id;
    let mut active: season::ActiveModel = season.into();
    active.state = Set(to.as_str().to_string());
    active.updated_at = Set(now_rfc3339());
    active.update(conn).await?;
    Ok(Some(series_id))
}

async fn series_set_state<C: ConnectionTrait>(
    conn: &C,
    series: series::Model,
    to: SeriesState,
    metadata: Option<&TransitionMetadata>,
) -> Result<bool, DbErr> {
    if series.state == to.as_str() {
        return Ok(false);
    }

    append(conn, EntityKind::Series, series.id, Some(&series.state), to.as_str(), metadata).await?;

    let mut active: series::ActiveModel = series.into();
    active.state = Set(to.as_str().to_string());
    active.updated_at = Set(now_rfc3339());
    active.update(conn).await?;
    Ok(true)
}

/// Re-derive a series' state from its seasons and write it if changed.
async fn cascade_series<C: ConnectionTrait>(conn: &C, series_id: i32) -> Result<(), DbErr> {
    let Some(series) = Series::find_by_id(series_id).one(conn).await? else {
        return Err(DbErr::RecordNotFound(format!("series {series_id}")));
    };

    let seasons = Season::find()
        .filter(season::Column::SeriesId.eq(series_id))
        .all(conn)
        .await?;
    let states = seasons
        .iter()
        .map(|s| parse_state::<SeasonState>(&s.state))
        .collect::<Result<Vec<_>, _>>()?;

    let derived = SeriesState::aggregate(&states);
    series_set_state(conn, series, derived, None).await?;
    Ok(())
}

/// Re-derive a season's state from its episodes; on change, write it
/// (carrying `metadata` when provided) and cascade into the series.
async fn cascade_season<C: ConnectionTrait>(
    conn: &C,
    season_id: i32,
    metadata: Option<&TransitionMetadata>,
) -> Result<(), DbErr> {
    let Some(season) = Season::find_by_id(season_id).one(conn).await? else {
        return Err(DbErr::RecordNotFound(format!("season {season_id}")));
    };

    let episodes = Episode::find()
        .filter(episode::Column::SeasonId.eq(season_id))
        .all(conn)
        .await?;
    let states = episodes
        .iter()
        .map(|e| parse_state::<EpisodeState>(&e.state))
        .collect::<Result<Vec<_>, _>>()?;

    let derived = SeasonState::aggregate(&states);
    if let Some(series_id) = season_set_state(conn, season, derived, metadata).await? {
        cascade_series(conn, series_id).await?;
    }
    Ok(())
}

impl TransitionRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn update_movie_state(
        &self,
        id: i32,
        to: MovieState,
        metadata: Option<TransitionMetadata>,
    ) -> Result<()> {
        self.conn
            .transaction::<_, (), DbErr>(move |txn| {
                Box::pin(async move {
                    movie_update(txn, id, to, metadata.as_ref()).await?;
                    Ok(())
                })
            })
            .await?;
        Ok(())
    }

    /// Write an episode state and cascade through its season and series in
    /// the same transaction.
    pub async fn update_episode_state(
        &self,
        id: i32,
        to: EpisodeState,
        metadata: Option<TransitionMetadata>,
    ) -> Result<()> {
        self.conn
            .transaction::<_, (), DbErr>(move |txn| {
                Box::pin(async move {
                    if let Some(season_id) = episode_update(txn, id, to, metadata.as_ref()).await? {
                        cascade_season(txn, season_id, None).await?;
                    }
                    Ok(())
                })
            })
            .await?;
        Ok(())
    }

    pub async fn update_season_state(
        &self,
        id: i32,
        to: SeasonState,
        metadata: Option<TransitionMetadata>,
    ) -> Result<()> {
        self.conn
            .transaction::<_, (), DbErr>(move |txn| {
                Box::pin(async move {
                    let Some(season) = Season::find_by_id(id).one(txn).await? else {
                        return Err(DbErr::RecordNotFound(format!("season {id}")));
                    };
                    if let Some(series_id) =
                        season_set_state(txn, season, to, metadata.as_ref()).await?
                    {
                        cascade_series(txn, series_id).await?;
                    }
                    Ok(())
                })
            })
            .await?;
        Ok(())
    }

    pub async fn update_series_state(&self, id: i32, to: SeriesState) -> Result<()> {
        self.conn
            .transaction::<_, (), DbErr>(move |txn| {
                Box::pin(async move {
                    let Some(series) = Series::find_by_id(id).one(txn).await? else {
                        return Err(DbErr::RecordNotFound(format!("series {id}")));
                    };
                    series_set_state(txn, series, to, None).await?;
                    Ok(())
                })
            })
            .await?;
        Ok(())
    }

    /// Season-pack submission: move every given episode to Downloading with
    /// the shared download reference, then derive the season once so its
    /// transition carries the same metadata. One transaction for the lot.
    pub async fn mark_season_pack_downloading(
        &self,
        season_id: i32,
        episode_ids: Vec<i32>,
        metadata: TransitionMetadata,
    ) -> Result<()> {
        self.conn
            .transaction::<_, (), DbErr>(move |txn| {
                Box::pin(async move {
                    for episode_id in &episode_ids {
                        episode_update(
                            txn,
                            *episode_id,
                            EpisodeState::Downloading,
                            Some(&metadata),
                        )
                        .await?;
                    }
                    cascade_season(txn, season_id, Some(&metadata)).await?;
                    Ok(())
                })
            })
            .await?;
        Ok(())
    }

    /// Re-derive a season's aggregate state outside of any episode write,
    /// cascading into the series. Used by the completed sweep.
    pub async fn reevaluate_season(&self, season_id: i32) -> Result<()> {
        self.conn
            .transaction::<_, (), DbErr>(move |txn| {
                Box::pin(async move { cascade_season(txn, season_id, None).await })
            })
            .await?;
        Ok(())
    }

    pub async fn update_job_state(
        &self,
        id: i32,
        to: JobState,
        error: Option<String>,
    ) -> Result<()> {
        self.conn
            .transaction::<_, (), DbErr>(move |txn| {
                Box::pin(async move {
                    let job = Job::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| DbErr::RecordNotFound(format!("job {id}")))?;

                    if job.state == to.as_str() {
                        return Ok(());
                    }

                    append(txn, EntityKind::Job, id, Some(&job.state), to.as_str(), None).await?;

                    let mut active: crate::entities::job::ActiveModel = job.into();
                    active.state = Set(to.as_str().to_string());
                    active.error = Set(error);
                    active.updated_at = Set(now_rfc3339());
                    active.update(txn).await?;
                    Ok(())
                })
            })
            .await?;
        Ok(())
    }

    /// Claim a pending job for execution. Returns false when some other
    /// dispatch got there first (or the job is past pending already).
    pub async fn try_mark_job_running(&self, id: i32) -> Result<bool> {
        let claimed = self
            .conn
            .transaction::<_, bool, DbErr>(move |txn| {
                Box::pin(async move {
                    let Some(job) = Job::find_by_id(id).one(txn).await? else {
                        return Ok(false);
                    };
                    if job.state != JobState::Pending.as_str() {
                        return Ok(false);
                    }

                    append(
                        txn,
                        EntityKind::Job,
                        id,
                        Some(&job.state),
                        JobState::Running.as_str(),
                        None,
                    )
                    .await?;

                    let mut active: crate::entities::job::ActiveModel = job.into();
                    active.state = Set(JobState::Running.as_str().to_string());
                    active.updated_at = Set(now_rfc3339());
                    active.update(txn).await?;
                    Ok(true)
                })
            })
            .await?;
        Ok(claimed)
    }

    pub async fn most_recent(
        &self,
        kind: EntityKind,
        entity_id: i32,
    ) -> Result<Option<transition::Model>> {
        let row = Transition::find()
            .filter(transition::Column::EntityType.eq(kind.as_str()))
            .filter(transition::Column::EntityId.eq(entity_id))
            .filter(transition::Column::MostRecent.eq(true))
            .one(&self.conn)
            .await?;
        Ok(row)
    }

    pub async fn entity_transitions(
        &self,
        kind: EntityKind,
        entity_id: i32,
    ) -> Result<Vec<transition::Model>> {
        let rows = Transition::find()
            .filter(transition::Column::EntityType.eq(kind.as_str()))
            .filter(transition::Column::EntityId.eq(entity_id))
            .order_by_asc(transition::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(rows)
    }

    pub async fn transitions_between(
        &self,
        start: &str,
        end: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<transition::Model>> {
        let rows = Transition::find()
            .filter(transition::Column::CreatedAt.gte(start.to_string()))
            .filter(transition::Column::CreatedAt.lte(end.to_string()))
            .order_by_asc(transition::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.conn)
            .await?;
        Ok(rows)
    }

    /// Most-recent transitions into a given state, across one entity class.
    pub async fn most_recent_into(
        &self,
        kind: EntityKind,
        to_state: &str,
    ) -> Result<Vec<transition::Model>> {
        let rows = Transition::find()
            .filter(transition::Column::EntityType.eq(kind.as_str()))
            .filter(transition::Column::ToState.eq(to_state))
            .filter(transition::Column::MostRecent.eq(true))
            .order_by_asc(transition::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(rows)
    }
}
