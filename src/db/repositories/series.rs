use anyhow::Result;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use crate::db::repositories::transition::record_initial;
use crate::entities::{episode, prelude::*, season, series};
use crate::models::now_rfc3339;
use crate::models::state::{EntityKind, EpisodeState, SeasonState, SeriesState};

pub struct NewSeries {
    pub tmdb_id: Option<i32>,
    pub path: Option<String>,
    pub series_metadata_id: Option<i32>,
    pub quality_profile_id: i32,
    pub monitored: bool,
}

pub struct SeriesRepository {
    conn: DatabaseConnection,
}

impl SeriesRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    // ------------------------------------------------------------------
    // Series
    // ------------------------------------------------------------------

    pub async fn create_series(
        &self,
        input: NewSeries,
        initial: SeriesState,
    ) -> Result<series::Model> {
        let created = self
            .conn
            .transaction::<_, series::Model, DbErr>(move |txn| {
                Box::pin(async move {
                    let now = now_rfc3339();
                    let row = series::ActiveModel {
                        tmdb_id: Set(input.tmdb_id),
                        path: Set(input.path),
                        series_metadata_id: Set(input.series_metadata_id),
                        quality_profile_id: Set(input.quality_profile_id),
                        monitored: Set(input.monitored),
                        state: Set(initial.as_str().to_string()),
                        created_at: Set(now.clone()),
                        updated_at: Set(now),
                        ..Default::default()
                    };
                    let model = row.insert(txn).await?;
                    record_initial(txn, EntityKind::Series, model.id, initial.as_str()).await?;
                    Ok(model)
                })
            })
            .await?;
        Ok(created)
    }

    pub async fn get_series(&self, id: i32) -> Result<Option<series::Model>> {
        Ok(Series::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn get_series_by_path(&self, path: &str) -> Result<Option<series::Model>> {
        Ok(Series::find()
            .filter(series::Column::Path.eq(path))
            .one(&self.conn)
            .await?)
    }

    pub async fn get_series_by_tmdb_id(&self, tmdb_id: i32) -> Result<Option<series::Model>> {
        Ok(Series::find()
            .filter(series::Column::TmdbId.eq(tmdb_id))
            .one(&self.conn)
            .await?)
    }

    pub async fn list_series(&self) -> Result<Vec<series::Model>> {
        Ok(Series::find()
            .order_by_asc(series::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_series_in_states(&self, states: &[SeriesState]) -> Result<Vec<series::Model>> {
        let names: Vec<&str> = states.iter().map(|s| s.as_str()).collect();
        Ok(Series::find()
            .filter(series::Column::State.is_in(names))
            .order_by_asc(series::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn link_series_metadata(&self, id: i32, metadata_id: i32) -> Result<()> {
        let model = Series::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("series {id}")))?;
        let mut active: series::ActiveModel = model.into();
        active.series_metadata_id = Set(Some(metadata_id));
        active.updated_at = Set(now_rfc3339());
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn set_series_tmdb_id(&self, id: i32, tmdb_id: i32) -> Result<()> {
        let model = Series::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("series {id}")))?;
        let mut active: series::ActiveModel = model.into();
        active.tmdb_id = Set(Some(tmdb_id));
        active.updated_at = Set(now_rfc3339());
        active.update(&self.conn).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Seasons
    // ------------------------------------------------------------------

    pub async fn create_season(
        &self,
        series_id: i32,
        season_number: i32,
        initial: SeasonState,
    ) -> Result<season::Model> {
        let created = self
            .conn
            .transaction::<_, season::Model, DbErr>(move |txn| {
                Box::pin(async move {
                    let now = now_rfc3339();
                    let row = season::ActiveModel {
                        series_id: Set(series_id),
                        season_number: Set(season_number),
                        season_metadata_id: Set(None),
                        state: Set(initial.as_str().to_string()),
                        created_at: Set(now.clone()),
                        updated_at: Set(now),
                        ..Default::default()
                    };
                    let model = row.insert(txn).await?;
                    record_initial(txn, EntityKind::Season, model.id, initial.as_str()).await?;
                    Ok(model)
                })
            })
            .await?;
        Ok(created)
    }

    pub async fn get_season(&self, id: i32) -> Result<Option<season::Model>> {
        Ok(Season::find_by_id(id).one(&self.conn).await?)
    }

    /// Compound lookup: a season is addressed by its series plus number.
    pub async fn get_season_by_number(
        &self,
        series_id: i32,
        season_number: i32,
    ) -> Result<Option<season::Model>> {
        Ok(Season::find()
            .filter(season::Column::SeriesId.eq(series_id))
            .filter(season::Column::SeasonNumber.eq(season_number))
            .one(&self.conn)
            .await?)
    }

    pub async fn list_seasons(&self, series_id: i32) -> Result<Vec<season::Model>> {
        Ok(Season::find()
            .filter(season::Column::SeriesId.eq(series_id))
            .order_by_asc(season::Column::SeasonNumber)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_seasons_in_states(
        &self,
        states: &[SeasonState],
    ) -> Result<Vec<season::Model>> {
        let names: Vec<&str> = states.iter().map(|s| s.as_str()).collect();
        Ok(Season::find()
            .filter(season::Column::State.is_in(names))
            .order_by_asc(season::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn link_season_metadata(&self, id: i32, metadata_id: i32) -> Result<()> {
        let model = Season::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("season {id}")))?;
        let mut active: season::ActiveModel = model.into();
        active.season_metadata_id = Set(Some(metadata_id));
        active.updated_at = Set(now_rfc3339());
        active.update(&self.conn).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Episodes
    // ------------------------------------------------------------------

    pub async fn create_episode(
        &self,
        season_id: i32,
        episode_number: i32,
        episode_file_id: Option<i32>,
        initial: EpisodeState,
    ) -> Result<episode::Model> {
        let created = self
            .conn
            .transaction::<_, episode::Model, DbErr>(move |txn| {
                Box::pin(async move {
                    let now = now_rfc3339();
                    let row = episode::ActiveModel {
                        season_id: Set(season_id),
                        episode_number: Set(episode_number),
                        episode_metadata_id: Set(None),
                        episode_file_id: Set(episode_file_id),
                        is_entire_season_download: Set(false),
                        state: Set(initial.as_str().to_string()),
                        created_at: Set(now.clone()),
                        updated_at: Set(now),
                        ..Default::default()
                    };
                    let model = row.insert(txn).await?;
                    record_initial(txn, EntityKind::Episode, model.id, initial.as_str()).await?;
                    Ok(model)
                })
            })
            .await?;
        Ok(created)
    }

    pub async fn get_episode(&self, id: i32) -> Result<Option<episode::Model>> {
        Ok(Episode::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn list_episodes(&self, season_id: i32) -> Result<Vec<episode::Model>> {
        Ok(Episode::find()
            .filter(episode::Column::SeasonId.eq(season_id))
            .order_by_asc(episode::Column::EpisodeNumber)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_episodes_in_state(&self, state: EpisodeState) -> Result<Vec<episode::Model>> {
        Ok(Episode::find()
            .filter(episode::Column::State.eq(state.as_str()))
            .order_by_asc(episode::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_season_episodes_in_state(
        &self,
        season_id: i32,
        state: EpisodeState,
    ) -> Result<Vec<episode::Model>> {
        Ok(Episode::find()
            .filter(episode::Column::SeasonId.eq(season_id))
            .filter(episode::Column::State.eq(state.as_str()))
            .order_by_asc(episode::Column::EpisodeNumber)
            .all(&self.conn)
            .await?)
    }

    /// Link an episode to its metadata row. Returns false without writing
    /// when another episode already holds that metadata link. The check and
    /// the write share a transaction; the unique index on the column backs
    /// them up against anything racing outside it.
    pub async fn link_episode_metadata(&self, id: i32, metadata_id: i32) -> Result<bool> {
        let linked = self
            .conn
            .transaction::<_, bool, DbErr>(move |txn| {
                Box::pin(async move {
                    let taken = Episode::find()
                        .filter(episode::Column::EpisodeMetadataId.eq(metadata_id))
                        .filter(episode::Column::Id.ne(id))
                        .one(txn)
                        .await?;
                    if taken.is_some() {
                        return Ok(false);
                    }

                    let model = Episode::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| DbErr::RecordNotFound(format!("episode {id}")))?;
                    let mut active: episode::ActiveModel = model.into();
                    active.episode_metadata_id = Set(Some(metadata_id));
                    active.updated_at = Set(now_rfc3339());
                    active.update(txn).await?;
                    Ok(true)
                })
            })
            .await?;
        Ok(linked)
    }

    pub async fn set_episode_file(&self, id: i32, file_id: i32) -> Result<()> {
        let model = Episode::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("episode {id}")))?;
        let mut active: episode::ActiveModel = model.into();
        active.episode_file_id = Set(Some(file_id));
        active.updated_at = Set(now_rfc3339());
        active.update(&self.conn).await?;
        Ok(())
    }
}
