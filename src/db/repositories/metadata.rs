//! Provider-fact storage. Metadata rows are refreshable but never
//! user-edited, so every write is an upsert keyed by the provider ids.

use anyhow::Result;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::entities::{episode_metadata, movie_metadata, prelude::*, season_metadata, series_metadata};
use crate::models::now_rfc3339;

pub struct MovieMetadataInput {
    pub tmdb_id: i32,
    pub title: String,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub runtime_minutes: Option<i32>,
}

pub struct SeriesMetadataInput {
    pub tmdb_id: i32,
    pub title: String,
    pub overview: Option<String>,
    pub first_air_date: Option<String>,
    pub external_ids: Option<String>,
    pub watch_providers: Option<String>,
}

pub struct EpisodeMetadataInput {
    pub episode_number: i32,
    pub title: Option<String>,
    pub air_date: Option<String>,
    pub runtime_minutes: Option<i32>,
}

pub struct MetadataRepository {
    conn: DatabaseConnection,
}

impl MetadataRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn upsert_movie_metadata(
        &self,
        input: MovieMetadataInput,
    ) -> Result<movie_metadata::Model> {
        let tmdb_id = input.tmdb_id;
        let row = movie_metadata::ActiveModel {
            tmdb_id: Set(input.tmdb_id),
            title: Set(input.title),
            overview: Set(input.overview),
            release_date: Set(input.release_date),
            runtime_minutes: Set(input.runtime_minutes),
            fetched_at: Set(now_rfc3339()),
            ..Default::default()
        };

        MovieMetadata::insert(row)
            .on_conflict(
                OnConflict::column(movie_metadata::Column::TmdbId)
                    .update_columns([
                        movie_metadata::Column::Title,
                        movie_metadata::Column::Overview,
                        movie_metadata::Column::ReleaseDate,
                        movie_metadata::Column::RuntimeMinutes,
                        movie_metadata::Column::FetchedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await?;

        self.get_movie_metadata_by_tmdb_id(tmdb_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("movie metadata tmdb {tmdb_id}")).into())
    }

    pub async fn get_movie_metadata(&self, id: i32) -> Result<Option<movie_metadata::Model>> {
        Ok(MovieMetadata::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn get_movie_metadata_by_tmdb_id(
        &self,
        tmdb_id: i32,
    ) -> Result<Option<movie_metadata::Model>> {
        Ok(MovieMetadata::find()
            .filter(movie_metadata::Column::TmdbId.eq(tmdb_id))
            .one(&self.conn)
            .await?)
    }

    pub async fn upsert_series_metadata(
        &self,
        input: SeriesMetadataInput,
    ) -> Result<series_metadata::Model> {
        let tmdb_id = input.tmdb_id;
        let row = series_metadata::ActiveModel {
            tmdb_id: Set(input.tmdb_id),
            title: Set(input.title),
            overview: Set(input.overview),
            first_air_date: Set(input.first_air_date),
            external_ids: Set(input.external_ids),
            watch_providers: Set(input.watch_providers),
            fetched_at: Set(now_rfc3339()),
            ..Default::default()
        };

        SeriesMetadata::insert(row)
            .on_conflict(
                OnConflict::column(series_metadata::Column::TmdbId)
                    .update_columns([
                        series_metadata::Column::Title,
                        series_metadata::Column::Overview,
                        series_metadata::Column::FirstAirDate,
                        series_metadata::Column::ExternalIds,
                        series_metadata::Column::WatchProviders,
                        series_metadata::Column::FetchedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await?;

        self.get_series_metadata_by_tmdb_id(tmdb_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("series metadata tmdb {tmdb_id}")).into())
    }

    pub async fn get_series_metadata(&self, id: i32) -> Result<Option<series_metadata::Model>> {
        Ok(SeriesMetadata::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn get_series_metadata_by_tmdb_id(
        &self,
        tmdb_id: i32,
    ) -> Result<Option<series_metadata::Model>> {
        Ok(SeriesMetadata::find()
            .filter(series_metadata::Column::TmdbId.eq(tmdb_id))
            .one(&self.conn)
            .await?)
    }

    pub async fn upsert_season_metadata(
        &self,
        series_metadata_id: i32,
        season_number: i32,
        title: Option<String>,
    ) -> Result<season_metadata::Model> {
        let row = season_metadata::ActiveModel {
            series_metadata_id: Set(series_metadata_id),
            season_number: Set(season_number),
            title: Set(title),
            fetched_at: Set(now_rfc3339()),
            ..Default::default()
        };

        SeasonMetadata::insert(row)
            .on_conflict(
                OnConflict::columns([
                    season_metadata::Column::SeriesMetadataId,
                    season_metadata::Column::SeasonNumber,
                ])
                .update_columns([
                    season_metadata::Column::Title,
                    season_metadata::Column::FetchedAt,
                ])
                .to_owned(),
            )
            .exec(&self.conn)
            .await?;

        self.get_season_metadata_by_number(series_metadata_id, season_number)
            .await?
            .ok_or_else(|| {
                DbErr::RecordNotFound(format!(
                    "season metadata {series_metadata_id}/{season_number}"
                ))
                .into()
            })
    }

    pub async fn get_season_metadata(&self, id: i32) -> Result<Option<season_metadata::Model>> {
        Ok(SeasonMetadata::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn get_season_metadata_by_number(
        &self,
        series_metadata_id: i32,
        season_number: i32,
    ) -> Result<Option<season_metadata::Model>> {
        Ok(SeasonMetadata::find()
            .filter(season_metadata::Column::SeriesMetadataId.eq(series_metadata_id))
            .filter(season_metadata::Column::SeasonNumber.eq(season_number))
            .one(&self.conn)
            .await?)
    }

    pub async fn list_season_metadata(
        &self,
        series_metadata_id: i32,
    ) -> Result<Vec<season_metadata::Model>> {
        Ok(SeasonMetadata::find()
            .filter(season_metadata::Column::SeriesMetadataId.eq(series_metadata_id))
            .order_by_asc(season_metadata::Column::SeasonNumber)
            .all(&self.conn)
            .await?)
    }

    pub async fn upsert_episode_metadata(
        &self,
        season_metadata_id: i32,
        input: EpisodeMetadataInput,
    ) -> Result<episode_metadata::Model> {
        let episode_number = input.episode_number;
        let row = episode_metadata::ActiveModel {
            season_metadata_id: Set(season_metadata_id),
            episode_number: Set(input.episode_number),
            title: Set(input.title),
            air_date: Set(input.air_date),
            runtime_minutes: Set(input.runtime_minutes),
            fetched_at: Set(now_rfc3339()),
            ..Default::default()
        };

        EpisodeMetadata::insert(row)
            .on_conflict(
                OnConflict::columns([
                    episode_metadata::Column::SeasonMetadataId,
                    episode_metadata::Column::EpisodeNumber,
                ])
                .update_columns([
                    episode_metadata::Column::Title,
                    episode_metadata::Column::AirDate,
                    episode_metadata::Column::RuntimeMinutes,
                    episode_metadata::Column::FetchedAt,
                ])
                .to_owned(),
            )
            .exec(&self.conn)
            .await?;

        self.get_episode_metadata_by_number(season_metadata_id, episode_number)
            .await?
            .ok_or_else(|| {
                DbErr::RecordNotFound(format!(
                    "episode metadata {season_metadata_id}/{episode_number}"
                ))
                .into()
            })
    }

    pub async fn get_episode_metadata(&self, id: i32) -> Result<Option<episode_metadata::Model>> {
        Ok(EpisodeMetadata::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn get_episode_metadata_by_number(
        &self,
        season_metadata_id: i32,
        episode_number: i32,
    ) -> Result<Option<episode_metadata::Model>> {
        Ok(EpisodeMetadata::find()
            .filter(episode_metadata::Column::SeasonMetadataId.eq(season_metadata_id))
            .filter(episode_metadata::Column::EpisodeNumber.eq(episode_number))
            .one(&self.conn)
            .await?)
    }

    pub async fn list_episode_metadata(
        &self,
        season_metadata_id: i32,
    ) -> Result<Vec<episode_metadata::Model>> {
        Ok(EpisodeMetadata::find()
            .filter(episode_metadata::Column::SeasonMetadataId.eq(season_metadata_id))
            .order_by_asc(episode_metadata::Column::EpisodeNumber)
            .all(&self.conn)
            .await?)
    }
}
