//! The storage facade. One `Store` is cloned everywhere; each call borrows a
//! per-concern repository over the shared connection pool. Every state write
//! funnels through the transition repository so the log, the denormalized
//! state column, and the cascade stay atomic.

use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::media_file::NewMediaFile;
pub use repositories::metadata::{EpisodeMetadataInput, MovieMetadataInput, SeriesMetadataInput};
pub use repositories::movie::NewMovie;
pub use repositories::remote::{NewDownloadClient, NewIndexer, NewIndexerSource};
pub use repositories::series::NewSeries;

use crate::entities::{
    download_client, episode, episode_file, episode_metadata, indexer, indexer_source, job, movie,
    movie_file, movie_metadata, season, season_metadata, series, series_metadata, transition,
};
use crate::models::state::{
    EntityKind, EpisodeState, JobState, JobType, MovieState, SeasonState, SeriesState,
    TransitionMetadata,
};
use crate::quality::{QualityDefinition, QualityProfile};

/// sqlx will not create the database file on its own; touch it (and its
/// parent directory) before connecting. In-memory urls need nothing.
async fn ensure_db_file(db_url: &str) -> Result<()> {
    if db_url.contains(":memory:") {
        return Ok(());
    }

    let file = Path::new(db_url.trim_start_matches("sqlite:"));
    if let Some(parent) = file.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    if !file.exists() {
        drop(std::fs::File::create(file)?);
    }
    Ok(())
}

/// Writers serialize on sqlite anyway, so the pool stays small: enough
/// connections for the sweeps to read concurrently while one cascade writes.
const POOL_CONNECTIONS: u32 = 4;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_size(db_url, POOL_CONNECTIONS).await
    }

    pub async fn with_pool_size(db_url: &str, connections: u32) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        ensure_db_file(db_url).await?;

        let mut options = ConnectOptions::new(db_url.to_string());
        options
            .max_connections(connections.max(1))
            .min_connections(1)
            .connect_timeout(Duration::from_secs(5))
            .acquire_timeout(Duration::from_secs(15))
            .idle_timeout(Duration::from_secs(90))
            .sqlx_logging(false);

        let conn = Database::connect(options).await?;
        migrator::Migrator::up(&conn, None).await?;

        info!(connections = connections.max(1), "sqlite store open, schema current");
        Ok(Self { conn })
    }

    fn movies(&self) -> repositories::movie::MovieRepository {
        repositories::movie::MovieRepository::new(self.conn.clone())
    }

    fn series(&self) -> repositories::series::SeriesRepository {
        repositories::series::SeriesRepository::new(self.conn.clone())
    }

    fn metadata(&self) -> repositories::metadata::MetadataRepository {
        repositories::metadata::MetadataRepository::new(self.conn.clone())
    }

    fn media_files(&self) -> repositories::media_file::MediaFileRepository {
        repositories::media_file::MediaFileRepository::new(self.conn.clone())
    }

    fn transitions(&self) -> repositories::transition::TransitionRepository {
        repositories::transition::TransitionRepository::new(self.conn.clone())
    }

    fn jobs(&self) -> repositories::job::JobRepository {
        repositories::job::JobRepository::new(self.conn.clone())
    }

    fn quality(&self) -> repositories::quality::QualityRepository {
        repositories::quality::QualityRepository::new(self.conn.clone())
    }

    fn remotes(&self) -> repositories::remote::RemoteRepository {
        repositories::remote::RemoteRepository::new(self.conn.clone())
    }

    pub async fn initialize_defaults(&self) -> Result<()> {
        self.quality().ensure_defaults().await
    }

    // ------------------------------------------------------------------
    // Movies
    // ------------------------------------------------------------------

    pub async fn create_movie(&self, input: NewMovie, initial: MovieState) -> Result<movie::Model> {
        self.movies().create(input, initial).await
    }

    pub async fn get_movie(&self, id: i32) -> Result<Option<movie::Model>> {
        self.movies().get(id).await
    }

    pub async fn get_movie_by_tmdb_id(&self, tmdb_id: i32) -> Result<Option<movie::Model>> {
        self.movies().get_by_tmdb_id(tmdb_id).await
    }

    pub async fn get_movie_by_path(&self, path: &str) -> Result<Option<movie::Model>> {
        self.movies().get_by_path(path).await
    }

    pub async fn list_movies(&self) -> Result<Vec<movie::Model>> {
        self.movies().list().await
    }

    pub async fn list_movies_in_state(
        &self,
        state: MovieState,
        monitored_only: bool,
    ) -> Result<Vec<movie::Model>> {
        self.movies().list_in_state(state, monitored_only).await
    }

    pub async fn update_movie_state(
        &self,
        id: i32,
        to: MovieState,
        metadata: Option<TransitionMetadata>,
    ) -> Result<()> {
        self.transitions().update_movie_state(id, to, metadata).await
    }

    pub async fn link_movie_metadata(&self, id: i32, metadata_id: i32) -> Result<()> {
        self.movies().link_metadata(id, metadata_id).await
    }

    pub async fn set_movie_file(&self, id: i32, file_id: i32) -> Result<()> {
        self.movies().set_file(id, file_id).await
    }

    pub async fn set_movie_path(&self, id: i32, path: &str) -> Result<()> {
        self.movies().set_path(id, path).await
    }

    pub async fn set_movie_tmdb_id(&self, id: i32, tmdb_id: i32) -> Result<()> {
        self.movies().set_tmdb_id(id, tmdb_id).await
    }

    // ------------------------------------------------------------------
    // Series / seasons / episodes
    // ------------------------------------------------------------------

    pub async fn create_series(
        &self,
        input: NewSeries,
        initial: SeriesState,
    ) -> Result<series::Model> {
        self.series().create_series(input, initial).await
    }

    pub async fn get_series(&self, id: i32) -> Result<Option<series::Model>> {
        self.series().get_series(id).await
    }

    pub async fn get_series_by_path(&self, path: &str) -> Result<Option<series::Model>> {
        self.series().get_series_by_path(path).await
    }

    pub async fn get_series_by_tmdb_id(&self, tmdb_id: i32) -> Result<Option<series::Model>> {
        self.series().get_series_by_tmdb_id(tmdb_id).await
    }

    pub async fn list_series(&self) -> Result<Vec<series::Model>> {
        self.series().list_series().await
    }

    pub async fn list_series_in_states(
        &self,
        states: &[SeriesState],
    ) -> Result<Vec<series::Model>> {
        self.series().list_series_in_states(states).await
    }

    pub async fn update_series_state(&self, id: i32, to: SeriesState) -> Result<()> {
        self.transitions().update_series_state(id, to).await
    }

    pub async fn link_series_metadata(&self, id: i32, metadata_id: i32) -> Result<()> {
        self.series().link_series_metadata(id, metadata_id).await
    }

    pub async fn set_series_tmdb_id(&self, id: i32, tmdb_id: i32) -> Result<()> {
        self.series().set_series_tmdb_id(id, tmdb_id).await
    }

    pub async fn create_season(
        &self,
        series_id: i32,
        season_number: i32,
        initial: SeasonState,
    ) -> Result<season::Model> {
        self.series().create_season(series_id, season_number, initial).await
    }

    pub async fn get_season(&self, id: i32) -> Result<Option<season::Model>> {
        self.series().get_season(id).await
    }

    pub async fn get_season_by_number(
        &self,
        series_id: i32,
        season_number: i32,
    ) -> Result<Option<season::Model>> {
        self.series().get_season_by_number(series_id, season_number).await
    }

    pub async fn list_seasons(&self, series_id: i32) -> Result<Vec<season::Model>> {
        self.series().list_seasons(series_id).await
    }

    pub async fn list_seasons_in_states(
        &self,
        states: &[SeasonState],
    ) -> Result<Vec<season::Model>> {
        self.series().list_seasons_in_states(states).await
    }

    pub async fn update_season_state(
        &self,
        id: i32,
        to: SeasonState,
        metadata: Option<TransitionMetadata>,
    ) -> Result<()> {
        self.transitions().update_season_state(id, to, metadata).await
    }

    pub async fn reevaluate_season(&self, id: i32) -> Result<()> {
        self.transitions().reevaluate_season(id).await
    }

    pub async fn link_season_metadata(&self, id: i32, metadata_id: i32) -> Result<()> {
        self.series().link_season_metadata(id, metadata_id).await
    }

    pub async fn create_episode(
        &self,
        season_id: i32,
        episode_number: i32,
        episode_file_id: Option<i32>,
        initial: EpisodeState,
    ) -> Result<episode::Model> {
        self.series()
            .create_episode(season_id, episode_number, episode_file_id, initial)
            .await
    }

    pub async fn get_episode(&self, id: i32) -> Result<Option<episode::Model>> {
        self.series().get_episode(id).await
    }

    pub async fn list_episodes(&self, season_id: i32) -> Result<Vec<episode::Model>> {
        self.series().list_episodes(season_id).await
    }

    pub async fn list_episodes_in_state(&self, state: EpisodeState) -> Result<Vec<episode::Model>> {
        self.series().list_episodes_in_state(state).await
    }

    pub async fn list_season_episodes_in_state(
        &self,
        season_id: i32,
        state: EpisodeState,
    ) -> Result<Vec<episode::Model>> {
        self.series().list_season_episodes_in_state(season_id, state).await
    }

    pub async fn update_episode_state(
        &self,
        id: i32,
        to: EpisodeState,
        metadata: Option<TransitionMetadata>,
    ) -> Result<()> {
        self.transitions().update_episode_state(id, to, metadata).await
    }

    pub async fn mark_season_pack_downloading(
        &self,
        season_id: i32,
        episode_ids: Vec<i32>,
        metadata: TransitionMetadata,
    ) -> Result<()> {
        self.transitions()
            .mark_season_pack_downloading(season_id, episode_ids, metadata)
            .await
    }

    pub async fn link_episode_metadata(&self, id: i32, metadata_id: i32) -> Result<bool> {
        self.series().link_episode_metadata(id, metadata_id).await
    }

    pub async fn set_episode_file(&self, id: i32, file_id: i32) -> Result<()> {
        self.series().set_episode_file(id, file_id).await
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    pub async fn upsert_movie_metadata(
        &self,
        input: MovieMetadataInput,
    ) -> Result<movie_metadata::Model> {
        self.metadata().upsert_movie_metadata(input).await
    }

    pub async fn get_movie_metadata(&self, id: i32) -> Result<Option<movie_metadata::Model>> {
        self.metadata().get_movie_metadata(id).await
    }

    pub async fn upsert_series_metadata(
        &self,
        input: SeriesMetadataInput,
    ) -> Result<series_metadata::Model> {
        self.metadata().upsert_series_metadata(input).await
    }

    pub async fn get_series_metadata(&self, id: i32) -> Result<Option<series_metadata::Model>> {
        self.metadata().get_series_metadata(id).await
    }

    pub async fn upsert_season_metadata(
        &self,
        series_metadata_id: i32,
        season_number: i32,
        title: Option<String>,
    ) -> Result<season_metadata::Model> {
        self.metadata()
            .upsert_season_metadata(series_metadata_id, season_number, title)
            .await
    }

    pub async fn get_season_metadata(&self, id: i32) -> Result<Option<season_metadata::Model>> {
        self.metadata().get_season_metadata(id).await
    }

    pub async fn get_season_metadata_by_number(
        &self,
        series_metadata_id: i32,
        season_number: i32,
    ) -> Result<Option<season_metadata::Model>> {
        self.metadata()
            .get_season_metadata_by_number(series_metadata_id, season_number)
            .await
    }

    pub async fn upsert_episode_metadata(
        &self,
        season_metadata_id: i32,
        input: EpisodeMetadataInput,
    ) -> Result<episode_metadata::Model> {
        self.metadata().upsert_episode_metadata(season_metadata_id, input).await
    }

    pub async fn get_episode_metadata(&self, id: i32) -> Result<Option<episode_metadata::Model>> {
        self.metadata().get_episode_metadata(id).await
    }

    pub async fn get_episode_metadata_by_number(
        &self,
        season_metadata_id: i32,
        episode_number: i32,
    ) -> Result<Option<episode_metadata::Model>> {
        self.metadata()
            .get_episode_metadata_by_number(season_metadata_id, episode_number)
            .await
    }

    pub async fn list_episode_metadata(
        &self,
        season_metadata_id: i32,
    ) -> Result<Vec<episode_metadata::Model>> {
        self.metadata().list_episode_metadata(season_metadata_id).await
    }

    // ------------------------------------------------------------------
    // Media files
    // ------------------------------------------------------------------

    pub async fn create_episode_file(&self, input: NewMediaFile) -> Result<episode_file::Model> {
        self.media_files().create_episode_file(input).await
    }

    pub async fn get_episode_file(&self, id: i32) -> Result<Option<episode_file::Model>> {
        self.media_files().get_episode_file(id).await
    }

    pub async fn find_episode_file_by_path(
        &self,
        path: &str,
    ) -> Result<Option<episode_file::Model>> {
        self.media_files().find_episode_file_by_path(path).await
    }

    pub async fn update_episode_file_original_path(&self, id: i32, path: &str) -> Result<()> {
        self.media_files().update_episode_file_original_path(id, path).await
    }

    pub async fn list_episode_files(&self) -> Result<Vec<episode_file::Model>> {
        self.media_files().list_episode_files().await
    }

    pub async fn list_orphan_episode_files(&self) -> Result<Vec<episode_file::Model>> {
        self.media_files().list_orphan_episode_files().await
    }

    pub async fn create_movie_file(&self, input: NewMediaFile) -> Result<movie_file::Model> {
        self.media_files().create_movie_file(input).await
    }

    pub async fn get_movie_file(&self, id: i32) -> Result<Option<movie_file::Model>> {
        self.media_files().get_movie_file(id).await
    }

    pub async fn find_movie_file_by_path(&self, path: &str) -> Result<Option<movie_file::Model>> {
        self.media_files().find_movie_file_by_path(path).await
    }

    pub async fn update_movie_file_original_path(&self, id: i32, path: &str) -> Result<()> {
        self.media_files().update_movie_file_original_path(id, path).await
    }

    pub async fn list_orphan_movie_files(&self) -> Result<Vec<movie_file::Model>> {
        self.media_files().list_orphan_movie_files().await
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    pub async fn create_pending_job(&self, job_type: JobType) -> Result<job::Model> {
        self.jobs().create_pending(job_type).await
    }

    pub async fn get_job(&self, id: i32) -> Result<Option<job::Model>> {
        self.jobs().get(id).await
    }

    pub async fn list_jobs(&self, offset: u64, limit: u64) -> Result<Vec<job::Model>> {
        self.jobs().list(offset, limit).await
    }

    pub async fn list_pending_jobs(&self) -> Result<Vec<job::Model>> {
        self.jobs().list_pending().await
    }

    pub async fn list_pending_jobs_by_type(&self, job_type: JobType) -> Result<Vec<job::Model>> {
        self.jobs().list_pending_by_type(job_type).await
    }

    pub async fn list_running_jobs(&self) -> Result<Vec<job::Model>> {
        self.jobs().list_running().await
    }

    pub async fn newest_terminal_job(&self, job_type: JobType) -> Result<Option<job::Model>> {
        self.jobs().newest_terminal(job_type).await
    }

    pub async fn list_error_jobs_since(&self, cutoff: &str) -> Result<Vec<job::Model>> {
        self.jobs().list_errors_since(cutoff).await
    }

    pub async fn update_job_state(
        &self,
        id: i32,
        to: JobState,
        error: Option<String>,
    ) -> Result<()> {
        self.transitions().update_job_state(id, to, error).await
    }

    pub async fn try_mark_job_running(&self, id: i32) -> Result<bool> {
        self.transitions().try_mark_job_running(id).await
    }

    pub async fn prune_jobs(&self, keep: i64) -> Result<u64> {
        self.jobs().prune(keep).await
    }

    // ------------------------------------------------------------------
    // Quality
    // ------------------------------------------------------------------

    pub async fn get_quality_profile(&self, id: i32) -> Result<Option<QualityProfile>> {
        self.quality().get_profile(id).await
    }

    pub async fn list_quality_profiles(&self) -> Result<Vec<QualityProfile>> {
        self.quality().list_profiles().await
    }

    pub async fn create_quality_profile(
        &self,
        name: &str,
        definitions: Vec<QualityDefinition>,
    ) -> Result<QualityProfile> {
        self.quality().create_profile(name, definitions).await
    }

    // ------------------------------------------------------------------
    // Remotes
    // ------------------------------------------------------------------

    pub async fn create_indexer_source(
        &self,
        input: NewIndexerSource,
    ) -> Result<indexer_source::Model> {
        self.remotes().create_indexer_source(input).await
    }

    pub async fn get_indexer_source(&self, id: i32) -> Result<Option<indexer_source::Model>> {
        self.remotes().get_indexer_source(id).await
    }

    pub async fn list_indexer_sources(&self) -> Result<Vec<indexer_source::Model>> {
        self.remotes().list_indexer_sources().await
    }

    pub async fn list_enabled_indexer_sources(&self) -> Result<Vec<indexer_source::Model>> {
        self.remotes().list_enabled_indexer_sources().await
    }

    pub async fn delete_indexer_source(&self, id: i32) -> Result<()> {
        self.remotes().delete_indexer_source(id).await
    }

    pub async fn replace_indexers(
        &self,
        source_id: i32,
        indexers: Vec<NewIndexer>,
    ) -> Result<Vec<indexer::Model>> {
        self.remotes().replace_indexers(source_id, indexers).await
    }

    pub async fn list_indexers_for_source(&self, source_id: i32) -> Result<Vec<indexer::Model>> {
        self.remotes().list_indexers_for_source(source_id).await
    }

    pub async fn list_enabled_indexers(&self) -> Result<Vec<indexer::Model>> {
        self.remotes().list_enabled_indexers().await
    }

    pub async fn create_download_client(
        &self,
        input: NewDownloadClient,
    ) -> Result<download_client::Model> {
        self.remotes().create_download_client(input).await
    }

    pub async fn get_download_client(&self, id: i32) -> Result<Option<download_client::Model>> {
        self.remotes().get_download_client(id).await
    }

    pub async fn list_download_clients(&self) -> Result<Vec<download_client::Model>> {
        self.remotes().list_download_clients().await
    }

    pub async fn list_enabled_download_clients(&self) -> Result<Vec<download_client::Model>> {
        self.remotes().list_enabled_download_clients().await
    }

    pub async fn delete_download_client(&self, id: i32) -> Result<()> {
        self.remotes().delete_download_client(id).await
    }

    // ------------------------------------------------------------------
    // Transition log queries
    // ------------------------------------------------------------------

    pub async fn most_recent_transition(
        &self,
        kind: EntityKind,
        entity_id: i32,
    ) -> Result<Option<transition::Model>> {
        self.transitions().most_recent(kind, entity_id).await
    }

    pub async fn entity_transitions(
        &self,
        kind: EntityKind,
        entity_id: i32,
    ) -> Result<Vec<transition::Model>> {
        self.transitions().entity_transitions(kind, entity_id).await
    }

    pub async fn transitions_between(
        &self,
        start: &str,
        end: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<transition::Model>> {
        self.transitions().transitions_between(start, end, offset, limit).await
    }

    pub async fn most_recent_transitions_into(
        &self,
        kind: EntityKind,
        to_state: &str,
    ) -> Result<Vec<transition::Model>> {
        self.transitions().most_recent_into(kind, to_state).await
    }
}
