//! Download tracking: poll in-flight downloads, import finished files into
//! the library, link them, and advance states. Episodes sharing a season
//! pack are handled as one group with a single client query.

use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Reconciler;
use crate::db::NewMediaFile;
use crate::entities::{episode, movie, season};
use crate::library::LibraryError;
use crate::models::snapshot::Snapshot;
use crate::models::state::{EntityKind, EpisodeState, MovieState};

impl Reconciler {
    pub(super) async fn reconcile_downloading_movies(
        &self,
        snapshot: &Snapshot,
        token: &CancellationToken,
    ) -> Result<()> {
        let movies = self
            .store
            .list_movies_in_state(MovieState::Downloading, false)
            .await?;

        for movie in movies {
            if token.is_cancelled() {
                return Ok(());
            }
            if let Err(e) = self.track_movie_download(snapshot, &movie).await {
                warn!(movie = movie.id, error = %e, "movie download tracking failed");
            }
        }
        Ok(())
    }

    async fn track_movie_download(&self, snapshot: &Snapshot, movie: &movie::Model) -> Result<()> {
        let recent = self
            .store
            .most_recent_transition(EntityKind::Movie, movie.id)
            .await?;
        let (download_id, client_id, _) = Self::download_ref(recent.as_ref())
            .or_else(|| {
                movie
                    .download_id
                    .clone()
                    .zip(movie.download_client_id)
                    .map(|(id, client)| (id, client, false))
            })
            .ok_or_else(|| anyhow!("movie {} is downloading without a reference", movie.id))?;

        let downloader = self.downloader_by_id(snapshot, client_id).await?;
        let status = downloader.get(&download_id).await?;
        if !status.done {
            debug!(movie = movie.id, download = %download_id, "download still in flight");
            return Ok(());
        }

        let title = match movie.movie_metadata_id {
            Some(id) => self
                .store
                .get_movie_metadata(id)
                .await?
                .map(|m| m.title),
            None => None,
        }
        .or_else(|| movie.path.clone())
        .unwrap_or_else(|| status.name.clone());

        let mut linked = false;
        for path in &status.file_paths {
            match self.import_movie_file(movie, &title, Path::new(path)).await {
                Ok(()) => linked = true,
                Err(e) => warn!(movie = movie.id, path, error = %e, "movie import failed"),
            }
        }

        if linked {
            self.store
                .update_movie_state(movie.id, MovieState::Downloaded, None)
                .await?;
        }
        Ok(())
    }

    async fn import_movie_file(
        &self,
        movie: &movie::Model,
        title: &str,
        source: &Path,
    ) -> Result<()> {
        let imported = match self.library.add_movie(title, source).await {
            Ok(imported) => imported,
            // The library already holds this file; re-link it.
            Err(LibraryError::FileExists { existing }) => existing,
            Err(e) => return Err(e.into()),
        };

        let file_row = match self
            .store
            .find_movie_file_by_path(&imported.relative_path)
            .await?
        {
            Some(row) => row,
            None => {
                self.store
                    .create_movie_file(NewMediaFile {
                        relative_path: imported.relative_path.clone(),
                        original_file_path: Some(source.to_string_lossy().to_string()),
                        size_bytes: imported.size_bytes,
                    })
                    .await?
            }
        };

        self.store.set_movie_file(movie.id, file_row.id).await?;
        info!(movie = movie.id, path = %imported.relative_path, "movie imported");
        Ok(())
    }

    /// Episodes in Downloading, grouped per season. A group carrying the
    /// season-pack marker is one download covering all of them.
    pub(super) async fn reconcile_downloading_episodes(
        &self,
        snapshot: &Snapshot,
        token: &CancellationToken,
    ) -> Result<()> {
        let episodes = self
            .store
            .list_episodes_in_state(EpisodeState::Downloading)
            .await?;

        let mut by_season: BTreeMap<i32, Vec<episode::Model>> = BTreeMap::new();
        for episode in episodes {
            by_season.entry(episode.season_id).or_default().push(episode);
        }

        for (season_id, group) in by_season {
            if token.is_cancelled() {
                return Ok(());
            }
            let season_pack = group.iter().any(|e| e.is_entire_season_download);
            let result = if season_pack {
                self.track_season_pack(snapshot, season_id, &group).await
            } else {
                self.track_individual_episodes(snapshot, season_id, &group).await
            };
            if let Err(e) = result {
                warn!(season = season_id, error = %e, "episode download tracking failed");
            }
        }
        Ok(())
    }

    async fn track_season_pack(
        &self,
        snapshot: &Snapshot,
        season_id: i32,
        group: &[episode::Model],
    ) -> Result<()> {
        let marker = group
            .iter()
            .find(|e| e.is_entire_season_download)
            .ok_or_else(|| anyhow!("season {season_id} group lost its pack marker"))?;
        let recent = self
            .store
            .most_recent_transition(EntityKind::Episode, marker.id)
            .await?;
        let (download_id, client_id, _) = Self::download_ref(recent.as_ref())
            .ok_or_else(|| anyhow!("season pack for season {season_id} has no reference"))?;

        let downloader = self.downloader_by_id(snapshot, client_id).await?;
        let status = downloader.get(&download_id).await?;
        if !status.done {
            debug!(season = season_id, download = %download_id, "season pack still in flight");
            return Ok(());
        }

        let (season, series_title) = self.season_context(season_id).await?;

        for path in &status.file_paths {
            let Some(parsed) = self.library.episode_file_from_path(path) else {
                warn!(path, "season pack file is unparsable, skipping");
                continue;
            };
            let Some(target) = group
                .iter()
                .find(|e| e.episode_number == parsed.episode_number)
            else {
                debug!(path, episode = parsed.episode_number, "file matches no episode in group");
                continue;
            };

            if let Err(e) = self
                .import_episode_file(target, &series_title, season.season_number, Path::new(path))
                .await
            {
                warn!(episode = target.id, path, error = %e, "episode import failed");
            }
        }

        for episode in group {
            self.store
                .update_episode_state(episode.id, EpisodeState::Downloaded, None)
                .await?;
        }
        Ok(())
    }

    async fn track_individual_episodes(
        &self,
        snapshot: &Snapshot,
        season_id: i32,
        group: &[episode::Model],
    ) -> Result<()> {
        let (season, series_title) = self.season_context(season_id).await?;

        for episode in group {
            let recent = self
                .store
                .most_recent_transition(EntityKind::Episode, episode.id)
                .await?;
            let Some((download_id, client_id, _)) = Self::download_ref(recent.as_ref()) else {
                warn!(episode = episode.id, "downloading episode has no reference");
                continue;
            };

            let downloader = self.downloader_by_id(snapshot, client_id).await?;
            let status = downloader.get(&download_id).await?;
            if !status.done {
                continue;
            }

            let mut linked = false;
            for path in &status.file_paths {
                match self
                    .import_episode_file(episode, &series_title, season.season_number, Path::new(path))
                    .await
                {
                    Ok(()) => linked = true,
                    Err(e) => {
                        warn!(episode = episode.id, path, error = %e, "episode import failed");
                    }
                }
            }

            if linked {
                self.store
                    .update_episode_state(episode.id, EpisodeState::Downloaded, None)
                    .await?;
            }
        }
        Ok(())
    }

    async fn import_episode_file(
        &self,
        episode: &episode::Model,
        series_title: &str,
        season_number: i32,
        source: &Path,
    ) -> Result<()> {
        let imported = match self
            .library
            .add_episode(series_title, season_number, source)
            .await
        {
            Ok(imported) => imported,
            Err(LibraryError::FileExists { existing }) => existing,
            Err(e) => return Err(e.into()),
        };

        let file_row = match self
            .store
            .find_episode_file_by_path(&imported.relative_path)
            .await?
        {
            Some(row) => row,
            None => {
                self.store
                    .create_episode_file(NewMediaFile {
                        relative_path: imported.relative_path.clone(),
                        original_file_path: Some(source.to_string_lossy().to_string()),
                        size_bytes: imported.size_bytes,
                    })
                    .await?
            }
        };

        self.store.set_episode_file(episode.id, file_row.id).await?;
        info!(episode = episode.id, path = %imported.relative_path, "episode imported");
        Ok(())
    }

    async fn season_context(&self, season_id: i32) -> Result<(season::Model, String)> {
        let season = self
            .store
            .get_season(season_id)
            .await?
            .ok_or_else(|| anyhow!("season {season_id} not found"))?;
        let series = self
            .store
            .get_series(season.series_id)
            .await?
            .ok_or_else(|| anyhow!("series {} not found", season.series_id))?;
        let title = self
            .series_title(&series)
            .await?
            .ok_or_else(|| anyhow!("series {} has no usable title", series.id))?;
        Ok((season, title))
    }
}
