//! Library discovery sweeps: walk the on-disk library, register files, and
//! create Discovered entities for anything with no prior registration.

use anyhow::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::{NewMediaFile, NewMovie, NewSeries, Store};
use crate::library::Library;
use crate::models::state::{EpisodeState, MovieState, SeasonState, SeriesState};
use crate::parser::filename::parse_movie;

const DEFAULT_QUALITY_PROFILE_ID: i32 = 1;

pub struct IndexingService {
    store: Store,
    library: Arc<dyn Library>,
}

impl IndexingService {
    #[must_use]
    pub fn new(store: Store, library: Arc<dyn Library>) -> Self {
        Self { store, library }
    }

    /// Register every episode file the library can see, then turn files
    /// nobody references into Discovered series/season/episode rows.
    pub async fn index_series_library(&self) -> Result<()> {
        let found = self.library.find_episodes().await?;
        info!(files = found.len(), "indexing series library");

        for file in &found {
            let absolute = file.absolute_path.to_string_lossy().to_string();
            let existing = match self.store.find_episode_file_by_path(&file.relative_path).await? {
                Some(row) => Some(row),
                None => self.store.find_episode_file_by_path(&absolute).await?,
            };

            match existing {
                None => {
                    self.store
                        .create_episode_file(NewMediaFile {
                            relative_path: file.relative_path.clone(),
                            original_file_path: Some(absolute),
                            size_bytes: file.size_bytes,
                        })
                        .await?;
                }
                Some(row) => {
                    // A differing absolute path means the file moved under us.
                    if row.original_file_path.as_deref() != Some(absolute.as_str()) {
                        self.store
                            .update_episode_file_original_path(row.id, &absolute)
                            .await?;
                    }
                }
            }
        }

        let mut touched_seasons = BTreeSet::new();
        for file in self.store.list_orphan_episode_files().await? {
            let Some(parsed) = self.library.episode_file_from_path(&file.relative_path) else {
                debug!(path = %file.relative_path, "orphan file is unparsable, leaving as-is");
                continue;
            };

            let series = match self.store.get_series_by_path(&parsed.series_name).await? {
                Some(series) => series,
                None => {
                    self.store
                        .create_series(
                            NewSeries {
                                tmdb_id: None,
                                path: Some(parsed.series_name.clone()),
                                series_metadata_id: None,
                                quality_profile_id: DEFAULT_QUALITY_PROFILE_ID,
                                monitored: true,
                            },
                            SeriesState::Discovered,
                        )
                        .await?
                }
            };

            let season = match self
                .store
                .get_season_by_number(series.id, parsed.season_number)
                .await?
            {
                Some(season) => season,
                None => {
                    self.store
                        .create_season(series.id, parsed.season_number, SeasonState::Discovered)
                        .await?
                }
            };

            let episodes = self.store.list_episodes(season.id).await?;
            match episodes
                .iter()
                .find(|e| e.episode_number == parsed.episode_number)
            {
                Some(existing) if existing.episode_file_id.is_none() => {
                    self.store.set_episode_file(existing.id, file.id).await?;
                }
                Some(_) => {
                    warn!(
                        path = %file.relative_path,
                        "episode already has a file, skipping duplicate"
                    );
                    continue;
                }
                None => {
                    self.store
                        .create_episode(
                            season.id,
                            parsed.episode_number,
                            Some(file.id),
                            EpisodeState::Discovered,
                        )
                        .await?;
                }
            }
            touched_seasons.insert(season.id);
        }

        for season_id in touched_seasons {
            self.store.reevaluate_season(season_id).await?;
        }

        Ok(())
    }

    /// Movie flavor of the discovery sweep; no hierarchy to maintain.
    pub async fn index_movie_library(&self) -> Result<()> {
        let found = self.library.find_movies().await?;
        info!(files = found.len(), "indexing movie library");

        for file in &found {
            let absolute = file.absolute_path.to_string_lossy().to_string();
            let existing = match self.store.find_movie_file_by_path(&file.relative_path).await? {
                Some(row) => Some(row),
                None => self.store.find_movie_file_by_path(&absolute).await?,
            };

            match existing {
                None => {
                    self.store
                        .create_movie_file(NewMediaFile {
                            relative_path: file.relative_path.clone(),
                            original_file_path: Some(absolute),
                            size_bytes: file.size_bytes,
                        })
                        .await?;
                }
                Some(row) => {
                    if row.original_file_path.as_deref() != Some(absolute.as_str()) {
                        self.store
                            .update_movie_file_original_path(row.id, &absolute)
                            .await?;
                    }
                }
            }
        }

        for file in self.store.list_orphan_movie_files().await? {
            let name = std::path::Path::new(&file.relative_path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(&file.relative_path);
            let Some(parsed) = parse_movie(name) else {
                debug!(path = %file.relative_path, "orphan movie file is unparsable");
                continue;
            };

            let movie = match self.store.get_movie_by_path(&parsed.title).await? {
                Some(movie) => movie,
                None => {
                    self.store
                        .create_movie(
                            NewMovie {
                                tmdb_id: None,
                                path: Some(parsed.title.clone()),
                                movie_metadata_id: None,
                                quality_profile_id: DEFAULT_QUALITY_PROFILE_ID,
                                monitored: true,
                            },
                            MovieState::Discovered,
                        )
                        .await?
                }
            };

            if movie.movie_file_id.is_none() {
                self.store.set_movie_file(movie.id, file.id).await?;
            }
        }

        Ok(())
    }
}
