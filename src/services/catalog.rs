//! Metadata-driven catalog maintenance: adding movies and series, and
//! refreshing a series so its season/episode rows track the provider.

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::{MetadataProvider, SeriesDetails};
use crate::db::{
    EpisodeMetadataInput, MovieMetadataInput, NewMovie, NewSeries, SeriesMetadataInput, Store,
};
use crate::entities::{movie, series};
use crate::models::parse_provider_date;
use crate::models::state::{EpisodeState, MovieState, SeriesState};

pub struct CatalogService {
    store: Store,
    metadata: Arc<dyn MetadataProvider>,
}

/// Initial state for an episode that has no file yet: aired means missing,
/// unaired means unreleased. An unknown air date counts as aired.
fn episode_initial_state(air_date: Option<&str>, today: NaiveDate) -> EpisodeState {
    match air_date.and_then(parse_provider_date) {
        Some(date) if date > today => EpisodeState::Unreleased,
        _ => EpisodeState::Missing,
    }
}

impl CatalogService {
    #[must_use]
    pub fn new(store: Store, metadata: Arc<dyn MetadataProvider>) -> Self {
        Self { store, metadata }
    }

    pub async fn add_movie(
        &self,
        tmdb_id: i32,
        quality_profile_id: i32,
        monitored: bool,
    ) -> Result<movie::Model> {
        if let Some(existing) = self.store.get_movie_by_tmdb_id(tmdb_id).await? {
            return Ok(existing);
        }

        let details = self.metadata.get_movie_details(tmdb_id).await?;
        let metadata_row = self
            .store
            .upsert_movie_metadata(MovieMetadataInput {
                tmdb_id: details.tmdb_id,
                title: details.title.clone(),
                overview: details.overview.clone(),
                release_date: details.release_date.clone(),
                runtime_minutes: details.runtime_minutes,
            })
            .await?;

        let today = Utc::now().date_naive();
        let initial = match details.release_date.as_deref().and_then(parse_provider_date) {
            Some(date) if date > today => MovieState::Unreleased,
            _ => MovieState::Missing,
        };

        let created = self
            .store
            .create_movie(
                NewMovie {
                    tmdb_id: Some(tmdb_id),
                    path: None,
                    movie_metadata_id: Some(metadata_row.id),
                    quality_profile_id,
                    monitored,
                },
                initial,
            )
            .await?;

        info!(movie = %details.title, state = %initial, "movie added");
        Ok(created)
    }

    pub async fn add_series(
        &self,
        tmdb_id: i32,
        quality_profile_id: i32,
        monitored: bool,
    ) -> Result<series::Model> {
        if let Some(existing) = self.store.get_series_by_tmdb_id(tmdb_id).await? {
            return Ok(existing);
        }

        let created = self
            .store
            .create_series(
                NewSeries {
                    tmdb_id: Some(tmdb_id),
                    path: None,
                    series_metadata_id: None,
                    quality_profile_id,
                    monitored,
                },
                SeriesState::Missing,
            )
            .await?;

        self.refresh_series(created.id, Utc::now().date_naive()).await?;

        self.store
            .get_series(created.id)
            .await?
            .ok_or_else(|| anyhow!("series {} vanished after create", created.id))
    }

    /// Pull fresh provider facts for a series and bring the storage rows in
    /// line: metadata upserts, season/episode creation for anything new, and
    /// metadata links for rows that never got one.
    pub async fn refresh_series(&self, series_id: i32, today: NaiveDate) -> Result<()> {
        let series = self
            .store
            .get_series(series_id)
            .await?
            .ok_or_else(|| anyhow!("series {series_id} not found"))?;

        let tmdb_id = match series.tmdb_id {
            Some(id) => id,
            None => match series.series_metadata_id {
                Some(metadata_id) => self
                    .store
                    .get_series_metadata(metadata_id)
                    .await?
                    .map(|m| m.tmdb_id)
                    .ok_or_else(|| anyhow!("series {series_id} has a dangling metadata link"))?,
                None => anyhow::bail!("series {series_id} has no provider identity to refresh"),
            },
        };

        let details = self.metadata.get_series_details(tmdb_id).await?;
        let series_metadata = self.persist_series_metadata(&details).await?;

        if series.series_metadata_id.is_none() {
            self.store.link_series_metadata(series.id, series_metadata.id).await?;
        }

        let mut touched_seasons = Vec::new();
        for season_details in &details.seasons {
            // Specials live outside the season/episode lifecycle.
            if season_details.season_number == 0 {
                continue;
            }

            let season_metadata = self
                .store
                .upsert_season_metadata(
                    series_metadata.id,
                    season_details.season_number,
                    season_details.title.clone(),
                )
                .await?;

            let season = match self
                .store
                .get_season_by_number(series.id, season_details.season_number)
                .await?
            {
                Some(season) => season,
                None => {
                    self.store
                        .create_season(
                            series.id,
                            season_details.season_number,
                            crate::models::state::SeasonState::Missing,
                        )
                        .await?
                }
            };

            if season.season_metadata_id.is_none() {
                self.store.link_season_metadata(season.id, season_metadata.id).await?;
            }

            let existing_episodes = self.store.list_episodes(season.id).await?;

            for episode_details in &season_details.episodes {
                let episode_metadata = self
                    .store
                    .upsert_episode_metadata(
                        season_metadata.id,
                        EpisodeMetadataInput {
                            episode_number: episode_details.episode_number,
                            title: episode_details.title.clone(),
                            air_date: episode_details.air_date.clone(),
                            runtime_minutes: episode_details.runtime_minutes,
                        },
                    )
                    .await?;

                if let Some(existing) = existing_episodes
                    .iter()
                    .find(|e| e.episode_number == episode_details.episode_number)
                {
                    if existing.episode_metadata_id.is_none()
                        && !self.store.link_episode_metadata(existing.id, episode_metadata.id).await?
                    {
                        debug!(
                            episode = existing.id,
                            "episode metadata already claimed, leaving unlinked"
                        );
                    }
                    continue;
                }

                let initial =
                    episode_initial_state(episode_details.air_date.as_deref(), today);
                let created = self
                    .store
                    .create_episode(season.id, episode_details.episode_number, None, initial)
                    .await?;
                self.store.link_episode_metadata(created.id, episode_metadata.id).await?;
            }

            touched_seasons.push(season.id);
        }

        for season_id in touched_seasons {
            self.store.reevaluate_season(season_id).await?;
        }

        Ok(())
    }

    async fn persist_series_metadata(
        &self,
        details: &SeriesDetails,
    ) -> Result<crate::entities::series_metadata::Model> {
        // Enrichment calls are best-effort; a provider hiccup here must not
        // fail the refresh.
        let external_ids = match self.metadata.series_external_ids(details.tmdb_id).await {
            Ok(value) => serde_json::to_string(&value).ok(),
            Err(e) => {
                debug!(tmdb_id = details.tmdb_id, error = %e, "external ids fetch failed");
                None
            }
        };
        let watch_providers = match self.metadata.series_watch_providers(details.tmdb_id).await {
            Ok(value) => serde_json::to_string(&value).ok(),
            Err(e) => {
                debug!(tmdb_id = details.tmdb_id, error = %e, "watch providers fetch failed");
                None
            }
        };

        self.store
            .upsert_series_metadata(SeriesMetadataInput {
                tmdb_id: details.tmdb_id,
                title: details.title.clone(),
                overview: details.overview.clone(),
                first_air_date: details.first_air_date.clone(),
                external_ids,
                watch_providers,
            })
            .await
    }

    /// Give a metadata-less series an identity by searching the provider
    /// for its on-disk name and taking the first hit.
    pub async fn match_series_by_name(&self, series_id: i32, name: &str) -> Result<bool> {
        let results = self.metadata.search_tv(name).await?;
        let Some(first) = results.first() else {
            warn!(series = series_id, query = name, "no provider match for series");
            return Ok(false);
        };

        self.store.set_series_tmdb_id(series_id, first.tmdb_id).await?;
        info!(series = series_id, tmdb_id = first.tmdb_id, query = name, "series matched");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aired_or_unknown_dates_mean_missing() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        assert_eq!(
            episode_initial_state(Some("2026-07-01"), today),
            EpisodeState::Missing
        );
        assert_eq!(episode_initial_state(None, today), EpisodeState::Missing);
        assert_eq!(
            episode_initial_state(Some("2026-08-01"), today),
            EpisodeState::Missing
        );
    }

    #[test]
    fn future_dates_mean_unreleased() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        assert_eq!(
            episode_initial_state(Some("2026-09-15"), today),
            EpisodeState::Unreleased
        );
    }
}
