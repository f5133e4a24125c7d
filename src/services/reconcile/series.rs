//! Season and episode release selection. A season whose episodes are all
//! missing tries a single season-pack download before falling back to
//! per-episode selection.

use anyhow::{Result, anyhow, bail};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Reconciler;
use crate::clients::TV_CATEGORY;
use crate::entities::{episode, season};
use crate::models::parse_provider_date;
use crate::models::snapshot::Snapshot;
use crate::models::state::{EpisodeState, SeasonState};
use crate::quality::QualityProfile;
use crate::services::release::{
    choose_release, filter_episode_releases, filter_season_pack_releases, search_indexers,
    season_pack_runtime,
};

struct MissingEpisode {
    row: episode::Model,
    air_date: Option<chrono::NaiveDate>,
    runtime_minutes: Option<i32>,
}

impl Reconciler {
    /// Unreleased episodes whose air date has arrived become missing. The
    /// cascade pulls their seasons (and series) along.
    pub(super) async fn reconcile_unreleased_episodes(&self, snapshot: &Snapshot) -> Result<()> {
        let episodes = self
            .store
            .list_episodes_in_state(EpisodeState::Unreleased)
            .await?;

        for episode in episodes {
            let aired = match self.episode_air_date(&episode).await? {
                Some(date) => date <= snapshot.today(),
                None => false,
            };
            if aired {
                self.store
                    .update_episode_state(episode.id, EpisodeState::Missing, None)
                    .await?;
            }
        }
        Ok(())
    }

    pub(super) async fn reconcile_missing_seasons(
        &self,
        snapshot: &Snapshot,
        token: &CancellationToken,
    ) -> Result<()> {
        if snapshot.indexers.is_empty() {
            bail!("no indexers available");
        }

        let seasons = self
            .store
            .list_seasons_in_states(&[SeasonState::Missing])
            .await?;

        for season in seasons {
            if token.is_cancelled() {
                return Ok(());
            }
            if let Err(e) = self.reconcile_missing_season(snapshot, &season).await {
                warn!(season = season.id, error = %e, "missing-season reconcile failed");
            }
        }
        Ok(())
    }

    async fn reconcile_missing_season(
        &self,
        snapshot: &Snapshot,
        season: &season::Model,
    ) -> Result<()> {
        let series = self
            .store
            .get_series(season.series_id)
            .await?
            .ok_or_else(|| anyhow!("series {} not found", season.series_id))?;
        if !series.monitored {
            return Ok(());
        }

        let Some(series_title) = self.series_title(&series).await? else {
            debug!(season = season.id, "series has neither metadata nor path, skipping");
            return Ok(());
        };

        let missing = self.load_missing_episodes(season.id).await?;
        if missing.is_empty() {
            return Ok(());
        }

        // Nothing searchable yet: every missing episode is still ahead of
        // its air date. Move them to Unreleased; the cascade derives the
        // season (Continuing when settled work sits next to them).
        let today = snapshot.today();
        if missing
            .iter()
            .all(|m| m.air_date.is_some_and(|date| date > today))
        {
            for entry in &missing {
                self.store
                    .update_episode_state(entry.row.id, EpisodeState::Unreleased, None)
                    .await?;
            }
            return Ok(());
        }

        let profile = self
            .store
            .get_quality_profile(series.quality_profile_id)
            .await?
            .ok_or_else(|| anyhow!("quality profile {} not found", series.quality_profile_id))?;

        let all_episodes = self.store.list_episodes(season.id).await?;
        if all_episodes.len() == missing.len()
            && self
                .try_season_pack(snapshot, season, &series_title, &profile, &missing)
                .await?
        {
            return Ok(());
        }

        for entry in &missing {
            if let Err(e) = self
                .reconcile_missing_episode(snapshot, season, &series_title, &profile, entry)
                .await
            {
                warn!(episode = entry.row.id, error = %e, "missing-episode reconcile failed");
            }
        }
        Ok(())
    }

    /// Search for one release covering the whole season. On a hit, the
    /// download is submitted once and every missing episode plus the season
    /// itself records the shared reference.
    async fn try_season_pack(
        &self,
        snapshot: &Snapshot,
        season: &season::Model,
        series_title: &str,
        profile: &QualityProfile,
        missing: &[MissingEpisode],
    ) -> Result<bool> {
        let runtimes: Vec<Option<i32>> = missing.iter().map(|m| m.runtime_minutes).collect();
        let runtime = season_pack_runtime(&runtimes);

        let query = format!("{series_title} S{:02}", season.season_number);
        let releases = search_indexers(&self.indexer_cache, snapshot, &[TV_CATEGORY], &query).await;

        let survivors = filter_season_pack_releases(
            profile,
            runtime,
            season.season_number,
            &snapshot.allowed_protocols(),
            releases,
        );

        let Some(chosen) = choose_release(survivors) else {
            debug!(season = season.id, "no acceptable season pack");
            return Ok(false);
        };

        info!(
            series = series_title,
            season = season.season_number,
            release = %chosen.title,
            "submitting season pack"
        );
        let transition = self.submit_release(snapshot, &chosen).await?.season_pack();
        let episode_ids: Vec<i32> = missing.iter().map(|m| m.row.id).collect();
        self.store
            .mark_season_pack_downloading(season.id, episode_ids, transition)
            .await?;
        Ok(true)
    }

    async fn reconcile_missing_episode(
        &self,
        snapshot: &Snapshot,
        season: &season::Model,
        series_title: &str,
        profile: &QualityProfile,
        entry: &MissingEpisode,
    ) -> Result<()> {
        if entry.air_date.is_some_and(|date| date > snapshot.today()) {
            self.store
                .update_episode_state(entry.row.id, EpisodeState::Unreleased, None)
                .await?;
            return Ok(());
        }

        let query = format!(
            "{series_title} S{:02}E{:02}",
            season.season_number, entry.row.episode_number
        );
        let releases = search_indexers(&self.indexer_cache, snapshot, &[TV_CATEGORY], &query).await;

        let survivors = filter_episode_releases(
            profile,
            entry.runtime_minutes.unwrap_or(0),
            season.season_number,
            entry.row.episode_number,
            &snapshot.allowed_protocols(),
            releases,
        );

        let Some(chosen) = choose_release(survivors) else {
            debug!(episode = entry.row.id, "no acceptable episode release");
            return Ok(());
        };

        info!(
            series = series_title,
            season = season.season_number,
            episode = entry.row.episode_number,
            release = %chosen.title,
            "submitting episode release"
        );
        let transition = self.submit_release(snapshot, &chosen).await?;
        self.store
            .update_episode_state(entry.row.id, EpisodeState::Downloading, Some(transition))
            .await?;
        Ok(())
    }

    async fn load_missing_episodes(&self, season_id: i32) -> Result<Vec<MissingEpisode>> {
        let rows = self
            .store
            .list_season_episodes_in_state(season_id, EpisodeState::Missing)
            .await?;

        let mut missing = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata = match row.episode_metadata_id {
                Some(id) => self.store.get_episode_metadata(id).await?,
                None => None,
            };
            missing.push(MissingEpisode {
                air_date: metadata
                    .as_ref()
                    .and_then(|m| m.air_date.as_deref())
                    .and_then(parse_provider_date),
                runtime_minutes: metadata.as_ref().and_then(|m| m.runtime_minutes),
                row,
            });
        }
        Ok(missing)
    }

    async fn episode_air_date(
        &self,
        episode: &episode::Model,
    ) -> Result<Option<chrono::NaiveDate>> {
        let Some(metadata_id) = episode.episode_metadata_id else {
            return Ok(None);
        };
        let Some(metadata) = self.store.get_episode_metadata(metadata_id).await? else {
            return Ok(None);
        };
        Ok(metadata.air_date.as_deref().and_then(parse_provider_date))
    }
}
