//! Matching discovered episodes against the metadata provider. A discovered
//! episode already has its file; once identity is resolved and linked it
//! goes straight to Completed.

use anyhow::{Result, anyhow};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Reconciler;
use crate::entities::episode;
use crate::models::snapshot::Snapshot;
use crate::models::state::EpisodeState;

impl Reconciler {
    pub(super) async fn reconcile_discovered_episodes(
        &self,
        snapshot: &Snapshot,
        token: &CancellationToken,
    ) -> Result<()> {
        let episodes = self
            .store
            .list_episodes_in_state(EpisodeState::Discovered)
            .await?;

        for episode in episodes {
            if token.is_cancelled() {
                return Ok(());
            }
            if let Err(e) = self.reconcile_discovered_episode(snapshot, &episode).await {
                warn!(episode = episode.id, error = %e, "discovered-episode reconcile failed");
            }
        }
        Ok(())
    }

    async fn reconcile_discovered_episode(
        &self,
        snapshot: &Snapshot,
        episode: &episode::Model,
    ) -> Result<()> {
        if episode.episode_file_id.is_none() {
            debug!(episode = episode.id, "discovered episode has no file yet");
            return Ok(());
        }

        let season = self
            .store
            .get_season(episode.season_id)
            .await?
            .ok_or_else(|| anyhow!("season {} not found", episode.season_id))?;
        let mut series = self
            .store
            .get_series(season.series_id)
            .await?
            .ok_or_else(|| anyhow!("series {} not found", season.series_id))?;

        // Resolve the series identity from its on-disk name first.
        if series.series_metadata_id.is_none() && series.tmdb_id.is_none() {
            let Some(name) = series.path.clone() else {
                debug!(series = series.id, "series has no path to match on");
                return Ok(());
            };
            if !self.catalog.match_series_by_name(series.id, &name).await? {
                return Ok(());
            }
        }

        // Refresh so season and episode metadata rows exist and unlinked
        // seasons get their metadata link.
        self.catalog.refresh_series(series.id, snapshot.today()).await?;

        series = self
            .store
            .get_series(series.id)
            .await?
            .ok_or_else(|| anyhow!("series {} vanished mid-reconcile", season.series_id))?;
        let season = self
            .store
            .get_season(season.id)
            .await?
            .ok_or_else(|| anyhow!("season {} vanished mid-reconcile", episode.season_id))?;

        let Some(season_metadata_id) = season.season_metadata_id else {
            debug!(
                season = season.id,
                series = series.id,
                "provider knows no season {} yet",
                season.season_number
            );
            return Ok(());
        };

        let Some(episode_metadata) = self
            .store
            .get_episode_metadata_by_number(season_metadata_id, episode.episode_number)
            .await?
        else {
            debug!(
                episode = episode.id,
                "provider knows no episode {} yet", episode.episode_number
            );
            return Ok(());
        };

        let current = self
            .store
            .get_episode(episode.id)
            .await?
            .ok_or_else(|| anyhow!("episode {} vanished mid-reconcile", episode.id))?;

        if current.episode_metadata_id != Some(episode_metadata.id)
            && !self
                .store
                .link_episode_metadata(episode.id, episode_metadata.id)
                .await?
        {
            // Another episode already owns this metadata row; leave the
            // discovered episode untouched.
            debug!(
                episode = episode.id,
                metadata = episode_metadata.id,
                "episode metadata already claimed"
            );
            return Ok(());
        }

        self.store
            .update_episode_state(episode.id, EpisodeState::Completed, None)
            .await?;
        Ok(())
    }
}
