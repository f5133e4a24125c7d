//! Continuing-series refresh and the aggregate completion sweep.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::Reconciler;
use crate::models::snapshot::Snapshot;
use crate::models::state::{EpisodeState, SeasonState, SeriesState};

impl Reconciler {
    /// Series still expecting work get fresh provider facts: new episode
    /// rows for newly-announced episodes and metadata links for seasons
    /// that never got one.
    pub(super) async fn reconcile_continuing_series(
        &self,
        snapshot: &Snapshot,
        token: &CancellationToken,
    ) -> Result<()> {
        let series = self
            .store
            .list_series_in_states(&[SeriesState::Continuing, SeriesState::Downloading])
            .await?;

        for entry in series {
            if token.is_cancelled() {
                return Ok(());
            }
            if entry.tmdb_id.is_none() && entry.series_metadata_id.is_none() {
                // Discovered-but-unmatched series are the discovered sweep's
                // problem, not ours.
                continue;
            }
            if let Err(e) = self.catalog.refresh_series(entry.id, snapshot.today()).await {
                warn!(series = entry.id, error = %e, "continuing refresh failed");
            }
        }
        Ok(())
    }

    /// Re-derive aggregate states for seasons that were mid-flight, and
    /// promote downloaded episodes with linked files to completed.
    pub(super) async fn reconcile_completed(&self, _snapshot: &Snapshot) -> Result<()> {
        let episodes = self
            .store
            .list_episodes_in_state(EpisodeState::Downloaded)
            .await?;
        for episode in episodes {
            if episode.episode_file_id.is_some() {
                self.store
                    .update_episode_state(episode.id, EpisodeState::Completed, None)
                    .await?;
            }
        }

        let seasons = self
            .store
            .list_seasons_in_states(&[SeasonState::Downloading, SeasonState::Continuing])
            .await?;
        for season in seasons {
            if let Err(e) = self.store.reevaluate_season(season.id).await {
                warn!(season = season.id, error = %e, "season re-evaluation failed");
            }
        }
        Ok(())
    }
}
