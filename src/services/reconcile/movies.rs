//! Movie sweeps: unreleased flips, release selection for missing movies,
//! discovered matching, and the downloaded-to-completed check.

use anyhow::{Result, anyhow, bail};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Reconciler;
use crate::clients::MOVIE_CATEGORY;
use crate::entities::movie;
use crate::models::parse_provider_date;
use crate::models::snapshot::Snapshot;
use crate::models::state::MovieState;
use crate::services::release::{choose_release, filter_movie_releases, search_indexers};

impl Reconciler {
    /// Unreleased movies whose release date has arrived become missing so
    /// the search sweep will pick them up.
    pub(super) async fn reconcile_unreleased_movies(&self, snapshot: &Snapshot) -> Result<()> {
        let movies = self
            .store
            .list_movies_in_state(MovieState::Unreleased, false)
            .await?;

        for movie in movies {
            let released = match self.movie_release_date(&movie).await? {
                Some(date) => date <= snapshot.today(),
                None => false,
            };
            if released {
                self.store
                    .update_movie_state(movie.id, MovieState::Missing, None)
                    .await?;
            }
        }
        Ok(())
    }

    pub(super) async fn reconcile_missing_movies(
        &self,
        snapshot: &Snapshot,
        token: &CancellationToken,
    ) -> Result<()> {
        if snapshot.indexers.is_empty() {
            bail!("no indexers available");
        }

        let movies = self
            .store
            .list_movies_in_state(MovieState::Missing, true)
            .await?;

        for movie in movies {
            if token.is_cancelled() {
                return Ok(());
            }
            if let Err(e) = self.reconcile_missing_movie(snapshot, &movie).await {
                warn!(movie = movie.id, error = %e, "missing-movie reconcile failed");
            }
        }
        Ok(())
    }

    async fn reconcile_missing_movie(
        &self,
        snapshot: &Snapshot,
        movie: &movie::Model,
    ) -> Result<()> {
        let metadata_id = movie
            .movie_metadata_id
            .ok_or_else(|| anyhow!("movie {} has no metadata", movie.id))?;
        let metadata = self
            .store
            .get_movie_metadata(metadata_id)
            .await?
            .ok_or_else(|| anyhow!("movie metadata {metadata_id} not found"))?;

        if let Some(date) = metadata.release_date.as_deref().and_then(parse_provider_date)
            && date > snapshot.today()
        {
            self.store
                .update_movie_state(movie.id, MovieState::Unreleased, None)
                .await?;
            return Ok(());
        }

        let profile = self
            .store
            .get_quality_profile(movie.quality_profile_id)
            .await?
            .ok_or_else(|| anyhow!("quality profile {} not found", movie.quality_profile_id))?;

        let releases = search_indexers(
            &self.indexer_cache,
            snapshot,
            &[MOVIE_CATEGORY],
            &metadata.title,
        )
        .await;

        let runtime = metadata.runtime_minutes.unwrap_or(0);
        let survivors = filter_movie_releases(
            &profile,
            runtime,
            &snapshot.allowed_protocols(),
            releases,
        );

        let Some(chosen) = choose_release(survivors) else {
            debug!(movie = %metadata.title, "no acceptable release found");
            return Ok(());
        };

        info!(
            movie = %metadata.title,
            release = %chosen.title,
            seeders = ?chosen.seeders,
            "submitting movie release"
        );
        let transition = self.submit_release(snapshot, &chosen).await?;
        self.store
            .update_movie_state(movie.id, MovieState::Downloading, Some(transition))
            .await?;
        Ok(())
    }

    /// Discovered movies get an identity from the provider and, since the
    /// file is already in place, jump straight to Completed.
    pub(super) async fn reconcile_discovered_movies(&self, _snapshot: &Snapshot) -> Result<()> {
        let movies = self
            .store
            .list_movies_in_state(MovieState::Discovered, false)
            .await?;

        for movie in movies {
            if let Err(e) = self.reconcile_discovered_movie(&movie).await {
                warn!(movie = movie.id, error = %e, "discovered-movie reconcile failed");
            }
        }
        Ok(())
    }

    async fn reconcile_discovered_movie(&self, movie: &movie::Model) -> Result<()> {
        if movie.movie_file_id.is_none() {
            debug!(movie = movie.id, "discovered movie has no file yet");
            return Ok(());
        }

        if movie.movie_metadata_id.is_none() {
            let Some(name) = movie.path.clone() else {
                debug!(movie = movie.id, "discovered movie has no path to match on");
                return Ok(());
            };

            let results = self.metadata.search_movie(&name).await?;
            let Some(first) = results.first() else {
                debug!(movie = movie.id, query = %name, "no provider match for movie");
                return Ok(());
            };

            let details = self.metadata.get_movie_details(first.tmdb_id).await?;
            let row = self
                .store
                .upsert_movie_metadata(crate::db::MovieMetadataInput {
                    tmdb_id: details.tmdb_id,
                    title: details.title,
                    overview: details.overview,
                    release_date: details.release_date,
                    runtime_minutes: details.runtime_minutes,
                })
                .await?;
            self.store.link_movie_metadata(movie.id, row.id).await?;
            self.store.set_movie_tmdb_id(movie.id, details.tmdb_id).await?;
        }

        self.store
            .update_movie_state(movie.id, MovieState::Completed, None)
            .await?;
        Ok(())
    }

    /// A downloaded movie with its file linked into the library is done.
    pub(super) async fn reconcile_completed_movies(&self) -> Result<()> {
        let movies = self
            .store
            .list_movies_in_state(MovieState::Downloaded, false)
            .await?;

        for movie in movies {
            if movie.movie_file_id.is_some() {
                self.store
                    .update_movie_state(movie.id, MovieState::Completed, None)
                    .await?;
            }
        }
        Ok(())
    }

    async fn movie_release_date(
        &self,
        movie: &movie::Model,
    ) -> Result<Option<chrono::NaiveDate>> {
        let Some(metadata_id) = movie.movie_metadata_id else {
            return Ok(None);
        };
        let Some(metadata) = self.store.get_movie_metadata(metadata_id).await? else {
            return Ok(None);
        };
        Ok(metadata.release_date.as_deref().and_then(parse_provider_date))
    }
}
