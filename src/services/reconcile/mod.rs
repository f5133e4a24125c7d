//! The reconciliation engine: per-class, per-state sweeps that couple the
//! persisted state machines to the indexers, download clients, metadata
//! provider, and library.
//!
//! Every run starts from an immutable [`Snapshot`]. Per-entity failures are
//! logged and the sweep moves on; a sweep-level setup failure (no indexers,
//! storage down) is returned so the job records it.

mod continuing;
mod discovered;
mod downloading;
mod movies;
mod series;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::clients::{Downloader, DownloaderFactory, MetadataProvider};
use crate::db::Store;
use crate::entities::{download_client, series as series_entity, transition};
use crate::library::Library;
use crate::models::snapshot::Snapshot;
use crate::models::state::TransitionMetadata;
use crate::models::release::Release;
use crate::services::catalog::CatalogService;
use crate::services::indexer_cache::IndexerCacheService;

fn record_sweep(name: &'static str, result: Result<()>, first_error: &mut Option<anyhow::Error>) {
    if let Err(e) = result {
        metrics::counter!("vidarr_reconcile_sweep_failures", "sweep" => name).increment(1);
        warn!(sweep = name, error = %e, "sweep failed");
        first_error.get_or_insert(e);
    }
}

pub struct Reconciler {
    store: Store,
    indexer_cache: Arc<IndexerCacheService>,
    downloaders: Arc<dyn DownloaderFactory>,
    library: Arc<dyn Library>,
    catalog: Arc<CatalogService>,
    metadata: Arc<dyn MetadataProvider>,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Store,
        indexer_cache: Arc<IndexerCacheService>,
        downloaders: Arc<dyn DownloaderFactory>,
        library: Arc<dyn Library>,
        catalog: Arc<CatalogService>,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Self {
        Self {
            store,
            indexer_cache,
            downloaders,
            library,
            catalog,
            metadata,
        }
    }

    /// Capture the world as of this instant: clock, cached indexers, and
    /// enabled download clients. Sweeps share this by reference and never
    /// see mid-run configuration changes.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let indexers = self.indexer_cache.usable_indexers().await;
        let download_clients = self
            .store
            .list_enabled_download_clients()
            .await
            .context("loading download clients for snapshot")?;

        Ok(Snapshot {
            now: Utc::now(),
            indexers,
            download_clients,
        })
    }

    /// The full movie pass: unreleased flips, missing search, download
    /// polling, discovered matching, completion checks.
    pub async fn reconcile_movies(&self, token: &CancellationToken) -> Result<()> {
        let snapshot = self.snapshot().await?;
        let mut first_error: Option<anyhow::Error> = None;

        if token.is_cancelled() {
            return Ok(());
        }
        record_sweep(
            "unreleased_movies",
            self.reconcile_unreleased_movies(&snapshot).await,
            &mut first_error,
        );

        if token.is_cancelled() {
            return Ok(());
        }
        record_sweep(
            "missing_movies",
            self.reconcile_missing_movies(&snapshot, token).await,
            &mut first_error,
        );

        if token.is_cancelled() {
            return Ok(());
        }
        record_sweep(
            "downloading_movies",
            self.reconcile_downloading_movies(&snapshot, token).await,
            &mut first_error,
        );

        if token.is_cancelled() {
            return Ok(());
        }
        record_sweep(
            "discovered_movies",
            self.reconcile_discovered_movies(&snapshot).await,
            &mut first_error,
        );

        if token.is_cancelled() {
            return Ok(());
        }
        record_sweep(
            "completed_movies",
            self.reconcile_completed_movies().await,
            &mut first_error,
        );

        first_error.map_or(Ok(()), Err)
    }

    /// The full series pass: unreleased flips, missing seasons (season-pack
    /// first), download polling, continuing refresh, discovered matching,
    /// aggregate completion.
    pub async fn reconcile_series(&self, token: &CancellationToken) -> Result<()> {
        let snapshot = self.snapshot().await?;
        let mut first_error: Option<anyhow::Error> = None;

        if token.is_cancelled() {
            return Ok(());
        }
        record_sweep(
            "unreleased_episodes",
            self.reconcile_unreleased_episodes(&snapshot).await,
            &mut first_error,
        );

        if token.is_cancelled() {
            return Ok(());
        }
        record_sweep(
            "missing_seasons",
            self.reconcile_missing_seasons(&snapshot, token).await,
            &mut first_error,
        );

        if token.is_cancelled() {
            return Ok(());
        }
        record_sweep(
            "downloading_episodes",
            self.reconcile_downloading_episodes(&snapshot, token).await,
            &mut first_error,
        );

        if token.is_cancelled() {
            return Ok(());
        }
        record_sweep(
            "continuing_series",
            self.reconcile_continuing_series(&snapshot, token).await,
            &mut first_error,
        );

        if token.is_cancelled() {
            return Ok(());
        }
        record_sweep(
            "discovered_episodes",
            self.reconcile_discovered_episodes(&snapshot, token).await,
            &mut first_error,
        );

        if token.is_cancelled() {
            return Ok(());
        }
        record_sweep(
            "completed_series",
            self.reconcile_completed(&snapshot).await,
            &mut first_error,
        );

        first_error.map_or(Ok(()), Err)
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    /// Submit a chosen release to the first matching download client and
    /// return the transition metadata that records the in-flight reference.
    pub(crate) async fn submit_release(
        &self,
        snapshot: &Snapshot,
        release: &Release,
    ) -> Result<TransitionMetadata> {
        let client_model = snapshot
            .client_for_protocol(release.protocol)
            .ok_or_else(|| anyhow!("no download client speaks {}", release.protocol))?;
        let downloader = self.downloaders.client(client_model)?;
        let status = downloader.add(release).await?;
        Ok(TransitionMetadata::for_download(&status.id, client_model.id))
    }

    /// Resolve a download client by id, preferring the snapshot's view and
    /// falling back to storage for clients disabled mid-flight.
    pub(crate) async fn downloader_by_id(
        &self,
        snapshot: &Snapshot,
        client_id: i32,
    ) -> Result<Arc<dyn Downloader>> {
        let model: download_client::Model = match snapshot.client_by_id(client_id) {
            Some(model) => model.clone(),
            None => self
                .store
                .get_download_client(client_id)
                .await?
                .ok_or_else(|| anyhow!("download client {client_id} not found"))?,
        };
        self.downloaders.client(&model)
    }

    /// Display title for search queries and library placement: provider
    /// title when linked, on-disk path name otherwise.
    pub(crate) async fn series_title(&self, series: &series_entity::Model) -> Result<Option<String>> {
        if let Some(metadata_id) = series.series_metadata_id
            && let Some(metadata) = self.store.get_series_metadata(metadata_id).await?
        {
            return Ok(Some(metadata.title));
        }
        Ok(series.path.clone())
    }

    /// The in-flight download reference carried by a transition row.
    pub(crate) fn download_ref(
        row: Option<&transition::Model>,
    ) -> Option<(String, i32, bool)> {
        let raw = row?.metadata.as_deref()?;
        let meta = TransitionMetadata::from_json(raw).ok()?;
        Some((
            meta.download_id?,
            meta.download_client_id?,
            meta.is_entire_season_download,
        ))
    }
}
