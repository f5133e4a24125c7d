//! Contracts for the external collaborators (metadata provider, indexer
//! aggregator, download clients) plus the concrete HTTP implementations.
//! The engine only ever sees the traits; tests substitute their own.

pub mod prowlarr;
pub mod sabnzbd;
pub mod tmdb;
pub mod transmission;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::entities::{download_client, indexer_source};
use crate::models::release::{Protocol, Release};

/// Aggregator category for movie searches.
pub const MOVIE_CATEGORY: i32 = 2000;
/// Aggregator category for TV searches.
pub const TV_CATEGORY: i32 = 5000;

pub const DEFAULT_SEARCH_LIMIT: i32 = 100;

// ----------------------------------------------------------------------
// Metadata provider
// ----------------------------------------------------------------------

/// Dates are provider-format `YYYY-MM-DD`; `None` means the provider had an
/// empty value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub tmdb_id: i32,
    pub title: String,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub runtime_minutes: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDetails {
    pub episode_number: i32,
    pub title: Option<String>,
    pub air_date: Option<String>,
    pub runtime_minutes: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonDetails {
    pub season_number: i32,
    pub title: Option<String>,
    pub episodes: Vec<EpisodeDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDetails {
    pub tmdb_id: i32,
    pub title: String,
    pub overview: Option<String>,
    pub first_air_date: Option<String>,
    pub seasons: Vec<SeasonDetails>,
}

/// Movie and TV search results normalized into one shape. The provider emits
/// `title`/`release_date` for movies and `name`/`first_air_date` for TV; the
/// split stays at the client boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMediaResult {
    pub tmdb_id: i32,
    pub title: String,
    pub date: Option<String>,
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn get_movie_details(&self, tmdb_id: i32) -> Result<MovieDetails>;

    async fn get_series_details(&self, tmdb_id: i32) -> Result<SeriesDetails>;

    async fn search_movie(&self, query: &str) -> Result<Vec<SearchMediaResult>>;

    async fn search_tv(&self, query: &str) -> Result<Vec<SearchMediaResult>>;

    /// Optional enrichment; callers swallow failures.
    async fn series_external_ids(&self, tmdb_id: i32) -> Result<serde_json::Value>;

    /// Optional enrichment; callers swallow failures.
    async fn series_watch_providers(&self, tmdb_id: i32) -> Result<serde_json::Value>;
}

// ----------------------------------------------------------------------
// Indexer aggregator
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerResource {
    pub remote_id: i32,
    pub name: String,
    pub priority: i32,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseSearchRequest {
    pub indexer_ids: Vec<i32>,
    pub categories: Vec<i32>,
    pub query: String,
    pub limit: i32,
}

impl ReleaseSearchRequest {
    #[must_use]
    pub fn new(indexer_ids: Vec<i32>, categories: Vec<i32>, query: impl Into<String>) -> Self {
        Self {
            indexer_ids,
            categories,
            query: query.into(),
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

/// A release as the aggregator reports it, before it is tied to one of our
/// indexer rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseResource {
    pub title: String,
    pub size_bytes: i64,
    pub seeders: Option<i32>,
    pub protocol: Protocol,
    pub download_url: String,
}

impl ReleaseResource {
    #[must_use]
    pub fn into_release(self, indexer_id: i32) -> Release {
        Release {
            title: self.title,
            size_bytes: self.size_bytes,
            seeders: self.seeders,
            protocol: self.protocol,
            download_url: self.download_url,
            indexer_id,
        }
    }
}

#[async_trait]
pub trait IndexerClient: Send + Sync {
    async fn list_indexers(&self) -> Result<Vec<IndexerResource>>;

    async fn search(&self, request: &ReleaseSearchRequest) -> Result<Vec<ReleaseResource>>;
}

/// Builds an aggregator client for a stored connection descriptor.
pub trait IndexerClientFactory: Send + Sync {
    fn client(&self, source: &indexer_source::Model) -> Arc<dyn IndexerClient>;
}

pub struct HttpIndexerClientFactory;

impl IndexerClientFactory for HttpIndexerClientFactory {
    fn client(&self, source: &indexer_source::Model) -> Arc<dyn IndexerClient> {
        Arc::new(prowlarr::ProwlarrClient::new(
            &format!("{}://{}:{}", source.scheme, source.host, source.port),
            source.api_key.as_deref().unwrap_or_default(),
        ))
    }
}

// ----------------------------------------------------------------------
// Download clients
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadStatus {
    pub id: String,
    pub name: String,
    pub done: bool,
    pub file_paths: Vec<String>,
}

#[async_trait]
pub trait Downloader: Send + Sync {
    fn protocol(&self) -> Protocol;

    async fn add(&self, release: &Release) -> Result<DownloadStatus>;

    async fn get(&self, id: &str) -> Result<DownloadStatus>;

    async fn list(&self) -> Result<Vec<DownloadStatus>>;
}

/// Builds a download-client handle for a stored connection descriptor.
pub trait DownloaderFactory: Send + Sync {
    fn client(&self, model: &download_client::Model) -> Result<Arc<dyn Downloader>>;
}

pub struct HttpDownloaderFactory;

impl DownloaderFactory for HttpDownloaderFactory {
    fn client(&self, model: &download_client::Model) -> Result<Arc<dyn Downloader>> {
        let base_url = format!("{}://{}:{}", model.scheme, model.host, model.port);
        match model.implementation.as_str() {
            "transmission" => Ok(Arc::new(transmission::TransmissionClient::new(&base_url))),
            "sabnzbd" => Ok(Arc::new(sabnzbd::SabnzbdClient::new(
                &base_url,
                model.api_key.as_deref().unwrap_or_default(),
            ))),
            other => bail!("unknown download client implementation: {other}"),
        }
    }
}

pub(crate) fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
