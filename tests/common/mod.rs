//! Shared fixtures: a temp-file store plus mock collaborators standing in
//! for the metadata provider, indexer aggregator, download client, and
//! library.

#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use vidarr::clients::{
    DownloadStatus, Downloader, DownloaderFactory, IndexerClient, IndexerClientFactory,
    IndexerResource, MetadataProvider, MovieDetails, ReleaseResource, ReleaseSearchRequest,
    SearchMediaResult, SeriesDetails,
};
use vidarr::db::{NewDownloadClient, NewIndexerSource, Store};
use vidarr::entities::{download_client, indexer_source};
use vidarr::library::{
    FoundEpisodeFile, FoundMovieFile, FsLibrary, ImportedFile, Library, LibraryError,
    ParsedEpisodePath,
};
use vidarr::models::release::{Protocol, Release};
use vidarr::services::{CatalogService, IndexerCacheService, Reconciler};

// ----------------------------------------------------------------------
// Metadata provider
// ----------------------------------------------------------------------

#[derive(Default)]
pub struct MockMetadataProvider {
    pub movies: Mutex<HashMap<i32, MovieDetails>>,
    pub series: Mutex<HashMap<i32, SeriesDetails>>,
    pub movie_search: Mutex<Vec<SearchMediaResult>>,
    pub tv_search: Mutex<Vec<SearchMediaResult>>,
}

impl MockMetadataProvider {
    pub fn put_movie(&self, details: MovieDetails) {
        self.movies.lock().unwrap().insert(details.tmdb_id, details);
    }

    pub fn put_series(&self, details: SeriesDetails) {
        self.series.lock().unwrap().insert(details.tmdb_id, details);
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    async fn get_movie_details(&self, tmdb_id: i32) -> Result<MovieDetails> {
        self.movies
            .lock()
            .unwrap()
            .get(&tmdb_id)
            .cloned()
            .ok_or_else(|| anyhow!("mock has no movie {tmdb_id}"))
    }

    async fn get_series_details(&self, tmdb_id: i32) -> Result<SeriesDetails> {
        self.series
            .lock()
            .unwrap()
            .get(&tmdb_id)
            .cloned()
            .ok_or_else(|| anyhow!("mock has no series {tmdb_id}"))
    }

    async fn search_movie(&self, _query: &str) -> Result<Vec<SearchMediaResult>> {
        Ok(self.movie_search.lock().unwrap().clone())
    }

    async fn search_tv(&self, _query: &str) -> Result<Vec<SearchMediaResult>> {
        Ok(self.tv_search.lock().unwrap().clone())
    }

    async fn series_external_ids(&self, _tmdb_id: i32) -> Result<serde_json::Value> {
        Ok(serde_json::json!({}))
    }

    async fn series_watch_providers(&self, _tmdb_id: i32) -> Result<serde_json::Value> {
        Ok(serde_json::json!({}))
    }
}

// ----------------------------------------------------------------------
// Indexer aggregator
// ----------------------------------------------------------------------

#[derive(Default)]
pub struct MockIndexerClient {
    pub releases: Mutex<Vec<ReleaseResource>>,
    pub queries: Mutex<Vec<String>>,
    pub search_count: AtomicUsize,
}

impl MockIndexerClient {
    pub fn put_release(&self, release: ReleaseResource) {
        self.releases.lock().unwrap().push(release);
    }

    pub fn searches(&self) -> usize {
        self.search_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexerClient for MockIndexerClient {
    async fn list_indexers(&self) -> Result<Vec<IndexerResource>> {
        Ok(vec![IndexerResource {
            remote_id: 1,
            name: "mock-indexer".to_string(),
            priority: 1,
            enabled: true,
        }])
    }

    async fn search(&self, request: &ReleaseSearchRequest) -> Result<Vec<ReleaseResource>> {
        self.search_count.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(request.query.clone());
        Ok(self.releases.lock().unwrap().clone())
    }
}

pub struct MockIndexerFactory(pub Arc<MockIndexerClient>);

impl IndexerClientFactory for MockIndexerFactory {
    fn client(&self, _source: &indexer_source::Model) -> Arc<dyn IndexerClient> {
        Arc::clone(&self.0) as Arc<dyn IndexerClient>
    }
}

// ----------------------------------------------------------------------
// Download client
// ----------------------------------------------------------------------

#[derive(Default)]
pub struct MockDownloader {
    pub added: Mutex<Vec<Release>>,
    pub statuses: Mutex<HashMap<String, DownloadStatus>>,
    next_id: AtomicUsize,
}

impl MockDownloader {
    pub fn added_count(&self) -> usize {
        self.added.lock().unwrap().len()
    }

    /// Flip a download to done with the given finished file paths.
    pub fn finish(&self, id: &str, file_paths: Vec<String>) {
        let mut statuses = self.statuses.lock().unwrap();
        let status = statuses
            .entry(id.to_string())
            .or_insert_with(|| DownloadStatus {
                id: id.to_string(),
                name: String::new(),
                done: false,
                file_paths: Vec::new(),
            });
        status.done = true;
        status.file_paths = file_paths;
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    fn protocol(&self) -> Protocol {
        Protocol::Torrent
    }

    async fn add(&self, release: &Release) -> Result<DownloadStatus> {
        let id = format!("dl-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let status = DownloadStatus {
            id: id.clone(),
            name: release.title.clone(),
            done: false,
            file_paths: Vec::new(),
        };
        self.added.lock().unwrap().push(release.clone());
        self.statuses.lock().unwrap().insert(id, status.clone());
        Ok(status)
    }

    async fn get(&self, id: &str) -> Result<DownloadStatus> {
        self.statuses
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("mock has no download {id}"))
    }

    async fn list(&self) -> Result<Vec<DownloadStatus>> {
        Ok(self.statuses.lock().unwrap().values().cloned().collect())
    }
}

pub struct MockDownloaderFactory(pub Arc<MockDownloader>);

impl DownloaderFactory for MockDownloaderFactory {
    fn client(&self, _model: &download_client::Model) -> Result<Arc<dyn Downloader>> {
        Ok(Arc::clone(&self.0) as Arc<dyn Downloader>)
    }
}

// ----------------------------------------------------------------------
// Library
// ----------------------------------------------------------------------

#[derive(Default)]
pub struct MockLibrary {
    pub movie_files: Mutex<Vec<FoundMovieFile>>,
    pub episode_files: Mutex<Vec<FoundEpisodeFile>>,
    pub imported_episodes: Mutex<Vec<(String, i32, PathBuf)>>,
    pub imported_movies: Mutex<Vec<(String, PathBuf)>>,
}

impl MockLibrary {
    pub fn put_episode_file(&self, file: FoundEpisodeFile) {
        self.episode_files.lock().unwrap().push(file);
    }

    pub fn put_movie_file(&self, file: FoundMovieFile) {
        self.movie_files.lock().unwrap().push(file);
    }
}

#[async_trait]
impl Library for MockLibrary {
    async fn find_movies(&self) -> Result<Vec<FoundMovieFile>> {
        Ok(self.movie_files.lock().unwrap().clone())
    }

    async fn find_episodes(&self) -> Result<Vec<FoundEpisodeFile>> {
        Ok(self.episode_files.lock().unwrap().clone())
    }

    async fn add_movie(&self, title: &str, source: &Path) -> Result<ImportedFile, LibraryError> {
        self.imported_movies
            .lock()
            .unwrap()
            .push((title.to_string(), source.to_path_buf()));
        let file_name = source.file_name().unwrap().to_string_lossy();
        Ok(ImportedFile {
            relative_path: format!("{title}/{file_name}"),
            absolute_path: PathBuf::from(format!("/library/movies/{title}/{file_name}")),
            size_bytes: 1024,
        })
    }

    async fn add_episode(
        &self,
        series_title: &str,
        season_number: i32,
        source: &Path,
    ) -> Result<ImportedFile, LibraryError> {
        self.imported_episodes.lock().unwrap().push((
            series_title.to_string(),
            season_number,
            source.to_path_buf(),
        ));
        let file_name = source.file_name().unwrap().to_string_lossy();
        Ok(ImportedFile {
            relative_path: format!("{series_title}/S{season_number:02}/{file_name}"),
            absolute_path: PathBuf::from(format!(
                "/library/tv/{series_title}/S{season_number:02}/{file_name}"
            )),
            size_bytes: 1024,
        })
    }

    fn episode_file_from_path(&self, path: &str) -> Option<ParsedEpisodePath> {
        FsLibrary::new("/nonexistent/movies", "/nonexistent/tv").episode_file_from_path(path)
    }
}

// ----------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------

pub struct Harness {
    pub store: Store,
    pub metadata: Arc<MockMetadataProvider>,
    pub indexer: Arc<MockIndexerClient>,
    pub indexer_cache: Arc<IndexerCacheService>,
    pub downloader: Arc<MockDownloader>,
    pub library: Arc<MockLibrary>,
    pub catalog: Arc<CatalogService>,
    pub reconciler: Arc<Reconciler>,
    pub download_client_id: i32,
}

pub async fn temp_store() -> Store {
    let db_path = std::env::temp_dir().join(format!("vidarr-test-{}.db", uuid::Uuid::new_v4()));
    let store = Store::new(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("failed to open test store");
    store.initialize_defaults().await.expect("failed to seed defaults");
    store
}

pub async fn harness() -> Harness {
    let store = temp_store().await;

    let metadata = Arc::new(MockMetadataProvider::default());
    let indexer = Arc::new(MockIndexerClient::default());
    let downloader = Arc::new(MockDownloader::default());
    let library = Arc::new(MockLibrary::default());

    let source = store
        .create_indexer_source(NewIndexerSource {
            name: "mock-source".to_string(),
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: 9696,
            api_key: None,
            enabled: true,
        })
        .await
        .expect("failed to create indexer source");

    let indexer_cache = Arc::new(IndexerCacheService::new(
        store.clone(),
        Arc::new(MockIndexerFactory(Arc::clone(&indexer))),
    ));
    indexer_cache
        .refresh_source(source.id)
        .await
        .expect("failed to refresh mock source");

    let client_row = store
        .create_download_client(NewDownloadClient {
            name: "mock-client".to_string(),
            implementation: "mock".to_string(),
            protocol: Protocol::Torrent,
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: 9091,
            api_key: None,
            enabled: true,
        })
        .await
        .expect("failed to create download client");

    let catalog = Arc::new(CatalogService::new(
        store.clone(),
        Arc::clone(&metadata) as Arc<dyn MetadataProvider>,
    ));

    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        Arc::clone(&indexer_cache),
        Arc::new(MockDownloaderFactory(Arc::clone(&downloader))),
        Arc::clone(&library) as Arc<dyn Library>,
        Arc::clone(&catalog),
        Arc::clone(&metadata) as Arc<dyn MetadataProvider>,
    ));

    Harness {
        store,
        metadata,
        indexer,
        indexer_cache,
        downloader,
        library,
        catalog,
        reconciler,
        download_client_id: client_row.id,
    }
}

/// Size in bytes that works out to the given MB-per-minute at a runtime.
#[allow(clippy::cast_possible_truncation)]
pub fn size_for_rate(mb_per_min: f64, runtime_minutes: i32) -> i64 {
    (mb_per_min * f64::from(runtime_minutes) * 1_048_576.0) as i64
}

pub fn torrent_release(title: &str, size_bytes: i64, seeders: Option<i32>) -> ReleaseResource {
    ReleaseResource {
        title: title.to_string(),
        size_bytes,
        seeders,
        protocol: Protocol::Torrent,
        download_url: format!("http://mock/dl/{title}"),
    }
}
