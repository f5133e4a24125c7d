//! Shared application state wired once at startup and cloned into the API
//! and the scheduler.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clients::tmdb::TmdbClient;
use crate::clients::{HttpDownloaderFactory, HttpIndexerClientFactory, MetadataProvider};
use crate::config::Config;
use crate::db::Store;
use crate::library::{FsLibrary, Library};
use crate::models::state::JobType;
use crate::services::scheduler::{
    IndexerSyncExecutor, MovieIndexExecutor, MovieReconcileExecutor, SeriesIndexExecutor,
    SeriesReconcileExecutor,
};
use crate::services::{
    ActivityService, CatalogService, IndexerCacheService, IndexingService, JobScheduler,
    Reconciler,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub metadata: Arc<dyn MetadataProvider>,

    pub library: Arc<dyn Library>,

    pub indexer_cache: Arc<IndexerCacheService>,

    pub catalog: Arc<CatalogService>,

    pub reconciler: Arc<Reconciler>,

    pub indexing: Arc<IndexingService>,

    pub activity: Arc<ActivityService>,

    pub scheduler: Arc<JobScheduler>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::new(&config.general.database_path).await?;
        store.initialize_defaults().await?;

        let metadata: Arc<dyn MetadataProvider> =
            Arc::new(TmdbClient::new(&config.tmdb.api_key));
        let library: Arc<dyn Library> = Arc::new(FsLibrary::new(
            config.library.movie_dir.clone(),
            config.library.tv_dir.clone(),
        ));

        let indexer_cache = Arc::new(IndexerCacheService::new(
            store.clone(),
            Arc::new(HttpIndexerClientFactory),
        ));
        indexer_cache.load_persisted().await?;

        let catalog = Arc::new(CatalogService::new(store.clone(), Arc::clone(&metadata)));

        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            Arc::clone(&indexer_cache),
            Arc::new(HttpDownloaderFactory),
            Arc::clone(&library),
            Arc::clone(&catalog),
            Arc::clone(&metadata),
        ));

        let indexing = Arc::new(IndexingService::new(store.clone(), Arc::clone(&library)));
        let activity = Arc::new(ActivityService::new(store.clone()));

        let mut scheduler = JobScheduler::new(store.clone(), config.jobs.clone());
        scheduler.register(
            JobType::MovieIndex,
            Arc::new(MovieIndexExecutor(Arc::clone(&indexing))),
        );
        scheduler.register(
            JobType::SeriesIndex,
            Arc::new(SeriesIndexExecutor(Arc::clone(&indexing))),
        );
        scheduler.register(
            JobType::MovieReconcile,
            Arc::new(MovieReconcileExecutor(Arc::clone(&reconciler))),
        );
        scheduler.register(
            JobType::SeriesReconcile,
            Arc::new(SeriesReconcileExecutor(Arc::clone(&reconciler))),
        );
        scheduler.register(
            JobType::IndexerSync,
            Arc::new(IndexerSyncExecutor(Arc::clone(&indexer_cache))),
        );

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            metadata,
            library,
            indexer_cache,
            catalog,
            reconciler,
            indexing,
            activity,
            scheduler: Arc::new(scheduler),
        })
    }
}
