pub mod activity;
pub mod catalog;
pub mod indexer_cache;
pub mod indexing;
pub mod reconcile;
pub mod release;
pub mod scheduler;

pub use activity::ActivityService;
pub use catalog::CatalogService;
pub use indexer_cache::IndexerCacheService;
pub use indexing::IndexingService;
pub use reconcile::Reconciler;
pub use scheduler::{JobExecutor, JobScheduler};
