//! In-memory cache of indexer descriptors, one entry per configured
//! aggregator source. Refreshed out-of-band by the indexer-sync job;
//! reconcile snapshots read whatever the cache currently holds.

use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::clients::{IndexerClient, IndexerClientFactory};
use crate::db::repositories::remote::NewIndexer;
use crate::db::Store;
use crate::entities::{indexer, indexer_source};

#[derive(Clone)]
pub struct CachedSource {
    pub source: indexer_source::Model,
    pub indexers: Vec<indexer::Model>,
}

pub struct IndexerCacheService {
    store: Store,
    factory: Arc<dyn IndexerClientFactory>,
    cache: RwLock<HashMap<i32, CachedSource>>,
}

impl IndexerCacheService {
    #[must_use]
    pub fn new(store: Store, factory: Arc<dyn IndexerClientFactory>) -> Self {
        Self {
            store,
            factory,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the cache from persisted rows so snapshots work before the
    /// first sync job has run.
    pub async fn load_persisted(&self) -> Result<()> {
        let sources = self.store.list_enabled_indexer_sources().await?;
        let mut cache = self.cache.write().await;
        for source in sources {
            let indexers = self.store.list_indexers_for_source(source.id).await?;
            cache.insert(source.id, CachedSource { source, indexers });
        }
        Ok(())
    }

    /// Fetch the indexer list from one source, persist it, and overwrite the
    /// cache entry.
    pub async fn refresh_source(&self, source_id: i32) -> Result<()> {
        let source = self
            .store
            .get_indexer_source(source_id)
            .await?
            .ok_or_else(|| anyhow!("indexer source {source_id} not found"))?;

        let client = self.factory.client(&source);
        let resources = client.list_indexers().await?;
        let count = resources.len();

        let rows = resources
            .into_iter()
            .map(|r| NewIndexer {
                remote_id: r.remote_id,
                name: r.name,
                priority: r.priority,
                enabled: r.enabled,
            })
            .collect();
        let indexers = self.store.replace_indexers(source_id, rows).await?;

        info!(source = %source.name, indexers = count, "indexer source refreshed");
        self.cache
            .write()
            .await
            .insert(source_id, CachedSource { source, indexers });
        Ok(())
    }

    /// Refresh every enabled source. Failures accumulate; one bad source
    /// never hides the others.
    pub async fn refresh_all(&self) -> Result<()> {
        let sources = self.store.list_enabled_indexer_sources().await?;

        let mut failures: Vec<(String, anyhow::Error)> = Vec::new();
        for source in sources {
            if let Err(e) = self.refresh_source(source.id).await {
                warn!(source = %source.name, error = %e, "indexer source refresh failed");
                failures.push((source.name, e));
            }
        }

        if failures.is_empty() {
            return Ok(());
        }
        let mut message = String::from("indexer refresh failures:");
        for (name, error) in &failures {
            let _ = write!(message, " {name}: {error};");
        }
        Err(anyhow!(message))
    }

    /// Delete a source: the persisted indexers and source row go first, and
    /// only then is the cache entry evicted. Evicting early would let a
    /// failed store delete leave live rows invisible to snapshots.
    pub async fn delete_source(&self, source_id: i32) -> Result<()> {
        self.store.delete_indexer_source(source_id).await?;
        self.cache.write().await.remove(&source_id);
        Ok(())
    }

    /// Every enabled indexer currently cached, across all sources.
    pub async fn usable_indexers(&self) -> Vec<indexer::Model> {
        let cache = self.cache.read().await;
        let mut indexers: Vec<indexer::Model> = cache
            .values()
            .flat_map(|entry| entry.indexers.iter().filter(|i| i.enabled).cloned())
            .collect();
        indexers.sort_by_key(|i| i.id);
        indexers
    }

    pub async fn client_for_source(&self, source_id: i32) -> Option<Arc<dyn IndexerClient>> {
        let cache = self.cache.read().await;
        cache.get(&source_id).map(|entry| self.factory.client(&entry.source))
    }
}
