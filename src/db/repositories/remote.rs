//! Connection descriptors for the external services: indexer sources, the
//! indexers they report, and download clients.

use anyhow::Result;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use crate::entities::{download_client, indexer, indexer_source, prelude::*};
use crate::models::now_rfc3339;
use crate::models::release::Protocol;

pub struct NewIndexerSource {
    pub name: String,
    pub scheme: String,
    pub host: String,
    pub port: i32,
    pub api_key: Option<String>,
    pub enabled: bool,
}

pub struct NewIndexer {
    pub remote_id: i32,
    pub name: String,
    pub priority: i32,
    pub enabled: bool,
}

pub struct NewDownloadClient {
    pub name: String,
    pub implementation: String,
    pub protocol: Protocol,
    pub scheme: String,
    pub host: String,
    pub port: i32,
    pub api_key: Option<String>,
    pub enabled: bool,
}

pub struct RemoteRepository {
    conn: DatabaseConnection,
}

impl RemoteRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    // ------------------------------------------------------------------
    // Indexer sources
    // ------------------------------------------------------------------

    pub async fn create_indexer_source(
        &self,
        input: NewIndexerSource,
    ) -> Result<indexer_source::Model> {
        let row = indexer_source::ActiveModel {
            name: Set(input.name),
            scheme: Set(input.scheme),
            host: Set(input.host),
            port: Set(input.port),
            api_key: Set(input.api_key),
            enabled: Set(input.enabled),
            created_at: Set(now_rfc3339()),
            ..Default::default()
        };
        Ok(row.insert(&self.conn).await?)
    }

    pub async fn get_indexer_source(&self, id: i32) -> Result<Option<indexer_source::Model>> {
        Ok(IndexerSource::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn list_indexer_sources(&self) -> Result<Vec<indexer_source::Model>> {
        Ok(IndexerSource::find()
            .order_by_asc(indexer_source::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_enabled_indexer_sources(&self) -> Result<Vec<indexer_source::Model>> {
        Ok(IndexerSource::find()
            .filter(indexer_source::Column::Enabled.eq(true))
            .order_by_asc(indexer_source::Column::Id)
            .all(&self.conn)
            .await?)
    }

    /// Remove a source and every indexer attached to it, children first.
    pub async fn delete_indexer_source(&self, id: i32) -> Result<()> {
        self.conn
            .transaction::<_, (), DbErr>(move |txn| {
                Box::pin(async move {
                    Indexer::delete_many()
                        .filter(indexer::Column::IndexerSourceId.eq(id))
                        .exec(txn)
                        .await?;
                    IndexerSource::delete_by_id(id).exec(txn).await?;
                    Ok(())
                })
            })
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Indexers
    // ------------------------------------------------------------------

    /// Replace the persisted indexer list for a source with what its
    /// aggregator just reported.
    pub async fn replace_indexers(
        &self,
        source_id: i32,
        indexers: Vec<NewIndexer>,
    ) -> Result<Vec<indexer::Model>> {
        self.conn
            .transaction::<_, (), DbErr>(move |txn| {
                Box::pin(async move {
                    Indexer::delete_many()
                        .filter(indexer::Column::IndexerSourceId.eq(source_id))
                        .exec(txn)
                        .await?;
                    for input in indexers {
                        indexer::ActiveModel {
                            indexer_source_id: Set(source_id),
                            remote_id: Set(input.remote_id),
                            name: Set(input.name),
                            priority: Set(input.priority),
                            enabled: Set(input.enabled),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;
                    }
                    Ok(())
                })
            })
            .await?;

        self.list_indexers_for_source(source_id).await
    }

    pub async fn list_indexers_for_source(&self, source_id: i32) -> Result<Vec<indexer::Model>> {
        Ok(Indexer::find()
            .filter(indexer::Column::IndexerSourceId.eq(source_id))
            .order_by_asc(indexer::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_enabled_indexers(&self) -> Result<Vec<indexer::Model>> {
        Ok(Indexer::find()
            .filter(indexer::Column::Enabled.eq(true))
            .order_by_asc(indexer::Column::Id)
            .all(&self.conn)
            .await?)
    }

    // ------------------------------------------------------------------
    // Download clients
    // ------------------------------------------------------------------

    pub async fn create_download_client(
        &self,
        input: NewDownloadClient,
    ) -> Result<download_client::Model> {
        let row = download_client::ActiveModel {
            name: Set(input.name),
            implementation: Set(input.implementation),
            protocol: Set(input.protocol.as_str().to_string()),
            scheme: Set(input.scheme),
            host: Set(input.host),
            port: Set(input.port),
            api_key: Set(input.api_key),
            enabled: Set(input.enabled),
            created_at: Set(now_rfc3339()),
            ..Default::default()
        };
        Ok(row.insert(&self.conn).await?)
    }

    pub async fn get_download_client(&self, id: i32) -> Result<Option<download_client::Model>> {
        Ok(DownloadClient::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn list_download_clients(&self) -> Result<Vec<download_client::Model>> {
        Ok(DownloadClient::find()
            .order_by_asc(download_client::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_enabled_download_clients(&self) -> Result<Vec<download_client::Model>> {
        Ok(DownloadClient::find()
            .filter(download_client::Column::Enabled.eq(true))
            .order_by_asc(download_client::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn delete_download_client(&self, id: i32) -> Result<()> {
        DownloadClient::delete_by_id(id).exec(&self.conn).await?;
        Ok(())
    }
}
