//! Prowlarr-style indexer aggregator client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{IndexerClient, IndexerResource, ReleaseResource, ReleaseSearchRequest};
use crate::models::release::Protocol;

pub struct ProwlarrClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl ProwlarrClient {
    #[must_use]
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIndexer {
    id: i32,
    name: String,
    #[serde(default)]
    enable: bool,
    #[serde(default)]
    priority: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRelease {
    title: String,
    #[serde(default)]
    size: i64,
    seeders: Option<i32>,
    protocol: String,
    download_url: Option<String>,
    #[serde(default)]
    guid: Option<String>,
}

#[async_trait]
impl IndexerClient for ProwlarrClient {
    async fn list_indexers(&self) -> Result<Vec<IndexerResource>> {
        let url = format!("{}/api/v1/indexer", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .context("indexer aggregator unreachable")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("indexer aggregator returned {status} listing indexers");
        }

        let wire: Vec<WireIndexer> = response
            .json()
            .await
            .context("indexer list decode failed")?;

        Ok(wire
            .into_iter()
            .map(|i| IndexerResource {
                remote_id: i.id,
                name: i.name,
                priority: i.priority,
                enabled: i.enable,
            })
            .collect())
    }

    async fn search(&self, request: &ReleaseSearchRequest) -> Result<Vec<ReleaseResource>> {
        let url = format!("{}/api/v1/search", self.base_url);

        let mut query: Vec<(String, String)> = vec![
            ("query".to_string(), request.query.clone()),
            ("limit".to_string(), request.limit.to_string()),
        ];
        for id in &request.indexer_ids {
            query.push(("indexerIds".to_string(), id.to_string()));
        }
        for category in &request.categories {
            query.push(("categories".to_string(), category.to_string()));
        }

        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&query)
            .send()
            .await
            .context("indexer aggregator unreachable")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("indexer aggregator returned {status} for search");
        }

        let wire: Vec<WireRelease> = response
            .json()
            .await
            .context("search response decode failed")?;

        let releases = wire
            .into_iter()
            .filter_map(|r| {
                let protocol: Protocol = r.protocol.parse().ok()?;
                let download_url = r.download_url.or(r.guid)?;
                Some(ReleaseResource {
                    title: r.title,
                    size_bytes: r.size,
                    seeders: r.seeders,
                    protocol,
                    download_url,
                })
            })
            .collect();

        Ok(releases)
    }
}
