//! SABnzbd download client (usenet protocol).

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{DownloadStatus, Downloader};
use crate::models::release::{Protocol, Release};

pub struct SabnzbdClient {
    http: Client,
    api_url: String,
    api_key: String,
}

impl SabnzbdClient {
    #[must_use]
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_url: format!("{}/api", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T> {
        let mut query: Vec<(&str, &str)> = vec![
            ("apikey", self.api_key.as_str()),
            ("output", "json"),
        ];
        query.extend_from_slice(params);

        let response = self
            .http
            .get(&self.api_url)
            .query(&query)
            .send()
            .await
            .context("sabnzbd unreachable")?;

        let status = response.status();
        if !status.is_success() {
            bail!("sabnzbd returned {status}");
        }

        response.json::<T>().await.context("sabnzbd response decode failed")
    }

    /// Look for the download in history (finished items) first, then in the
    /// live queue.
    async fn find_status(&self, id: &str) -> Result<Option<DownloadStatus>> {
        let history: HistoryEnvelope = self
            .call(&[("mode", "history"), ("nzo_ids", id)])
            .await?;
        if let Some(slot) = history.history.slots.into_iter().find(|s| s.nzo_id == id) {
            let done = slot.status == "Completed";
            let file_paths = if done {
                slot.storage.map(|s| vec![s]).unwrap_or_default()
            } else {
                Vec::new()
            };
            return Ok(Some(DownloadStatus {
                id: slot.nzo_id,
                name: slot.name,
                done,
                file_paths,
            }));
        }

        let queue: QueueEnvelope = self.call(&[("mode", "queue")]).await?;
        Ok(queue
            .queue
            .slots
            .into_iter()
            .find(|s| s.nzo_id == id)
            .map(|s| DownloadStatus {
                id: s.nzo_id,
                name: s.filename,
                done: false,
                file_paths: Vec::new(),
            }))
    }
}

#[derive(Debug, Deserialize)]
struct AddEnvelope {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    nzo_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryEnvelope {
    history: HistorySlots,
}

#[derive(Debug, Deserialize)]
struct HistorySlots {
    #[serde(default)]
    slots: Vec<HistorySlot>,
}

#[derive(Debug, Deserialize)]
struct HistorySlot {
    nzo_id: String,
    name: String,
    status: String,
    storage: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueEnvelope {
    queue: QueueSlots,
}

#[derive(Debug, Deserialize)]
struct QueueSlots {
    #[serde(default)]
    slots: Vec<QueueSlot>,
}

#[derive(Debug, Deserialize)]
struct QueueSlot {
    nzo_id: String,
    filename: String,
}

#[async_trait]
impl Downloader for SabnzbdClient {
    fn protocol(&self) -> Protocol {
        Protocol::Usenet
    }

    async fn add(&self, release: &Release) -> Result<DownloadStatus> {
        let added: AddEnvelope = self
            .call(&[("mode", "addurl"), ("name", release.download_url.as_str())])
            .await?;
        if !added.status {
            bail!("sabnzbd rejected the nzb url");
        }
        let id = added
            .nzo_ids
            .into_iter()
            .next()
            .context("sabnzbd returned no nzo id")?;

        Ok(DownloadStatus {
            id,
            name: release.title.clone(),
            done: false,
            file_paths: Vec::new(),
        })
    }

    async fn get(&self, id: &str) -> Result<DownloadStatus> {
        self.find_status(id)
            .await?
            .with_context(|| format!("download {id} not found at sabnzbd"))
    }

    async fn list(&self) -> Result<Vec<DownloadStatus>> {
        let history: HistoryEnvelope = self.call(&[("mode", "history")]).await?;
        let mut statuses: Vec<DownloadStatus> = history
            .history
            .slots
            .into_iter()
            .map(|slot| {
                let done = slot.status == "Completed";
                DownloadStatus {
                    id: slot.nzo_id,
                    name: slot.name,
                    done,
                    file_paths: if done {
                        slot.storage.map(|s| vec![s]).unwrap_or_default()
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect();

        let queue: QueueEnvelope = self.call(&[("mode", "queue")]).await?;
        statuses.extend(queue.queue.slots.into_iter().map(|s| DownloadStatus {
            id: s.nzo_id,
            name: s.filename,
            done: false,
            file_paths: Vec::new(),
        }));

        Ok(statuses)
    }
}
