//! Transmission RPC download client (torrent protocol).
//!
//! Transmission rotates a CSRF session id; any call may come back 409 with a
//! fresh id in `X-Transmission-Session-Id`, in which case the request is
//! retried once.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{DownloadStatus, Downloader};
use crate::models::release::{Protocol, Release};

const SESSION_HEADER: &str = "X-Transmission-Session-Id";

pub struct TransmissionClient {
    http: Client,
    rpc_url: String,
    session_id: Mutex<Option<String>>,
}

impl TransmissionClient {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            rpc_url: format!("{}/transmission/rpc", base_url.trim_end_matches('/')),
            session_id: Mutex::new(None),
        }
    }

    async fn rpc(&self, method: &str, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let body = json!({ "method": method, "arguments": arguments });

        for attempt in 0..2 {
            let mut request = self.http.post(&self.rpc_url).json(&body);
            if let Some(id) = self.session_id.lock().await.as_deref() {
                request = request.header(SESSION_HEADER, id);
            }

            let response = request.send().await.context("transmission unreachable")?;

            if response.status() == StatusCode::CONFLICT {
                let fresh = response
                    .headers()
                    .get(SESSION_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(ToString::to_string);
                *self.session_id.lock().await = fresh;
                if attempt == 0 {
                    continue;
                }
                bail!("transmission kept rejecting the session id");
            }

            let status = response.status();
            if !status.is_success() {
                bail!("transmission returned {status} for {method}");
            }

            let envelope: RpcEnvelope = response
                .json()
                .await
                .context("transmission response decode failed")?;
            if envelope.result != "success" {
                bail!("transmission {method} failed: {}", envelope.result);
            }
            return Ok(envelope.arguments);
        }
        unreachable!("rpc retry loop always returns")
    }

    fn status_from_torrent(torrent: &WireTorrent) -> DownloadStatus {
        let done = torrent.percent_done >= 1.0;
        let file_paths = if done {
            torrent
                .files
                .iter()
                .map(|f| format!("{}/{}", torrent.download_dir.trim_end_matches('/'), f.name))
                .collect()
        } else {
            Vec::new()
        };
        DownloadStatus {
            id: torrent.id.to_string(),
            name: torrent.name.clone(),
            done,
            file_paths,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTorrent {
    id: i64,
    name: String,
    percent_done: f64,
    #[serde(default)]
    download_dir: String,
    #[serde(default)]
    files: Vec<WireFile>,
}

#[derive(Debug, Deserialize)]
struct WireFile {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AddResult {
    torrent_added: Option<WireAdded>,
    torrent_duplicate: Option<WireAdded>,
}

#[derive(Debug, Deserialize)]
struct WireAdded {
    id: i64,
    name: String,
}

const TORRENT_FIELDS: [&str; 5] = ["id", "name", "percentDone", "downloadDir", "files"];

#[async_trait]
impl Downloader for TransmissionClient {
    fn protocol(&self) -> Protocol {
        Protocol::Torrent
    }

    async fn add(&self, release: &Release) -> Result<DownloadStatus> {
        let arguments = self
            .rpc("torrent-add", json!({ "filename": release.download_url }))
            .await?;
        let result: AddResult =
            serde_json::from_value(arguments).context("torrent-add decode failed")?;

        let added = result
            .torrent_added
            .or(result.torrent_duplicate)
            .context("torrent-add returned no torrent")?;

        Ok(DownloadStatus {
            id: added.id.to_string(),
            name: added.name,
            done: false,
            file_paths: Vec::new(),
        })
    }

    async fn get(&self, id: &str) -> Result<DownloadStatus> {
        let numeric: i64 = id.parse().context("transmission ids are numeric")?;
        let arguments = self
            .rpc(
                "torrent-get",
                json!({ "ids": [numeric], "fields": TORRENT_FIELDS }),
            )
            .await?;

        #[derive(Deserialize)]
        struct Torrents {
            #[serde(default)]
            torrents: Vec<WireTorrent>,
        }
        let torrents: Torrents =
            serde_json::from_value(arguments).context("torrent-get decode failed")?;

        let torrent = torrents
            .torrents
            .first()
            .with_context(|| format!("download {id} not found at transmission"))?;
        Ok(Self::status_from_torrent(torrent))
    }

    async fn list(&self) -> Result<Vec<DownloadStatus>> {
        let arguments = self
            .rpc("torrent-get", json!({ "fields": TORRENT_FIELDS }))
            .await?;

        #[derive(Deserialize)]
        struct Torrents {
            #[serde(default)]
            torrents: Vec<WireTorrent>,
        }
        let torrents: Torrents =
            serde_json::from_value(arguments).context("torrent-get decode failed")?;

        Ok(torrents.torrents.iter().map(Self::status_from_torrent).collect())
    }
}
