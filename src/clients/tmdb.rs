//! TMDB v3 metadata provider client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{
    EpisodeDetails, MetadataProvider, MovieDetails, SearchMediaResult, SeasonDetails,
    SeriesDetails, none_if_empty,
};

const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

pub struct TmdbClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    #[must_use]
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let mut query: Vec<(&str, &str)> = vec![("api_key", self.api_key.as_str())];
        query.extend_from_slice(extra);

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("TMDB request failed: {path}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("TMDB returned {status} for {path}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("TMDB response decode failed: {path}"))
    }
}

#[derive(Debug, Deserialize)]
struct WireMovie {
    id: i32,
    title: String,
    overview: Option<String>,
    release_date: Option<String>,
    runtime: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct WireSeries {
    id: i32,
    name: String,
    overview: Option<String>,
    first_air_date: Option<String>,
    #[serde(default)]
    seasons: Vec<WireSeasonStub>,
}

#[derive(Debug, Deserialize)]
struct WireSeasonStub {
    season_number: i32,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireSeason {
    #[serde(default)]
    episodes: Vec<WireEpisode>,
}

#[derive(Debug, Deserialize)]
struct WireEpisode {
    episode_number: i32,
    name: Option<String>,
    air_date: Option<String>,
    runtime: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct WireSearchPage {
    #[serde(default)]
    results: Vec<WireSearchResult>,
}

/// The provider emits different field names for movie and TV results;
/// normalization into [`SearchMediaResult`] happens right here.
#[derive(Debug, Deserialize)]
struct WireSearchResult {
    id: i32,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
}

impl WireSearchResult {
    fn normalize(self) -> SearchMediaResult {
        SearchMediaResult {
            tmdb_id: self.id,
            title: self.title.or(self.name).unwrap_or_default(),
            date: none_if_empty(self.release_date.or(self.first_air_date)),
        }
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    async fn get_movie_details(&self, tmdb_id: i32) -> Result<MovieDetails> {
        let wire: WireMovie = self.get_json(&format!("/movie/{tmdb_id}"), &[]).await?;
        Ok(MovieDetails {
            tmdb_id: wire.id,
            title: wire.title,
            overview: none_if_empty(wire.overview),
            release_date: none_if_empty(wire.release_date),
            runtime_minutes: wire.runtime.filter(|&r| r > 0),
        })
    }

    async fn get_series_details(&self, tmdb_id: i32) -> Result<SeriesDetails> {
        let wire: WireSeries = self.get_json(&format!("/tv/{tmdb_id}"), &[]).await?;

        let mut seasons = Vec::with_capacity(wire.seasons.len());
        for stub in wire.seasons {
            let detail: WireSeason = self
                .get_json(&format!("/tv/{tmdb_id}/season/{}", stub.season_number), &[])
                .await?;
            seasons.push(SeasonDetails {
                season_number: stub.season_number,
                title: none_if_empty(stub.name),
                episodes: detail
                    .episodes
                    .into_iter()
                    .map(|e| EpisodeDetails {
                        episode_number: e.episode_number,
                        title: none_if_empty(e.name),
                        air_date: none_if_empty(e.air_date),
                        runtime_minutes: e.runtime.filter(|&r| r > 0),
                    })
                    .collect(),
            });
        }

        Ok(SeriesDetails {
            tmdb_id: wire.id,
            title: wire.name,
            overview: none_if_empty(wire.overview),
            first_air_date: none_if_empty(wire.first_air_date),
            seasons,
        })
    }

    async fn search_movie(&self, query: &str) -> Result<Vec<SearchMediaResult>> {
        let page: WireSearchPage = self
            .get_json("/search/movie", &[("query", query)])
            .await?;
        Ok(page.results.into_iter().map(WireSearchResult::normalize).collect())
    }

    async fn search_tv(&self, query: &str) -> Result<Vec<SearchMediaResult>> {
        let page: WireSearchPage = self.get_json("/search/tv", &[("query", query)]).await?;
        Ok(page.results.into_iter().map(WireSearchResult::normalize).collect())
    }

    async fn series_external_ids(&self, tmdb_id: i32) -> Result<serde_json::Value> {
        debug!(tmdb_id, "fetching series external ids");
        self.get_json(&format!("/tv/{tmdb_id}/external_ids"), &[]).await
    }

    async fn series_watch_providers(&self, tmdb_id: i32) -> Result<serde_json::Value> {
        debug!(tmdb_id, "fetching series watch providers");
        self.get_json(&format!("/tv/{tmdb_id}/watch/providers"), &[]).await
    }
}
