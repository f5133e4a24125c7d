//! The thin HTTP surface: user-initiated queries and mutations over the
//! engine. All actual behavior lives in the services.

mod error;

pub use error::ApiError;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::{NewDownloadClient, NewIndexerSource};
use crate::models::release::Protocol;
use crate::models::state::{EntityKind, JobType};
use crate::state::SharedState;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,
    pub prometheus: Option<PrometheusHandle>,
}

pub fn router(shared: Arc<SharedState>, prometheus: Option<PrometheusHandle>) -> Router {
    let state = AppState { shared, prometheus };

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/movies", get(list_movies).post(add_movie))
        .route("/api/movies/{id}", get(get_movie))
        .route("/api/series", get(list_series).post(add_series))
        .route("/api/series/{id}", get(get_series))
        .route("/api/activity", get(active_activity))
        .route("/api/activity/timeline", get(activity_timeline))
        .route("/api/history/{kind}/{id}", get(entity_history))
        .route("/api/failures", get(recent_failures))
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/{id}/cancel", post(cancel_job))
        .route("/api/jobs/trigger/{job_type}", post(trigger_job))
        .route(
            "/api/indexer-sources",
            get(list_indexer_sources).post(create_indexer_source),
        )
        .route("/api/indexer-sources/{id}", delete(delete_indexer_source))
        .route(
            "/api/indexer-sources/{id}/refresh",
            post(refresh_indexer_source),
        )
        .route(
            "/api/download-clients",
            get(list_download_clients).post(create_download_client),
        )
        .route("/api/download-clients/{id}", delete(delete_download_client))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, ApiError> {
    state
        .prometheus
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or_else(|| ApiError::NotFound("metrics are disabled".to_string()))
}

// ----------------------------------------------------------------------
// Movies & series
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AddMediaRequest {
    tmdb_id: i32,
    #[serde(default = "default_profile_id")]
    quality_profile_id: i32,
    #[serde(default = "default_monitored")]
    monitored: bool,
}

const fn default_profile_id() -> i32 {
    1
}

const fn default_monitored() -> bool {
    true
}

async fn list_movies(
    State(state): State<AppState>,
) -> Result<Json<Vec<crate::entities::movie::Model>>, ApiError> {
    Ok(Json(state.shared.store.list_movies().await?))
}

async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<crate::entities::movie::Model>, ApiError> {
    state
        .shared
        .store
        .get_movie(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("movie", id))
}

async fn add_movie(
    State(state): State<AppState>,
    Json(request): Json<AddMediaRequest>,
) -> Result<Json<crate::entities::movie::Model>, ApiError> {
    if request.tmdb_id <= 0 {
        return Err(ApiError::Validation("tmdb_id must be positive".to_string()));
    }
    let movie = state
        .shared
        .catalog
        .add_movie(request.tmdb_id, request.quality_profile_id, request.monitored)
        .await?;
    Ok(Json(movie))
}

async fn list_series(
    State(state): State<AppState>,
) -> Result<Json<Vec<crate::entities::series::Model>>, ApiError> {
    Ok(Json(state.shared.store.list_series().await?))
}

async fn get_series(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<crate::entities::series::Model>, ApiError> {
    state
        .shared
        .store
        .get_series(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("series", id))
}

async fn add_series(
    State(state): State<AppState>,
    Json(request): Json<AddMediaRequest>,
) -> Result<Json<crate::entities::series::Model>, ApiError> {
    if request.tmdb_id <= 0 {
        return Err(ApiError::Validation("tmdb_id must be positive".to_string()));
    }
    let series = state
        .shared
        .catalog
        .add_series(request.tmdb_id, request.quality_profile_id, request.monitored)
        .await?;
    Ok(Json(series))
}

// ----------------------------------------------------------------------
// Activity
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TimelineQuery {
    #[serde(default = "default_days")]
    days: i64,
    #[serde(default)]
    offset: u64,
    #[serde(default = "default_limit")]
    limit: u64,
}

const fn default_days() -> i64 {
    7
}

const fn default_limit() -> u64 {
    1000
}

async fn active_activity(
    State(state): State<AppState>,
) -> Result<Json<Vec<crate::services::activity::ActivityItem>>, ApiError> {
    Ok(Json(state.shared.activity.get_active_activity(Utc::now()).await?))
}

async fn activity_timeline(
    State(state): State<AppState>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<Vec<crate::services::activity::TimelineDay>>, ApiError> {
    Ok(Json(
        state
            .shared
            .activity
            .get_activity_timeline(Utc::now(), query.days, query.offset, query.limit)
            .await?,
    ))
}

async fn entity_history(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i32)>,
) -> Result<Json<Vec<crate::services::activity::HistoryEntry>>, ApiError> {
    let kind: EntityKind = kind
        .parse()
        .map_err(|_| ApiError::Validation(format!("unknown entity type: {kind}")))?;
    Ok(Json(
        state
            .shared
            .activity
            .get_entity_history(kind, id, Utc::now())
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct FailuresQuery {
    #[serde(default = "default_hours")]
    hours: i64,
}

const fn default_hours() -> i64 {
    24
}

async fn recent_failures(
    State(state): State<AppState>,
    Query(query): Query<FailuresQuery>,
) -> Result<Json<Vec<crate::services::activity::Failure>>, ApiError> {
    Ok(Json(
        state
            .shared
            .activity
            .get_recent_failures(Utc::now(), query.hours)
            .await?,
    ))
}

// ----------------------------------------------------------------------
// Jobs
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    offset: u64,
    #[serde(default = "default_page")]
    limit: u64,
}

const fn default_page() -> u64 {
    50
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<crate::entities::job::Model>>, ApiError> {
    Ok(Json(state.shared.store.list_jobs(query.offset, query.limit).await?))
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.shared.scheduler.cancel_job(id).await?;
    Ok(Json(serde_json::json!({ "cancelled": id })))
}

async fn trigger_job(
    State(state): State<AppState>,
    Path(job_type): Path<String>,
) -> Result<Json<crate::entities::job::Model>, ApiError> {
    let job_type: JobType = job_type
        .parse()
        .map_err(|_| ApiError::Validation(format!("unknown job type: {job_type}")))?;
    state
        .shared
        .store
        .create_pending_job(job_type)
        .await
        .map(Json)
        .map_err(|e| ApiError::Conflict(e.to_string()))
}

// ----------------------------------------------------------------------
// Indexer sources & download clients
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateIndexerSourceRequest {
    name: String,
    scheme: String,
    host: String,
    port: i32,
    api_key: Option<String>,
    #[serde(default = "default_monitored")]
    enabled: bool,
}

async fn list_indexer_sources(
    State(state): State<AppState>,
) -> Result<Json<Vec<crate::entities::indexer_source::Model>>, ApiError> {
    Ok(Json(state.shared.store.list_indexer_sources().await?))
}

async fn create_indexer_source(
    State(state): State<AppState>,
    Json(request): Json<CreateIndexerSourceRequest>,
) -> Result<Json<crate::entities::indexer_source::Model>, ApiError> {
    let created = state
        .shared
        .store
        .create_indexer_source(NewIndexerSource {
            name: request.name,
            scheme: request.scheme,
            host: request.host,
            port: request.port,
            api_key: request.api_key,
            enabled: request.enabled,
        })
        .await?;
    Ok(Json(created))
}

async fn delete_indexer_source(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.shared.indexer_cache.delete_source(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

async fn refresh_indexer_source(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.shared.indexer_cache.refresh_source(id).await?;
    Ok(Json(serde_json::json!({ "refreshed": id })))
}

#[derive(Debug, Deserialize)]
struct CreateDownloadClientRequest {
    name: String,
    implementation: String,
    protocol: Protocol,
    scheme: String,
    host: String,
    port: i32,
    api_key: Option<String>,
    #[serde(default = "default_monitored")]
    enabled: bool,
}

async fn list_download_clients(
    State(state): State<AppState>,
) -> Result<Json<Vec<crate::entities::download_client::Model>>, ApiError> {
    Ok(Json(state.shared.store.list_download_clients().await?))
}

async fn create_download_client(
    State(state): State<AppState>,
    Json(request): Json<CreateDownloadClientRequest>,
) -> Result<Json<crate::entities::download_client::Model>, ApiError> {
    let created = state
        .shared
        .store
        .create_download_client(NewDownloadClient {
            name: request.name,
            implementation: request.implementation,
            protocol: request.protocol,
            scheme: request.scheme,
            host: request.host,
            port: request.port,
            api_key: request.api_key,
            enabled: request.enabled,
        })
        .await?;
    Ok(Json(created))
}

async fn delete_download_client(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.shared.store.delete_download_client(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}
