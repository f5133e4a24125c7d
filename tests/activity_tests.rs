//! Activity views over the transition log.

mod common;

use chrono::Utc;
use vidarr::db::{MovieMetadataInput, NewMovie};
use vidarr::models::state::{EntityKind, JobState, JobType, MovieState, TransitionMetadata};
use vidarr::services::ActivityService;

async fn seed_downloading_movie(h: &common::Harness) -> vidarr::entities::movie::Model {
    let metadata = h
        .store
        .upsert_movie_metadata(MovieMetadataInput {
            tmdb_id: 10,
            title: "Busy Movie".to_string(),
            overview: None,
            release_date: Some("2020-01-01".to_string()),
            runtime_minutes: Some(100),
        })
        .await
        .unwrap();
    let movie = h
        .store
        .create_movie(
            NewMovie {
                tmdb_id: Some(10),
                path: None,
                movie_metadata_id: Some(metadata.id),
                quality_profile_id: 1,
                monitored: true,
            },
            MovieState::Missing,
        )
        .await
        .unwrap();
    h.store
        .update_movie_state(
            movie.id,
            MovieState::Downloading,
            Some(TransitionMetadata::for_download("dl-9", h.download_client_id)),
        )
        .await
        .unwrap();
    movie
}

#[tokio::test]
async fn active_activity_lists_downloads_and_running_jobs() {
    let h = common::harness().await;
    let activity = ActivityService::new(h.store.clone());

    let movie = seed_downloading_movie(&h).await;

    let job = h.store.create_pending_job(JobType::MovieReconcile).await.unwrap();
    assert!(h.store.try_mark_job_running(job.id).await.unwrap());

    let items = activity.get_active_activity(Utc::now()).await.unwrap();
    assert!(
        items
            .iter()
            .any(|i| i.entity_type == "movie" && i.entity_id == movie.id)
    );
    assert!(
        items
            .iter()
            .any(|i| i.entity_type == "job" && i.entity_id == job.id)
    );
}

#[tokio::test]
async fn entity_history_carries_gap_durations() {
    let h = common::harness().await;
    let activity = ActivityService::new(h.store.clone());

    let movie = seed_downloading_movie(&h).await;
    let history = activity
        .get_entity_history(EntityKind::Movie, movie.id, Utc::now())
        .await
        .unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].to_state, "missing");
    assert_eq!(history[1].to_state, "downloading");
    assert!(!history[1].duration.is_empty());
}

#[tokio::test]
async fn timeline_groups_transitions_by_day() {
    let h = common::harness().await;
    let activity = ActivityService::new(h.store.clone());

    seed_downloading_movie(&h).await;

    let days = activity
        .get_activity_timeline(Utc::now(), 1, 0, 100)
        .await
        .unwrap();
    assert_eq!(days.len(), 1, "all transitions happened today");
    let today = &days[0];
    assert!(
        today
            .buckets
            .iter()
            .any(|b| b.entity_type == "movie" && b.to_state == "downloading" && b.count == 1)
    );
}

#[tokio::test]
async fn recent_failures_surface_job_errors() {
    let h = common::harness().await;
    let activity = ActivityService::new(h.store.clone());

    let job = h.store.create_pending_job(JobType::IndexerSync).await.unwrap();
    h.store
        .update_job_state(job.id, JobState::Error, Some("no indexers available".to_string()))
        .await
        .unwrap();

    let failures = activity.get_recent_failures(Utc::now(), 24).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].title, JobType::IndexerSync.as_str());
    assert_eq!(failures[0].message, "no indexers available");
}
