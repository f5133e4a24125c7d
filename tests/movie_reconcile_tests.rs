//! End-to-end movie reconciliation against the in-process store and mock
//! collaborators.

mod common;

use common::{harness, size_for_rate, torrent_release};
use tokio_util::sync::CancellationToken;
use vidarr::db::{MovieMetadataInput, NewMovie};
use vidarr::models::state::{EntityKind, MovieState, TransitionMetadata};

async fn seed_missing_movie(
    h: &common::Harness,
    tmdb_id: i32,
    title: &str,
    release_date: &str,
    runtime: i32,
) -> vidarr::entities::movie::Model {
    let metadata = h
        .store
        .upsert_movie_metadata(MovieMetadataInput {
            tmdb_id,
            title: title.to_string(),
            overview: None,
            release_date: Some(release_date.to_string()),
            runtime_minutes: Some(runtime),
        })
        .await
        .unwrap();

    h.store
        .create_movie(
            NewMovie {
                tmdb_id: Some(tmdb_id),
                path: None,
                movie_metadata_id: Some(metadata.id),
                quality_profile_id: 1,
                monitored: true,
            },
            MovieState::Missing,
        )
        .await
        .unwrap()
}

async fn assert_log_invariants(h: &common::Harness, kind: EntityKind, id: i32, state: &str) {
    let rows = h.store.entity_transitions(kind, id).await.unwrap();
    let current: Vec<_> = rows.iter().filter(|r| r.most_recent).collect();
    assert_eq!(current.len(), 1, "exactly one most_recent row");
    assert_eq!(current[0].to_state, state, "state column matches the log");
}

#[tokio::test]
async fn missing_movie_picks_highest_seeded_within_quality_window() {
    let h = harness().await;
    let movie = seed_missing_movie(&h, 1234, "Some Movie", "2020-01-01", 120).await;

    // A is tiny but valid, B is 200 MB/min (way past the 16.67 cap), C sits
    // inside the window with the most seeders.
    h.indexer.put_release(torrent_release("Movie.A.2020.480p", 1_048_576, Some(10)));
    h.indexer
        .put_release(torrent_release("Movie.B.2020.REMUX", size_for_rate(200.0, 120), Some(15)));
    h.indexer
        .put_release(torrent_release("Movie.C.2020.1080p", size_for_rate(16.0, 120), Some(23)));

    let token = CancellationToken::new();
    h.reconciler.reconcile_movies(&token).await.unwrap();

    let reloaded = h.store.get_movie(movie.id).await.unwrap().unwrap();
    assert_eq!(reloaded.state, MovieState::Downloading.as_str());

    let recent = h
        .store
        .most_recent_transition(EntityKind::Movie, movie.id)
        .await
        .unwrap()
        .unwrap();
    let metadata = TransitionMetadata::from_json(recent.metadata.as_deref().unwrap()).unwrap();
    assert!(metadata.download_id.as_deref().is_some_and(|id| !id.is_empty()));
    assert_eq!(metadata.download_client_id, Some(h.download_client_id));

    assert_eq!(h.downloader.added_count(), 1);
    assert_eq!(
        h.downloader.added.lock().unwrap()[0].title,
        "Movie.C.2020.1080p"
    );

    assert_log_invariants(&h, EntityKind::Movie, movie.id, "downloading").await;
}

#[tokio::test]
async fn unreleased_movie_stays_unreleased_without_searching() {
    let h = harness().await;
    h.metadata.put_movie(vidarr::clients::MovieDetails {
        tmdb_id: 77,
        title: "Future Movie".to_string(),
        overview: None,
        release_date: Some("2030-01-01".to_string()),
        runtime_minutes: Some(100),
    });

    let movie = h.catalog.add_movie(77, 1, true).await.unwrap();
    assert_eq!(movie.state, MovieState::Unreleased.as_str());

    let token = CancellationToken::new();
    h.reconciler.reconcile_movies(&token).await.unwrap();

    let reloaded = h.store.get_movie(movie.id).await.unwrap().unwrap();
    assert_eq!(reloaded.state, MovieState::Unreleased.as_str());
    assert_eq!(h.indexer.searches(), 0, "no indexer search for unreleased movies");
}

#[tokio::test]
async fn missing_movie_with_future_date_reverts_to_unreleased() {
    let h = harness().await;
    let movie = seed_missing_movie(&h, 55, "Early Bird", "2031-06-01", 90).await;

    let token = CancellationToken::new();
    h.reconciler.reconcile_movies(&token).await.unwrap();

    let reloaded = h.store.get_movie(movie.id).await.unwrap().unwrap();
    assert_eq!(reloaded.state, MovieState::Unreleased.as_str());
    assert_eq!(h.indexer.searches(), 0);
}

#[tokio::test]
async fn reconcile_twice_produces_no_extra_transitions() {
    let h = harness().await;
    let movie = seed_missing_movie(&h, 1234, "Some Movie", "2020-01-01", 120).await;
    h.indexer
        .put_release(torrent_release("Some.Movie.2020.1080p", size_for_rate(10.0, 120), Some(5)));

    let token = CancellationToken::new();
    h.reconciler.reconcile_movies(&token).await.unwrap();
    let after_first = h
        .store
        .entity_transitions(EntityKind::Movie, movie.id)
        .await
        .unwrap()
        .len();

    // Nothing changed externally: the download is still in flight, so a
    // second run must not move anything.
    h.reconciler.reconcile_movies(&token).await.unwrap();
    let after_second = h
        .store
        .entity_transitions(EntityKind::Movie, movie.id)
        .await
        .unwrap()
        .len();

    assert_eq!(after_first, after_second);
    assert_eq!(h.downloader.added_count(), 1);
}

#[tokio::test]
async fn finished_download_is_imported_and_completed() {
    let h = harness().await;
    let movie = seed_missing_movie(&h, 900, "Heat", "1995-12-15", 170).await;
    h.indexer
        .put_release(torrent_release("Heat.1995.1080p", size_for_rate(12.0, 170), Some(40)));

    let token = CancellationToken::new();
    h.reconciler.reconcile_movies(&token).await.unwrap();
    assert_eq!(
        h.store.get_movie(movie.id).await.unwrap().unwrap().state,
        MovieState::Downloading.as_str()
    );

    let download_id = {
        let recent = h
            .store
            .most_recent_transition(EntityKind::Movie, movie.id)
            .await
            .unwrap()
            .unwrap();
        TransitionMetadata::from_json(recent.metadata.as_deref().unwrap())
            .unwrap()
            .download_id
            .unwrap()
    };
    h.downloader
        .finish(&download_id, vec!["/downloads/Heat.1995.1080p.mkv".to_string()]);

    // One run imports and lands on Downloaded, the completed sweep in the
    // same pass promotes the linked movie to Completed.
    h.reconciler.reconcile_movies(&token).await.unwrap();

    let reloaded = h.store.get_movie(movie.id).await.unwrap().unwrap();
    assert_eq!(reloaded.state, MovieState::Completed.as_str());
    let file_id = reloaded.movie_file_id.expect("movie file linked");
    let file = h.store.get_movie_file(file_id).await.unwrap().unwrap();
    assert_eq!(file.relative_path, "Heat/Heat.1995.1080p.mkv");

    let history = h
        .store
        .entity_transitions(EntityKind::Movie, movie.id)
        .await
        .unwrap();
    let states: Vec<&str> = history.iter().map(|t| t.to_state.as_str()).collect();
    assert_eq!(
        states,
        vec!["missing", "downloading", "downloaded", "completed"]
    );

    assert_log_invariants(&h, EntityKind::Movie, movie.id, "completed").await;
}

#[tokio::test]
async fn same_state_write_is_a_no_op() {
    let h = harness().await;
    let movie = seed_missing_movie(&h, 42, "Idempotent", "2019-01-01", 100).await;

    h.store
        .update_movie_state(movie.id, MovieState::Missing, None)
        .await
        .unwrap();

    let rows = h
        .store
        .entity_transitions(EntityKind::Movie, movie.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1, "only the creation transition exists");
}
