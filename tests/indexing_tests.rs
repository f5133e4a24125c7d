//! Library indexing: file registration, discovery of unregistered media,
//! and idempotence over repeated scans.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use vidarr::library::{FoundEpisodeFile, FoundMovieFile};
use vidarr::models::state::{EpisodeState, MovieState, SeasonState, SeriesState};
use vidarr::services::IndexingService;

fn episode_file(relative: &str, absolute: &str, season: i32, episode: i32) -> FoundEpisodeFile {
    FoundEpisodeFile {
        relative_path: relative.to_string(),
        absolute_path: PathBuf::from(absolute),
        series_name: "Fargo".to_string(),
        season_number: season,
        episode_number: episode,
        size_bytes: 1_000,
    }
}

#[tokio::test]
async fn indexing_creates_discovered_hierarchy() {
    let h = common::harness().await;
    let indexing = IndexingService::new(h.store.clone(), Arc::clone(&h.library) as _);

    h.library.put_episode_file(episode_file(
        "Fargo/Season 01/Fargo.S01E01.mkv",
        "/tv/Fargo/Season 01/Fargo.S01E01.mkv",
        1,
        1,
    ));
    h.library.put_episode_file(episode_file(
        "Fargo/Season 01/Fargo.S01E02.mkv",
        "/tv/Fargo/Season 01/Fargo.S01E02.mkv",
        1,
        2,
    ));

    indexing.index_series_library().await.unwrap();

    let files = h.store.list_episode_files().await.unwrap();
    assert_eq!(files.len(), 2);

    let series = h.store.get_series_by_path("Fargo").await.unwrap().unwrap();
    assert_eq!(series.state, SeriesState::Discovered.as_str());

    let season = h
        .store
        .get_season_by_number(series.id, 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(season.state, SeasonState::Discovered.as_str());

    let episodes = h.store.list_episodes(season.id).await.unwrap();
    assert_eq!(episodes.len(), 2);
    for episode in &episodes {
        assert_eq!(episode.state, EpisodeState::Discovered.as_str());
        assert!(episode.episode_file_id.is_some());
    }
}

#[tokio::test]
async fn indexing_twice_does_not_duplicate_rows() {
    let h = common::harness().await;
    let indexing = IndexingService::new(h.store.clone(), Arc::clone(&h.library) as _);

    h.library.put_episode_file(episode_file(
        "Fargo/Season 01/Fargo.S01E01.mkv",
        "/tv/Fargo/Season 01/Fargo.S01E01.mkv",
        1,
        1,
    ));

    indexing.index_series_library().await.unwrap();
    indexing.index_series_library().await.unwrap();

    assert_eq!(h.store.list_episode_files().await.unwrap().len(), 1);
    let series = h.store.get_series_by_path("Fargo").await.unwrap().unwrap();
    let season = h
        .store
        .get_season_by_number(series.id, 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.store.list_episodes(season.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn moved_file_updates_the_original_path() {
    let h = common::harness().await;
    let indexing = IndexingService::new(h.store.clone(), Arc::clone(&h.library) as _);

    h.library.put_episode_file(episode_file(
        "Fargo/Season 01/Fargo.S01E01.mkv",
        "/tv/Fargo/Season 01/Fargo.S01E01.mkv",
        1,
        1,
    ));
    indexing.index_series_library().await.unwrap();

    // Same library path, new absolute location.
    h.library.episode_files.lock().unwrap()[0].absolute_path =
        PathBuf::from("/mnt/tv/Fargo/Season 01/Fargo.S01E01.mkv");
    indexing.index_series_library().await.unwrap();

    let files = h.store.list_episode_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(
        files[0].original_file_path.as_deref(),
        Some("/mnt/tv/Fargo/Season 01/Fargo.S01E01.mkv")
    );
}

#[tokio::test]
async fn movie_indexing_discovers_unregistered_files() {
    let h = common::harness().await;
    let indexing = IndexingService::new(h.store.clone(), Arc::clone(&h.library) as _);

    h.library.put_movie_file(FoundMovieFile {
        relative_path: "Heat (1995)/Heat.1995.1080p.mkv".to_string(),
        absolute_path: PathBuf::from("/movies/Heat (1995)/Heat.1995.1080p.mkv"),
        title: "Heat".to_string(),
        year: Some(1995),
        size_bytes: 5_000,
    });

    indexing.index_movie_library().await.unwrap();
    indexing.index_movie_library().await.unwrap();

    let movies = h.store.list_movies().await.unwrap();
    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0].state, MovieState::Discovered.as_str());
    assert!(movies[0].movie_file_id.is_some());
    assert_eq!(movies[0].path.as_deref(), Some("Heat"));
}
