//! Season/episode reconciliation: season packs, download completion fan-out,
//! discovered matching, and the episode -> season -> series cascade.

mod common;

use common::{harness, size_for_rate, torrent_release};
use tokio_util::sync::CancellationToken;
use vidarr::clients::{EpisodeDetails, SeasonDetails, SeriesDetails};
use vidarr::db::{EpisodeMetadataInput, NewMediaFile, NewSeries, SeriesMetadataInput};
use vidarr::models::state::{
    EntityKind, EpisodeState, SeasonState, SeriesState, TransitionMetadata,
};

struct SeededSeason {
    series: vidarr::entities::series::Model,
    season: vidarr::entities::season::Model,
    episodes: Vec<vidarr::entities::episode::Model>,
}

/// A monitored series with one season of missing, already-aired episodes,
/// fully linked to metadata.
async fn seed_missing_season(
    h: &common::Harness,
    tmdb_id: i32,
    title: &str,
    episode_count: i32,
) -> SeededSeason {
    let series_metadata = h
        .store
        .upsert_series_metadata(SeriesMetadataInput {
            tmdb_id,
            title: title.to_string(),
            overview: None,
            first_air_date: Some("2020-01-01".to_string()),
            external_ids: None,
            watch_providers: None,
        })
        .await
        .unwrap();

    let series = h
        .store
        .create_series(
            NewSeries {
                tmdb_id: Some(tmdb_id),
                path: None,
                series_metadata_id: Some(series_metadata.id),
                quality_profile_id: 1,
                monitored: true,
            },
            SeriesState::Missing,
        )
        .await
        .unwrap();

    let season_metadata = h
        .store
        .upsert_season_metadata(series_metadata.id, 1, None)
        .await
        .unwrap();
    let season = h
        .store
        .create_season(series.id, 1, SeasonState::Missing)
        .await
        .unwrap();
    h.store
        .link_season_metadata(season.id, season_metadata.id)
        .await
        .unwrap();

    let mut episodes = Vec::new();
    for number in 1..=episode_count {
        let episode_metadata = h
            .store
            .upsert_episode_metadata(
                season_metadata.id,
                EpisodeMetadataInput {
                    episode_number: number,
                    title: None,
                    air_date: Some("2020-02-01".to_string()),
                    runtime_minutes: Some(45),
                },
            )
            .await
            .unwrap();
        let episode = h
            .store
            .create_episode(season.id, number, None, EpisodeState::Missing)
            .await
            .unwrap();
        assert!(
            h.store
                .link_episode_metadata(episode.id, episode_metadata.id)
                .await
                .unwrap()
        );
        episodes.push(episode);
    }

    // Keep the mock provider consistent with what we seeded so the
    // continuing sweep's refresh is a no-op.
    h.metadata.put_series(SeriesDetails {
        tmdb_id,
        title: title.to_string(),
        overview: None,
        first_air_date: Some("2020-01-01".to_string()),
        seasons: vec![SeasonDetails {
            season_number: 1,
            title: None,
            episodes: (1..=episode_count)
                .map(|number| EpisodeDetails {
                    episode_number: number,
                    title: None,
                    air_date: Some("2020-02-01".to_string()),
                    runtime_minutes: Some(45),
                })
                .collect(),
        }],
    });

    SeededSeason {
        series,
        season,
        episodes,
    }
}

#[tokio::test]
async fn episode_write_cascades_to_season_and_series() {
    let h = harness().await;
    let seeded = seed_missing_season(&h, 600, "Cascade Show", 2).await;

    h.store
        .update_episode_state(seeded.episodes[0].id, EpisodeState::Downloading, None)
        .await
        .unwrap();

    let season = h.store.get_season(seeded.season.id).await.unwrap().unwrap();
    assert_eq!(season.state, SeasonState::Downloading.as_str());
    let series = h.store.get_series(seeded.series.id).await.unwrap().unwrap();
    assert_eq!(series.state, SeriesState::Downloading.as_str());
}

#[tokio::test]
async fn season_pack_preferred_over_single_episodes() {
    let h = harness().await;
    let seeded = seed_missing_season(&h, 500, "Show", 2).await;

    // Pack runtime is 2 x 45 = 90 minutes; 8 MB/min sits in the TV window.
    h.indexer.put_release(torrent_release(
        "Show.S01.1080p.Complete",
        size_for_rate(8.0, 90),
        Some(9),
    ));
    h.indexer.put_release(torrent_release(
        "Show.S01E01.1080p",
        size_for_rate(8.0, 45),
        Some(50),
    ));
    h.indexer.put_release(torrent_release(
        "Show.S01E02.1080p",
        size_for_rate(8.0, 45),
        Some(50),
    ));

    let token = CancellationToken::new();
    h.reconciler.reconcile_series(&token).await.unwrap();

    // Exactly one submission: the pack.
    assert_eq!(h.downloader.added_count(), 1);
    assert_eq!(
        h.downloader.added.lock().unwrap()[0].title,
        "Show.S01.1080p.Complete"
    );

    let mut shared_download_id = None;
    for episode in &seeded.episodes {
        let reloaded = h.store.get_episode(episode.id).await.unwrap().unwrap();
        assert_eq!(reloaded.state, EpisodeState::Downloading.as_str());
        assert!(reloaded.is_entire_season_download);

        let recent = h
            .store
            .most_recent_transition(EntityKind::Episode, episode.id)
            .await
            .unwrap()
            .unwrap();
        let metadata = TransitionMetadata::from_json(recent.metadata.as_deref().unwrap()).unwrap();
        assert!(metadata.is_entire_season_download);
        let download_id = metadata.download_id.unwrap();
        match &shared_download_id {
            None => shared_download_id = Some(download_id),
            Some(shared) => assert_eq!(shared, &download_id),
        }
    }

    let season = h.store.get_season(seeded.season.id).await.unwrap().unwrap();
    assert_eq!(season.state, SeasonState::Downloading.as_str());
    let season_recent = h
        .store
        .most_recent_transition(EntityKind::Season, season.id)
        .await
        .unwrap()
        .unwrap();
    let season_metadata =
        TransitionMetadata::from_json(season_recent.metadata.as_deref().unwrap()).unwrap();
    assert_eq!(season_metadata.download_id, shared_download_id);
    assert!(season_metadata.is_entire_season_download);
}

#[tokio::test]
async fn finished_season_pack_fans_out_to_every_episode() {
    let h = harness().await;
    let seeded = seed_missing_season(&h, 500, "Show", 2).await;
    h.indexer.put_release(torrent_release(
        "Show.S01.1080p.Complete",
        size_for_rate(8.0, 90),
        Some(9),
    ));

    let token = CancellationToken::new();
    h.reconciler.reconcile_series(&token).await.unwrap();

    let recent = h
        .store
        .most_recent_transition(EntityKind::Episode, seeded.episodes[0].id)
        .await
        .unwrap()
        .unwrap();
    let download_id = TransitionMetadata::from_json(recent.metadata.as_deref().unwrap())
        .unwrap()
        .download_id
        .unwrap();

    h.downloader.finish(
        &download_id,
        vec![
            "/downloads/Show.S01E01.1080p.mkv".to_string(),
            "/downloads/Show.S01E02.1080p.mkv".to_string(),
        ],
    );

    h.reconciler.reconcile_series(&token).await.unwrap();

    for episode in &seeded.episodes {
        let reloaded = h.store.get_episode(episode.id).await.unwrap().unwrap();
        let file_id = reloaded.episode_file_id.expect("episode file linked");
        let file = h.store.get_episode_file(file_id).await.unwrap().unwrap();
        assert!(file.relative_path.starts_with("Show/S01/"));
        assert_eq!(file.size_bytes, 1024);

        let history = h
            .store
            .entity_transitions(EntityKind::Episode, episode.id)
            .await
            .unwrap();
        assert!(
            history
                .iter()
                .any(|t| t.to_state == EpisodeState::Downloaded.as_str()),
            "episode passed through downloaded"
        );
        assert_eq!(reloaded.state, EpisodeState::Completed.as_str());
    }

    let season = h.store.get_season(seeded.season.id).await.unwrap().unwrap();
    assert_eq!(season.state, SeasonState::Completed.as_str());
    let series = h.store.get_series(seeded.series.id).await.unwrap().unwrap();
    assert_eq!(series.state, SeriesState::Completed.as_str());
}

#[tokio::test]
async fn partially_missing_season_downloads_individual_episodes() {
    let h = harness().await;
    let seeded = seed_missing_season(&h, 510, "Half Show", 2).await;

    // One of the two episodes already has its file: no pack attempt.
    let file = h
        .store
        .create_episode_file(NewMediaFile {
            relative_path: "Half Show/S01/Half.Show.S01E01.mkv".to_string(),
            original_file_path: None,
            size_bytes: 2048,
        })
        .await
        .unwrap();
    h.store
        .set_episode_file(seeded.episodes[0].id, file.id)
        .await
        .unwrap();
    h.store
        .update_episode_state(seeded.episodes[0].id, EpisodeState::Downloaded, None)
        .await
        .unwrap();

    h.indexer.put_release(torrent_release(
        "Half.Show.S01.1080p.Complete",
        size_for_rate(8.0, 90),
        Some(90),
    ));
    h.indexer.put_release(torrent_release(
        "Half.Show.S01E02.1080p",
        size_for_rate(8.0, 45),
        Some(12),
    ));

    let token = CancellationToken::new();
    h.reconciler.reconcile_series(&token).await.unwrap();

    assert_eq!(h.downloader.added_count(), 1);
    assert_eq!(
        h.downloader.added.lock().unwrap()[0].title,
        "Half.Show.S01E02.1080p"
    );

    let reloaded = h
        .store
        .get_episode(seeded.episodes[1].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.state, EpisodeState::Downloading.as_str());
    assert!(!reloaded.is_entire_season_download);
}

#[tokio::test]
async fn unaired_missing_episodes_are_not_searched() {
    let h = harness().await;
    let seeded = seed_missing_season(&h, 520, "Waiting Show", 2).await;

    // Push both air dates into the future.
    let season_metadata_id = h
        .store
        .get_season(seeded.season.id)
        .await
        .unwrap()
        .unwrap()
        .season_metadata_id
        .unwrap();
    for number in 1..=2 {
        h.store
            .upsert_episode_metadata(
                season_metadata_id,
                EpisodeMetadataInput {
                    episode_number: number,
                    title: None,
                    air_date: Some("2031-01-01".to_string()),
                    runtime_minutes: Some(45),
                },
            )
            .await
            .unwrap();
    }
    // Keep the provider view in line so the continuing refresh does not
    // move the dates back.
    h.metadata.put_series(SeriesDetails {
        tmdb_id: 520,
        title: "Waiting Show".to_string(),
        overview: None,
        first_air_date: Some("2020-01-01".to_string()),
        seasons: vec![SeasonDetails {
            season_number: 1,
            title: None,
            episodes: (1..=2)
                .map(|number| EpisodeDetails {
                    episode_number: number,
                    title: None,
                    air_date: Some("2031-01-01".to_string()),
                    runtime_minutes: Some(45),
                })
                .collect(),
        }],
    });

    let token = CancellationToken::new();
    h.reconciler.reconcile_series(&token).await.unwrap();

    // Every episode moved to Unreleased, the aggregate follows, and no
    // search or submission happened.
    for episode in &seeded.episodes {
        let reloaded = h.store.get_episode(episode.id).await.unwrap().unwrap();
        assert_eq!(reloaded.state, EpisodeState::Unreleased.as_str());
    }
    let season = h.store.get_season(seeded.season.id).await.unwrap().unwrap();
    assert_eq!(season.state, SeasonState::Unreleased.as_str());
    assert_eq!(h.downloader.added_count(), 0);
}

#[tokio::test]
async fn settled_work_beside_unaired_episodes_means_continuing() {
    let h = harness().await;
    let seeded = seed_missing_season(&h, 525, "Mixed Show", 2).await;

    // Episode one is already on disk; episode two has not aired.
    let file = h
        .store
        .create_episode_file(NewMediaFile {
            relative_path: "Mixed Show/S01/Mixed.Show.S01E01.mkv".to_string(),
            original_file_path: None,
            size_bytes: 2048,
        })
        .await
        .unwrap();
    h.store
        .set_episode_file(seeded.episodes[0].id, file.id)
        .await
        .unwrap();
    h.store
        .update_episode_state(seeded.episodes[0].id, EpisodeState::Downloaded, None)
        .await
        .unwrap();

    let season_metadata_id = h
        .store
        .get_season(seeded.season.id)
        .await
        .unwrap()
        .unwrap()
        .season_metadata_id
        .unwrap();
    h.store
        .upsert_episode_metadata(
            season_metadata_id,
            EpisodeMetadataInput {
                episode_number: 2,
                title: None,
                air_date: Some("2031-01-01".to_string()),
                runtime_minutes: Some(45),
            },
        )
        .await
        .unwrap();
    h.metadata.put_series(SeriesDetails {
        tmdb_id: 525,
        title: "Mixed Show".to_string(),
        overview: None,
        first_air_date: Some("2020-01-01".to_string()),
        seasons: vec![SeasonDetails {
            season_number: 1,
            title: None,
            episodes: vec![
                EpisodeDetails {
                    episode_number: 1,
                    title: None,
                    air_date: Some("2020-02-01".to_string()),
                    runtime_minutes: Some(45),
                },
                EpisodeDetails {
                    episode_number: 2,
                    title: None,
                    air_date: Some("2031-01-01".to_string()),
                    runtime_minutes: Some(45),
                },
            ],
        }],
    });

    let token = CancellationToken::new();
    h.reconciler.reconcile_series(&token).await.unwrap();

    let season = h.store.get_season(seeded.season.id).await.unwrap().unwrap();
    assert_eq!(season.state, SeasonState::Continuing.as_str());
    assert_eq!(h.downloader.added_count(), 0);
}

#[tokio::test]
async fn discovered_episode_gets_matched_and_completed() {
    let h = harness().await;

    let series = h
        .store
        .create_series(
            NewSeries {
                tmdb_id: None,
                path: Some("Fargo".to_string()),
                series_metadata_id: None,
                quality_profile_id: 1,
                monitored: true,
            },
            SeriesState::Discovered,
        )
        .await
        .unwrap();
    let season = h
        .store
        .create_season(series.id, 1, SeasonState::Discovered)
        .await
        .unwrap();
    let file = h
        .store
        .create_episode_file(NewMediaFile {
            relative_path: "Fargo/Season 01/Fargo.S01E03.mkv".to_string(),
            original_file_path: None,
            size_bytes: 4096,
        })
        .await
        .unwrap();
    let episode = h
        .store
        .create_episode(season.id, 3, Some(file.id), EpisodeState::Discovered)
        .await
        .unwrap();

    *h.metadata.tv_search.lock().unwrap() = vec![vidarr::clients::SearchMediaResult {
        tmdb_id: 4000,
        title: "Fargo".to_string(),
        date: Some("2014-04-15".to_string()),
    }];
    h.metadata.put_series(SeriesDetails {
        tmdb_id: 4000,
        title: "Fargo".to_string(),
        overview: None,
        first_air_date: Some("2014-04-15".to_string()),
        seasons: vec![SeasonDetails {
            season_number: 1,
            title: None,
            episodes: (1..=10)
                .map(|number| EpisodeDetails {
                    episode_number: number,
                    title: None,
                    air_date: Some("2014-04-15".to_string()),
                    runtime_minutes: Some(50),
                })
                .collect(),
        }],
    });

    let token = CancellationToken::new();
    h.reconciler.reconcile_series(&token).await.unwrap();

    let series = h.store.get_series(series.id).await.unwrap().unwrap();
    assert!(series.series_metadata_id.is_some(), "series linked to metadata");

    let season = h.store.get_season(season.id).await.unwrap().unwrap();
    let season_metadata_id = season.season_metadata_id.expect("season linked");

    let episode = h.store.get_episode(episode.id).await.unwrap().unwrap();
    let expected_metadata = h
        .store
        .get_episode_metadata_by_number(season_metadata_id, 3)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(episode.episode_metadata_id, Some(expected_metadata.id));
    assert_eq!(episode.state, EpisodeState::Completed.as_str());

    // The refresh created the rest of the season as missing episodes.
    let all = h.store.list_episodes(season.id).await.unwrap();
    assert_eq!(all.len(), 10);
}

#[tokio::test]
async fn episode_metadata_link_is_unique() {
    let h = harness().await;
    let seeded = seed_missing_season(&h, 530, "Unique Show", 1).await;

    let taken = h
        .store
        .get_episode(seeded.episodes[0].id)
        .await
        .unwrap()
        .unwrap()
        .episode_metadata_id
        .unwrap();

    let other = h
        .store
        .create_episode(seeded.season.id, 99, None, EpisodeState::Discovered)
        .await
        .unwrap();
    assert!(
        !h.store.link_episode_metadata(other.id, taken).await.unwrap(),
        "second link to the same metadata must be refused"
    );
    let reloaded = h.store.get_episode(other.id).await.unwrap().unwrap();
    assert_eq!(reloaded.episode_metadata_id, None);
}
