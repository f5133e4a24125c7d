//! Release filtering, ranking, and the fan-out search across indexers.
//!
//! The filter functions are pure: profile windows, title-parse predicates,
//! and the snapshot's allowed-protocol set in, surviving releases out.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clients::ReleaseSearchRequest;
use crate::models::release::{Protocol, Release};
use crate::models::snapshot::Snapshot;
use crate::parser::filename::{parse_episode, parse_season_pack};
use crate::quality::{MediaType, QualityProfile};
use crate::services::indexer_cache::IndexerCacheService;

pub fn filter_movie_releases(
    profile: &QualityProfile,
    runtime_minutes: i32,
    allowed: &HashSet<Protocol>,
    releases: Vec<Release>,
) -> Vec<Release> {
    releases
        .into_iter()
        .filter(|r| allowed.contains(&r.protocol))
        .filter(|r| profile.accepts(r.size_bytes, runtime_minutes, MediaType::Movie))
        .collect()
}

/// Per-episode filter: quality plus the title parsing to the expected
/// (season, episode) pair.
pub fn filter_episode_releases(
    profile: &QualityProfile,
    runtime_minutes: i32,
    season_number: i32,
    episode_number: i32,
    allowed: &HashSet<Protocol>,
    releases: Vec<Release>,
) -> Vec<Release> {
    releases
        .into_iter()
        .filter(|r| allowed.contains(&r.protocol))
        .filter(|r| {
            parse_episode(&r.title)
                .is_some_and(|p| p.season == season_number && p.episode == episode_number)
        })
        .filter(|r| profile.accepts(r.size_bytes, runtime_minutes, MediaType::Tv))
        .collect()
}

/// Season-pack filter: the title must carry the expected season marker with
/// no episode part, and the pack must fit the profile at the summed runtime.
pub fn filter_season_pack_releases(
    profile: &QualityProfile,
    runtime_minutes: i32,
    season_number: i32,
    allowed: &HashSet<Protocol>,
    releases: Vec<Release>,
) -> Vec<Release> {
    releases
        .into_iter()
        .filter(|r| allowed.contains(&r.protocol))
        .filter(|r| parse_season_pack(&r.title).is_some_and(|p| p.season == season_number))
        .filter(|r| profile.accepts(r.size_bytes, runtime_minutes, MediaType::Tv))
        .collect()
}

/// Pick the survivor with the most seeders; unknown counts rank below any
/// known count, and the earliest-seen release wins a tie.
#[must_use]
pub fn choose_release(survivors: Vec<Release>) -> Option<Release> {
    let mut best: Option<Release> = None;
    for candidate in survivors {
        let better = match &best {
            None => true,
            Some(current) => {
                seeder_rank(candidate.seeders) > seeder_rank(current.seeders)
            }
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

fn seeder_rank(seeders: Option<i32>) -> i64 {
    seeders.map_or(i64::MIN, i64::from)
}

/// Estimated runtime for a whole-season download: known runtimes summed,
/// plus the integer-average of the known values for each unknown one. With
/// no known runtimes at all this is zero, which downstream size checks
/// reject outright.
#[must_use]
pub fn season_pack_runtime(episode_runtimes: &[Option<i32>]) -> i32 {
    let known: Vec<i32> = episode_runtimes.iter().filter_map(|r| *r).collect();
    let known_total: i32 = known.iter().sum();
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let unknown_count = episode_runtimes.len() as i32 - known.len() as i32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let average = if known.is_empty() {
        0
    } else {
        known_total / known.len() as i32
    };
    known_total + average * unknown_count
}

/// Query every snapshot indexer concurrently and pool the results. A failing
/// indexer is logged and contributes nothing; the others still count.
pub async fn search_indexers(
    cache: &Arc<IndexerCacheService>,
    snapshot: &Snapshot,
    categories: &[i32],
    query: &str,
) -> Vec<Release> {
    let searches = snapshot.indexers.iter().map(|indexer| {
        let cache = Arc::clone(cache);
        let categories = categories.to_vec();
        let query = query.to_string();
        async move {
            let Some(client) = cache.client_for_source(indexer.indexer_source_id).await else {
                debug!(indexer = %indexer.name, "no cached source for indexer, skipping");
                return Vec::new();
            };
            let request =
                ReleaseSearchRequest::new(vec![indexer.remote_id], categories, query);
            match client.search(&request).await {
                Ok(resources) => resources
                    .into_iter()
                    .map(|r| r.into_release(indexer.id))
                    .collect(),
                Err(e) => {
                    warn!(indexer = %indexer.name, error = %e, "indexer search failed");
                    Vec::new()
                }
            }
        }
    });

    futures::future::join_all(searches)
        .await
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualityDefinition;

    fn profile() -> QualityProfile {
        QualityProfile {
            id: 1,
            name: "Default".to_string(),
            qualities: vec![
                QualityDefinition {
                    id: 1,
                    name: "HD Movie".to_string(),
                    media_type: MediaType::Movie,
                    min_mb_per_min: 0.0,
                    preferred_mb_per_min: 8.33,
                    max_mb_per_min: 16.67,
                },
                QualityDefinition {
                    id: 2,
                    name: "HD Episode".to_string(),
                    media_type: MediaType::Tv,
                    min_mb_per_min: 0.0,
                    preferred_mb_per_min: 5.0,
                    max_mb_per_min: 12.0,
                },
            ],
        }
    }

    fn torrent(title: &str, size_bytes: i64, seeders: Option<i32>) -> Release {
        Release {
            title: title.to_string(),
            size_bytes,
            seeders,
            protocol: Protocol::Torrent,
            download_url: format!("http://indexer/{title}"),
            indexer_id: 1,
        }
    }

    fn torrents_only() -> HashSet<Protocol> {
        HashSet::from([Protocol::Torrent])
    }

    #[test]
    fn movie_filter_applies_quality_window() {
        let mb = 1_048_576_i64;
        let survivors = filter_movie_releases(
            &profile(),
            120,
            &torrents_only(),
            vec![
                torrent("Movie.2024.CAM", mb, Some(10)),
                torrent("Movie.2024.REMUX", 24_000 * mb, Some(15)),
                torrent("Movie.2024.1080p", 16 * 120 * mb, Some(23)),
            ],
        );
        assert_eq!(survivors.len(), 2);
    }

    #[test]
    fn protocol_outside_snapshot_is_rejected() {
        let mut usenet = torrent("Movie.2024.1080p", 10 * 120 * 1_048_576, None);
        usenet.protocol = Protocol::Usenet;
        let survivors = filter_movie_releases(&profile(), 120, &torrents_only(), vec![usenet]);
        assert!(survivors.is_empty());
    }

    #[test]
    fn episode_filter_requires_matching_numbers() {
        let size = 8 * 45 * 1_048_576;
        let survivors = filter_episode_releases(
            &profile(),
            45,
            1,
            3,
            &torrents_only(),
            vec![
                torrent("Show.S01E03.1080p", size, Some(5)),
                torrent("Show.S01E04.1080p", size, Some(50)),
                torrent("Show.S02E03.1080p", size, Some(50)),
                torrent("Show.S01.1080p", size, Some(50)),
            ],
        );
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].title, "Show.S01E03.1080p");
    }

    #[test]
    fn season_pack_filter_rejects_single_episodes() {
        let size = 8 * 450 * 1_048_576;
        let survivors = filter_season_pack_releases(
            &profile(),
            450,
            1,
            &torrents_only(),
            vec![
                torrent("Show.S01.1080p.Complete", size, Some(9)),
                torrent("Show.S01E02.1080p", size, Some(90)),
            ],
        );
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].title, "Show.S01.1080p.Complete");
    }

    #[test]
    fn highest_seeded_release_wins() {
        let chosen = choose_release(vec![
            torrent("a", 1, Some(10)),
            torrent("b", 1, Some(23)),
            torrent("c", 1, Some(15)),
        ])
        .unwrap();
        assert_eq!(chosen.title, "b");
    }

    #[test]
    fn unknown_seeders_rank_lowest_and_first_tie_wins() {
        let chosen = choose_release(vec![
            torrent("unknown", 1, None),
            torrent("first", 1, Some(7)),
            torrent("second", 1, Some(7)),
        ])
        .unwrap();
        assert_eq!(chosen.title, "first");

        let only_unknowns = choose_release(vec![
            torrent("u1", 1, None),
            torrent("u2", 1, None),
        ])
        .unwrap();
        assert_eq!(only_unknowns.title, "u1");
    }

    #[test]
    fn season_pack_runtime_averages_known_values() {
        // Two known at 40 and 50, one unknown: 90 + 45 = 135.
        assert_eq!(season_pack_runtime(&[Some(40), Some(50), None]), 135);
    }

    #[test]
    fn season_pack_runtime_with_no_known_values_is_zero() {
        assert_eq!(season_pack_runtime(&[None, None]), 0);
    }

    #[test]
    fn season_pack_runtime_integer_division() {
        // 40 + 45 = 85, 85 / 2 = 42 (integer), one unknown -> 85 + 42 = 127.
        assert_eq!(season_pack_runtime(&[Some(40), Some(45), None]), 127);
    }
}
