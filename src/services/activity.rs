//! Read-only views derived from the transition logs: what is in flight,
//! what happened per day, and per-entity history.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::Store;
use crate::models::state::{
    EntityKind, EpisodeState, JobState, MovieState, SeasonState, SeriesState,
};
use crate::models::{fmt_rfc3339, parse_rfc3339};

#[derive(Debug, Clone, Serialize)]
pub struct ActivityItem {
    pub entity_type: String,
    pub entity_id: i32,
    pub state: String,
    pub since: String,
    pub duration: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineBucket {
    pub entity_type: String,
    pub to_state: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineDay {
    pub date: String,
    pub buckets: Vec<TimelineBucket>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub from_state: Option<String>,
    pub to_state: String,
    pub created_at: String,
    pub duration: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub title: String,
    pub message: String,
    pub at: String,
}

/// Compact wall-clock formatting: seconds below a minute, minutes (with a
/// seconds remainder) below an hour, hours with a minutes remainder above.
#[must_use]
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 3600 {
        let minutes = seconds / 60;
        let rest = seconds % 60;
        if rest == 0 {
            return format!("{minutes}m");
        }
        return format!("{minutes}m {rest}s");
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if minutes == 0 {
        return format!("{hours}h");
    }
    format!("{hours}h {minutes}m")
}

pub struct ActivityService {
    store: Store,
}

impl ActivityService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Everything currently in flight: entities whose most-recent transition
    /// is into Downloading, plus running jobs.
    pub async fn get_active_activity(&self, now: DateTime<Utc>) -> Result<Vec<ActivityItem>> {
        let mut items = Vec::new();

        let downloading_states: [(EntityKind, &str); 4] = [
            (EntityKind::Movie, MovieState::Downloading.as_str()),
            (EntityKind::Episode, EpisodeState::Downloading.as_str()),
            (EntityKind::Season, SeasonState::Downloading.as_str()),
            (EntityKind::Series, SeriesState::Downloading.as_str()),
        ];
        for (kind, state) in downloading_states {
            for row in self.store.most_recent_transitions_into(kind, state).await? {
                let since = parse_rfc3339(&row.created_at).unwrap_or(now);
                items.push(ActivityItem {
                    entity_type: kind.as_str().to_string(),
                    entity_id: row.entity_id,
                    state: row.to_state,
                    since: row.created_at,
                    duration: format_duration((now - since).num_seconds()),
                });
            }
        }

        for job in self.store.list_running_jobs().await? {
            let since = parse_rfc3339(&job.updated_at).unwrap_or(now);
            items.push(ActivityItem {
                entity_type: EntityKind::Job.as_str().to_string(),
                entity_id: job.id,
                state: format!("{} ({})", JobState::Running, job.job_type),
                since: job.updated_at,
                duration: format_duration((now - since).num_seconds()),
            });
        }

        Ok(items)
    }

    /// Transitions inside `[now - days, now]`, grouped by day and counted by
    /// (entity class, target state).
    pub async fn get_activity_timeline(
        &self,
        now: DateTime<Utc>,
        days: i64,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<TimelineDay>> {
        let start = fmt_rfc3339(now - Duration::days(days.max(0)));
        let end = fmt_rfc3339(now);
        let rows = self.store.transitions_between(&start, &end, offset, limit).await?;

        let mut by_day: BTreeMap<String, BTreeMap<(String, String), u64>> = BTreeMap::new();
        for row in rows {
            let day = row.created_at.get(..10).unwrap_or("").to_string();
            *by_day
                .entry(day)
                .or_default()
                .entry((row.entity_type, row.to_state))
                .or_default() += 1;
        }

        Ok(by_day
            .into_iter()
            .map(|(date, buckets)| TimelineDay {
                date,
                buckets: buckets
                    .into_iter()
                    .map(|((entity_type, to_state), count)| TimelineBucket {
                        entity_type,
                        to_state,
                        count,
                    })
                    .collect(),
            })
            .collect())
    }

    /// Full transition history for one entity; each entry's duration is the
    /// gap to the next entry, or to now for the last.
    pub async fn get_entity_history(
        &self,
        kind: EntityKind,
        entity_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>> {
        let rows = self.store.entity_transitions(kind, entity_id).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let start = parse_rfc3339(&row.created_at).unwrap_or(now);
            let end = rows
                .get(index + 1)
                .and_then(|next| parse_rfc3339(&next.created_at))
                .unwrap_or(now);
            entries.push(HistoryEntry {
                from_state: row.from_state.clone(),
                to_state: row.to_state.clone(),
                created_at: row.created_at.clone(),
                duration: format_duration((end - start).num_seconds()),
            });
        }
        Ok(entries)
    }

    /// Jobs that ended in error within the window, newest first.
    pub async fn get_recent_failures(
        &self,
        now: DateTime<Utc>,
        hours: i64,
    ) -> Result<Vec<Failure>> {
        let cutoff = fmt_rfc3339(now - Duration::hours(hours.max(0)));
        let jobs = self.store.list_error_jobs_since(&cutoff).await?;

        Ok(jobs
            .into_iter()
            .map(|job| Failure {
                title: job.job_type,
                message: job.error.unwrap_or_default(),
                at: job.updated_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_below_a_minute() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59), "59s");
    }

    #[test]
    fn minutes_with_and_without_remainder() {
        assert_eq!(format_duration(60), "1m");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3599), "59m 59s");
    }

    #[test]
    fn hours_with_and_without_remainder() {
        assert_eq!(format_duration(3600), "1h");
        assert_eq!(format_duration(3660), "1h 1m");
        assert_eq!(format_duration(7265), "2h 1m");
    }

    #[test]
    fn negative_durations_clamp_to_zero() {
        assert_eq!(format_duration(-5), "0s");
    }
}
