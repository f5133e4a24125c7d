//! Entity lifecycle states and the aggregation rules that derive season and
//! series state from their children.
//!
//! States are persisted as lowercase strings alongside an append-only
//! transition log; the enums here are the only place the spelling lives.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
#[error("unknown state: {0}")]
pub struct UnknownState(String);

impl UnknownState {
    #[must_use]
    pub(crate) fn new(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

macro_rules! state_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownState;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownState(other.to_string())),
                }
            }
        }
    };
}

state_enum!(MovieState {
    Discovered => "discovered",
    Missing => "missing",
    Unreleased => "unreleased",
    Downloading => "downloading",
    Downloaded => "downloaded",
    Completed => "completed",
});

state_enum!(EpisodeState {
    Discovered => "discovered",
    Missing => "missing",
    Unreleased => "unreleased",
    Downloading => "downloading",
    Downloaded => "downloaded",
    Completed => "completed",
});

state_enum!(SeasonState {
    Discovered => "discovered",
    Missing => "missing",
    Unreleased => "unreleased",
    Continuing => "continuing",
    Downloading => "downloading",
    Completed => "completed",
});

state_enum!(SeriesState {
    Discovered => "discovered",
    Missing => "missing",
    Unreleased => "unreleased",
    Continuing => "continuing",
    Downloading => "downloading",
    Completed => "completed",
});

state_enum!(JobState {
    Pending => "pending",
    Running => "running",
    Done => "done",
    Error => "error",
    Cancelled => "cancelled",
});

impl JobState {
    /// A terminal job is finished and only ever read again for history.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Cancelled)
    }
}

impl SeasonState {
    /// Derive a season's state from its episodes.
    ///
    /// The rules are ordered; the first match wins.
    #[must_use]
    pub fn aggregate(episodes: &[EpisodeState]) -> Self {
        use EpisodeState as E;

        if episodes.is_empty() {
            return Self::Missing;
        }

        let count = |s: E| episodes.iter().filter(|&&e| e == s).count();
        let discovered = count(E::Discovered);
        let missing = count(E::Missing);
        let unreleased = count(E::Unreleased);
        let downloading = count(E::Downloading);
        let settled = count(E::Downloaded) + count(E::Completed);
        let total = episodes.len();

        if settled == total {
            return Self::Completed;
        }
        if downloading > 0 {
            return Self::Downloading;
        }
        if discovered > 0 && (settled > 0 || missing > 0) {
            return Self::Continuing;
        }
        if (settled > 0 || missing > 0) && unreleased > 0 {
            return Self::Continuing;
        }
        if missing > 0 && unreleased == 0 {
            return Self::Missing;
        }
        if unreleased == total {
            return Self::Unreleased;
        }
        if discovered == total {
            return Self::Discovered;
        }
        Self::Missing
    }
}

impl SeriesState {
    /// Derive a series' state from its seasons. Completed plays the settled
    /// role that Downloaded/Completed play one level down, and any Continuing
    /// season makes the series Continuing.
    #[must_use]
    pub fn aggregate(seasons: &[SeasonState]) -> Self {
        use SeasonState as S;

        if seasons.is_empty() {
            return Self::Missing;
        }

        let count = |s: S| seasons.iter().filter(|&&e| e == s).count();
        let discovered = count(S::Discovered);
        let missing = count(S::Missing);
        let unreleased = count(S::Unreleased);
        let downloading = count(S::Downloading);
        let continuing = count(S::Continuing);
        let settled = count(S::Completed);
        let total = seasons.len();

        if settled == total {
            return Self::Completed;
        }
        if downloading > 0 {
            return Self::Downloading;
        }
        if continuing > 0 {
            return Self::Continuing;
        }
        if discovered > 0 && (settled > 0 || missing > 0) {
            return Self::Continuing;
        }
        if (settled > 0 || missing > 0) && unreleased > 0 {
            return Self::Continuing;
        }
        if missing > 0 && unreleased == 0 {
            return Self::Missing;
        }
        if unreleased == total {
            return Self::Unreleased;
        }
        if discovered == total {
            return Self::Discovered;
        }
        Self::Missing
    }
}

/// Entity classes that carry a transition log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Movie,
    Series,
    Season,
    Episode,
    Job,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
            Self::Season => "season",
            Self::Episode => "episode",
            Self::Job => "job",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(Self::Movie),
            "series" => Ok(Self::Series),
            "season" => Ok(Self::Season),
            "episode" => Ok(Self::Episode),
            "job" => Ok(Self::Job),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

/// The blob attached to a transition row. Carries the in-flight download
/// reference so completion handling can find the client and, for season
/// packs, fan out to every episode of the group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_client_id: Option<i32>,

    #[serde(default)]
    pub is_entire_season_download: bool,
}

impl TransitionMetadata {
    #[must_use]
    pub fn for_download(download_id: &str, download_client_id: i32) -> Self {
        Self {
            download_id: Some(download_id.to_string()),
            download_client_id: Some(download_client_id),
            is_entire_season_download: false,
        }
    }

    #[must_use]
    pub fn season_pack(mut self) -> Self {
        self.is_entire_season_download = true;
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.download_id.is_none()
            && self.download_client_id.is_none()
            && !self.is_entire_season_download
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// The periodic job types the scheduler knows how to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    MovieIndex,
    MovieReconcile,
    SeriesIndex,
    SeriesReconcile,
    IndexerSync,
}

impl JobType {
    pub const ALL: [Self; 5] = [
        Self::MovieIndex,
        Self::MovieReconcile,
        Self::SeriesIndex,
        Self::SeriesReconcile,
        Self::IndexerSync,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MovieIndex => "movie_index",
            Self::MovieReconcile => "movie_reconcile",
            Self::SeriesIndex => "series_index",
            Self::SeriesReconcile => "series_reconcile",
            Self::IndexerSync => "indexer_sync",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie_index" => Ok(Self::MovieIndex),
            "movie_reconcile" => Ok(Self::MovieReconcile),
            "series_index" => Ok(Self::SeriesIndex),
            "series_reconcile" => Ok(Self::SeriesReconcile),
            "indexer_sync" => Ok(Self::IndexerSync),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EpisodeState as E;
    use SeasonState as S;

    #[test]
    fn state_round_trips_through_strings() {
        for state in [
            MovieState::Discovered,
            MovieState::Missing,
            MovieState::Unreleased,
            MovieState::Downloading,
            MovieState::Downloaded,
            MovieState::Completed,
        ] {
            assert_eq!(state.as_str().parse::<MovieState>().unwrap(), state);
        }
        assert!("definitely-not-a-state".parse::<MovieState>().is_err());
    }

    #[test]
    fn empty_season_is_missing() {
        assert_eq!(SeasonState::aggregate(&[]), S::Missing);
    }

    #[test]
    fn all_settled_season_is_completed() {
        assert_eq!(
            SeasonState::aggregate(&[E::Downloaded, E::Completed, E::Downloaded]),
            S::Completed
        );
    }

    #[test]
    fn any_downloading_wins() {
        assert_eq!(
            SeasonState::aggregate(&[E::Missing, E::Downloading, E::Discovered]),
            S::Downloading
        );
    }

    #[test]
    fn discovered_mixed_with_work_is_continuing() {
        assert_eq!(
            SeasonState::aggregate(&[E::Discovered, E::Missing]),
            S::Continuing
        );
        assert_eq!(
            SeasonState::aggregate(&[E::Discovered, E::Downloaded]),
            S::Continuing
        );
    }

    #[test]
    fn missing_or_settled_with_unreleased_is_continuing() {
        assert_eq!(
            SeasonState::aggregate(&[E::Missing, E::Unreleased]),
            S::Continuing
        );
        assert_eq!(
            SeasonState::aggregate(&[E::Downloaded, E::Unreleased]),
            S::Continuing
        );
    }

    #[test]
    fn missing_without_unreleased_is_missing() {
        assert_eq!(
            SeasonState::aggregate(&[E::Missing, E::Missing]),
            S::Missing
        );
    }

    #[test]
    fn all_unreleased_is_unreleased() {
        assert_eq!(
            SeasonState::aggregate(&[E::Unreleased, E::Unreleased]),
            S::Unreleased
        );
    }

    #[test]
    fn all_discovered_is_discovered() {
        assert_eq!(
            SeasonState::aggregate(&[E::Discovered, E::Discovered]),
            S::Discovered
        );
    }

    #[test]
    fn series_continuing_season_dominates() {
        assert_eq!(
            SeriesState::aggregate(&[S::Completed, S::Continuing]),
            SeriesState::Continuing
        );
    }

    #[test]
    fn series_downloading_beats_continuing() {
        assert_eq!(
            SeriesState::aggregate(&[S::Continuing, S::Downloading]),
            SeriesState::Downloading
        );
    }

    #[test]
    fn series_all_completed() {
        assert_eq!(
            SeriesState::aggregate(&[S::Completed, S::Completed]),
            SeriesState::Completed
        );
    }

    #[test]
    fn transition_metadata_round_trip() {
        let meta = TransitionMetadata::for_download("abc123", 7).season_pack();
        let parsed = TransitionMetadata::from_json(&meta.to_json().unwrap()).unwrap();
        assert_eq!(parsed, meta);
        assert!(parsed.is_entire_season_download);
    }

    #[test]
    fn job_type_round_trips() {
        for t in JobType::ALL {
            assert_eq!(t.as_str().parse::<JobType>().unwrap(), t);
        }
    }
}
