use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transfer protocol a release is served over. Download clients declare the
/// one protocol they speak; a release is only usable if some configured
/// client matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Torrent,
    Usenet,
}

impl Protocol {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Torrent => "torrent",
            Self::Usenet => "usenet",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = super::state::UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "torrent" => Ok(Self::Torrent),
            "usenet" => Ok(Self::Usenet),
            other => Err(super::state::UnknownState::new(other)),
        }
    }
}

/// A candidate file offered by an indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub title: String,

    pub size_bytes: i64,

    /// Torrent seeder count; usenet releases report none.
    pub seeders: Option<i32>,

    pub protocol: Protocol,

    pub download_url: String,

    /// Our row id for the indexer that offered this release.
    pub indexer_id: i32,
}

impl Release {
    /// Release size in megabytes per minute of runtime. A runtime of zero
    /// yields `None` so size-window checks reject rather than divide by zero.
    #[must_use]
    pub fn mb_per_minute(&self, runtime_minutes: i32) -> Option<f64> {
        if runtime_minutes <= 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let mb = self.size_bytes as f64 / 1_048_576.0;
        Some(mb / f64::from(runtime_minutes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(size_bytes: i64) -> Release {
        Release {
            title: "Some.Movie.2024.1080p".to_string(),
            size_bytes,
            seeders: Some(5),
            protocol: Protocol::Torrent,
            download_url: "http://indexer/dl/1".to_string(),
            indexer_id: 1,
        }
    }

    #[test]
    fn mb_per_minute_divides_size_by_runtime() {
        // 1200 MiB over 120 minutes = 10 MB/min.
        let r = release(1200 * 1_048_576);
        assert!((r.mb_per_minute(120).unwrap() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_runtime_yields_none() {
        assert_eq!(release(1_048_576).mb_per_minute(0), None);
        assert_eq!(release(1_048_576).mb_per_minute(-5), None);
    }

    #[test]
    fn protocol_round_trips() {
        assert_eq!("torrent".parse::<Protocol>().unwrap(), Protocol::Torrent);
        assert_eq!("usenet".parse::<Protocol>().unwrap(), Protocol::Usenet);
        assert!("carrier-pigeon".parse::<Protocol>().is_err());
    }
}
