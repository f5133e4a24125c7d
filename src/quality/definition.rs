use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Media class a quality definition applies to. A movie window never accepts
/// an episode release and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = crate::models::state::UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(Self::Movie),
            "tv" => Ok(Self::Tv),
            other => Err(crate::models::state::UnknownState::new(other)),
        }
    }
}

/// A size-per-minute window. Releases are judged on megabytes per minute of
/// runtime rather than resolution tags, which survives mislabeled titles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityDefinition {
    pub id: i32,

    pub name: String,

    pub media_type: MediaType,

    pub min_mb_per_min: f64,

    pub preferred_mb_per_min: f64,

    pub max_mb_per_min: f64,
}

impl QualityDefinition {
    /// Whether a release of `size_bytes` at `runtime_minutes` falls inside
    /// this window. Unknown or zero runtime rejects.
    #[must_use]
    pub fn accepts(&self, size_bytes: i64, runtime_minutes: i32) -> bool {
        if runtime_minutes <= 0 {
            return false;
        }
        #[allow(clippy::cast_precision_loss)]
        let mb_per_min = (size_bytes as f64 / 1_048_576.0) / f64::from(runtime_minutes);
        mb_per_min >= self.min_mb_per_min && mb_per_min <= self.max_mb_per_min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hd_movie() -> QualityDefinition {
        QualityDefinition {
            id: 1,
            name: "HD".to_string(),
            media_type: MediaType::Movie,
            min_mb_per_min: 0.0,
            preferred_mb_per_min: 8.33,
            max_mb_per_min: 16.67,
        }
    }

    #[test]
    fn accepts_inside_window() {
        // 16.67 MB/min over 120 minutes, just on the boundary.
        #[allow(clippy::cast_possible_truncation)]
        let size = (16.67 * 120.0 * 1_048_576.0) as i64;
        assert!(hd_movie().accepts(size, 120));
    }

    #[test]
    fn rejects_oversized() {
        // 200 MB/min is far past the 16.67 cap.
        let size = 200 * 120 * 1_048_576;
        assert!(!hd_movie().accepts(size, 120));
    }

    #[test]
    fn rejects_unknown_runtime() {
        assert!(!hd_movie().accepts(1_048_576, 0));
    }
}
