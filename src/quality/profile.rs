use super::definition::{MediaType, QualityDefinition};
use serde::{Deserialize, Serialize};

/// An ordered bundle of quality definitions. A release satisfies the profile
/// when at least one definition of the matching media type accepts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub id: i32,

    pub name: String,

    pub qualities: Vec<QualityDefinition>,
}

impl QualityProfile {
    #[must_use]
    pub fn accepts(&self, size_bytes: i64, runtime_minutes: i32, media_type: MediaType) -> bool {
        self.qualities
            .iter()
            .filter(|q| q.media_type == media_type)
            .any(|q| q.accepts(size_bytes, runtime_minutes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> QualityProfile {
        QualityProfile {
            id: 1,
            name: "Default".to_string(),
            qualities: vec![
                QualityDefinition {
                    id: 1,
                    name: "SD".to_string(),
                    media_type: MediaType::Tv,
                    min_mb_per_min: 0.0,
                    preferred_mb_per_min: 4.0,
                    max_mb_per_min: 8.0,
                },
                QualityDefinition {
                    id: 2,
                    name: "HD".to_string(),
                    media_type: MediaType::Movie,
                    min_mb_per_min: 0.0,
                    preferred_mb_per_min: 8.33,
                    max_mb_per_min: 16.67,
                },
            ],
        }
    }

    #[test]
    fn any_matching_definition_satisfies() {
        let p = profile();
        // 10 MB/min movie fits the movie window but not the TV window.
        let size = 10 * 120 * 1_048_576;
        assert!(p.accepts(size, 120, MediaType::Movie));
        assert!(!p.accepts(size, 120, MediaType::Tv));
    }

    #[test]
    fn wrong_media_type_never_matches() {
        let p = QualityProfile {
            qualities: p_tv_only(),
            ..profile()
        };
        assert!(!p.accepts(4 * 60 * 1_048_576, 60, MediaType::Movie));
    }

    fn p_tv_only() -> Vec<QualityDefinition> {
        vec![QualityDefinition {
            id: 1,
            name: "SD".to_string(),
            media_type: MediaType::Tv,
            min_mb_per_min: 0.0,
            preferred_mb_per_min: 4.0,
            max_mb_per_min: 8.0,
        }]
    }
}
