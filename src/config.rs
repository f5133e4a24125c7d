use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::models::state::JobType;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub jobs: JobsConfig,

    pub library: LibraryConfig,

    pub tmdb: TmdbConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/vidarr.db".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 7878,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Scheduling intervals, one per job type, plus the retention count for
/// finished job rows. Zero retention disables pruning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub movie_index_minutes: i64,

    pub movie_reconcile_minutes: i64,

    pub series_index_minutes: i64,

    pub series_reconcile_minutes: i64,

    pub indexer_sync_minutes: i64,

    pub min_jobs_to_keep: i64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            movie_index_minutes: 10,
            movie_reconcile_minutes: 10,
            series_index_minutes: 10,
            series_reconcile_minutes: 10,
            indexer_sync_minutes: 10,
            min_jobs_to_keep: 0,
        }
    }
}

impl JobsConfig {
    #[must_use]
    pub const fn interval_minutes(&self, job_type: JobType) -> i64 {
        match job_type {
            JobType::MovieIndex => self.movie_index_minutes,
            JobType::MovieReconcile => self.movie_reconcile_minutes,
            JobType::SeriesIndex => self.series_index_minutes,
            JobType::SeriesReconcile => self.series_reconcile_minutes,
            JobType::IndexerSync => self.indexer_sync_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub movie_dir: String,

    pub tv_dir: String,

    /// Where the download clients' finished files are visible to us.
    pub download_mount_dir: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            movie_dir: "./library/movies".to_string(),
            tv_dir: "./library/tv".to_string(),
            download_mount_dir: "./downloads".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Config {
    /// Resolution order: `VIDARR_CONFIG`, `./config.toml`, then the user
    /// config directory. Missing file means defaults.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            info!("No config file found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    #[must_use]
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("VIDARR_CONFIG") {
            return PathBuf::from(path);
        }
        let local = PathBuf::from("config.toml");
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("vidarr").join("config.toml"))
            .unwrap_or(local)
    }

    pub fn create_default_if_missing() -> Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(&Self::default())?;
        std::fs::write(&path, rendered)?;
        Ok(path)
    }

    pub fn validate(&self) -> Result<()> {
        for job_type in JobType::ALL {
            if self.jobs.interval_minutes(job_type) <= 0 {
                bail!("jobs.{job_type} interval must be positive");
            }
        }
        if self.server.enabled && self.server.port == 0 {
            bail!("server.port must be set when the server is enabled");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn every_job_type_defaults_to_ten_minutes() {
        let jobs = JobsConfig::default();
        for job_type in JobType::ALL {
            assert_eq!(jobs.interval_minutes(job_type), 10);
        }
    }

    #[test]
    fn zero_interval_fails_validation() {
        let mut config = Config::default();
        config.jobs.indexer_sync_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str("[jobs]\nmovie_index_minutes = 30\n").unwrap();
        assert_eq!(config.jobs.movie_index_minutes, 30);
        assert_eq!(config.jobs.series_index_minutes, 10);
        assert_eq!(config.server.port, 7878);
    }
}
