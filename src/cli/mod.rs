//! Command-line interface: daemon mode plus a handful of one-shot
//! maintenance commands.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::config::Config;
use crate::models::state::EntityKind;
use crate::state::SharedState;

#[derive(Parser)]
#[command(name = "vidarr", about = "Movie & TV library orchestrator", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run continuously: scheduler plus the HTTP API.
    Daemon,

    /// Run every job type once and exit.
    Check,

    /// Write a default config file if none exists.
    Init,

    /// Add a movie by TMDB id.
    AddMovie {
        tmdb_id: i32,

        #[arg(long, default_value_t = 1)]
        quality_profile: i32,
    },

    /// Add a series by TMDB id.
    AddSeries {
        tmdb_id: i32,

        #[arg(long, default_value_t = 1)]
        quality_profile: i32,
    },

    /// List everything in the library with current states.
    List,

    /// Show recent jobs.
    Jobs {
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },

    /// Show the transition history of one entity.
    History {
        /// movie, series, season, episode, or job
        entity_type: String,

        id: i32,
    },
}

pub async fn cmd_add_movie(config: &Config, tmdb_id: i32, quality_profile: i32) -> Result<()> {
    let state = SharedState::new(config.clone()).await?;
    let movie = state.catalog.add_movie(tmdb_id, quality_profile, true).await?;
    println!("Added movie {} (tmdb {}) in state {}", movie.id, tmdb_id, movie.state);
    Ok(())
}

pub async fn cmd_add_series(config: &Config, tmdb_id: i32, quality_profile: i32) -> Result<()> {
    let state = SharedState::new(config.clone()).await?;
    let series = state.catalog.add_series(tmdb_id, quality_profile, true).await?;
    println!("Added series {} (tmdb {}) in state {}", series.id, tmdb_id, series.state);
    Ok(())
}

pub async fn cmd_list(config: &Config) -> Result<()> {
    let state = SharedState::new(config.clone()).await?;

    let movies = state.store.list_movies().await?;
    println!("Movies ({}):", movies.len());
    for movie in movies {
        println!(
            "  [{}] {} ({})",
            movie.id,
            movie.path.as_deref().unwrap_or("<no path>"),
            movie.state
        );
    }

    let series = state.store.list_series().await?;
    println!("Series ({}):", series.len());
    for entry in series {
        println!(
            "  [{}] {} ({})",
            entry.id,
            entry.path.as_deref().unwrap_or("<no path>"),
            entry.state
        );
        for season in state.store.list_seasons(entry.id).await? {
            println!("    Season {:02} ({})", season.season_number, season.state);
        }
    }
    Ok(())
}

pub async fn cmd_jobs(config: &Config, limit: u64) -> Result<()> {
    let state = SharedState::new(config.clone()).await?;
    for job in state.store.list_jobs(0, limit).await? {
        println!(
            "  [{}] {} {} at {}{}",
            job.id,
            job.job_type,
            job.state,
            job.updated_at,
            job.error.map(|e| format!(" ({e})")).unwrap_or_default()
        );
    }
    Ok(())
}

pub async fn cmd_history(config: &Config, entity_type: &str, id: i32) -> Result<()> {
    let kind: EntityKind = entity_type.parse()?;
    let state = Arc::new(SharedState::new(config.clone()).await?);
    let entries = state
        .activity
        .get_entity_history(kind, id, chrono::Utc::now())
        .await?;
    for entry in entries {
        println!(
            "  {} -> {} at {} ({})",
            entry.from_state.as_deref().unwrap_or("-"),
            entry.to_state,
            entry.created_at,
            entry.duration
        );
    }
    Ok(())
}
