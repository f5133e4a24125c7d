pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod db;
pub mod entities;
pub mod library;
pub mod models;
pub mod parser;
pub mod quality;
pub mod services;
pub mod state;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub use config::Config;
use state::SharedState;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    run_with_config(config).await
}

pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    init_logging(&config)?;
    let prometheus_handle = init_prometheus(&config)?;

    let cli = Cli::parse();
    execute_command(cli, config, prometheus_handle).await
}

fn init_prometheus(
    config: &Config,
) -> anyhow::Result<Option<metrics_exporter_prometheus::PrometheusHandle>> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    if !config.observability.metrics_enabled {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("installing the metrics recorder")?;
    info!("metrics recorder installed; /metrics will serve it");
    Ok(Some(handle))
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if std::env::var("LOG_FORMAT").unwrap_or_default() == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false);
        registry.with(fmt_layer).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
    Ok(())
}

async fn execute_command(
    cli: Cli,
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    match cli.command {
        None => {
            // Bare invocation: show usage rather than silently starting a
            // daemon the user may not have wanted.
            use clap::CommandFactory;
            let mut usage = Cli::command();
            usage.print_help()?;
            Ok(())
        }

        Some(Commands::Daemon) => run_daemon(config, prometheus_handle).await,

        Some(Commands::Check) => run_single_check(config).await,

        Some(Commands::Init) => {
            let path = Config::create_default_if_missing()?;
            println!("Config file at {}", path.display());
            Ok(())
        }

        Some(Commands::AddMovie {
            tmdb_id,
            quality_profile,
        }) => cli::cmd_add_movie(&config, tmdb_id, quality_profile).await,

        Some(Commands::AddSeries {
            tmdb_id,
            quality_profile,
        }) => cli::cmd_add_series(&config, tmdb_id, quality_profile).await,

        Some(Commands::List) => cli::cmd_list(&config).await,

        Some(Commands::Jobs { limit }) => cli::cmd_jobs(&config, limit).await,

        Some(Commands::History { entity_type, id }) => {
            cli::cmd_history(&config, &entity_type, id).await
        }
    }
}

async fn run_daemon(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "booting the vidarr daemon");

    let server_enabled = config.server.enabled;
    let port = config.server.port;

    let shared = Arc::new(SharedState::new(config).await?);

    let shutdown = CancellationToken::new();
    let scheduler_handle = {
        let scheduler = Arc::clone(&shared.scheduler);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            scheduler.run(shutdown).await;
        })
    };

    let server_handle: Option<tokio::task::JoinHandle<()>> = if server_enabled {
        let app = api::router(Arc::clone(&shared), prometheus_handle);
        let addr = format!("0.0.0.0:{port}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        Some(tokio::spawn(async move {
            info!("API listening at http://{}", addr);
            if let Err(e) = axum::serve(listener, app).await {
                error!("API server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("vidarr is up; Ctrl+C shuts it down");
    wait_for_interrupt().await;

    info!("draining scheduler before exit...");
    shutdown.cancel();
    let _ = scheduler_handle.await;
    if let Some(handle) = server_handle {
        handle.abort();
    }
    info!("vidarr stopped cleanly");

    Ok(())
}

/// Block until the user interrupts us. A broken signal handler would leave
/// the process unstoppable, so that case exits the wait immediately.
async fn wait_for_interrupt() {
    if let Err(e) = signal::ctrl_c().await {
        error!("interrupt handler unavailable ({}), shutting down now", e);
    }
}

async fn run_single_check(config: Config) -> anyhow::Result<()> {
    info!("one-shot mode: running every job type once");

    let shared = SharedState::new(config).await?;
    shared.scheduler.run_once().await?;

    info!("one-shot pass finished");
    Ok(())
}
