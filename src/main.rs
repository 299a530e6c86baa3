//! horde-broker: a distributed text-generation brokerage and kudos-economy
//! matching-and-accounting engine.
//!
//! Architecture:
//! - `broker`: the matching-and-accounting core (store, matcher, kudos economy)
//! - `storage`: load-on-start and periodic snapshot to `db/*.json`
//! - `http`: a thin axum boundary over the core
//! - `config`/`cli`/`logging`/`startup`: ambient plumbing

mod broker;
mod cli;
mod config;
mod http;
mod logging;
mod startup;
mod storage;

use anyhow::{Context, Result};
use config::Config;
use std::sync::Arc;
use std::time::Duration;

use broker::kudos::UnknownModelRegistry;
use broker::store::Store;
use broker::Broker;

#[tokio::main]
async fn main() -> Result<()> {
    if cli::handle_cli() {
        return Ok(());
    }

    Config::ensure_config_exists();
    let config = Config::from_env();

    let _log_guard = logging::init(&config);

    startup::print_startup(&config);
    startup::log_startup(&config);

    let loaded = storage::load(&config.db_dir)
        .with_context(|| format!("failed to load state from {}", config.db_dir.display()))?;

    let store = Arc::new(Store::from_parts(
        loaded.users,
        loaded.workers,
        loaded.stats,
        loaded.last_user_id,
        config.allow_anonymous,
    ));

    let broker = Broker::new(store.clone(), Arc::new(UnknownModelRegistry));

    let sweeper_store = store.clone();
    let sweeper_interval = Duration::from_secs(config.stale_prompt_sweep_secs);
    tokio::spawn(async move {
        broker::janitor::stale_prompt_sweeper(sweeper_store, sweeper_interval).await;
    });

    let snapshot_store = store.clone();
    let snapshot_dir = config.db_dir.clone();
    let snapshot_interval = Duration::from_secs(config.snapshot_interval_secs);
    tokio::spawn(async move {
        broker::janitor::snapshot_writer(snapshot_store, snapshot_dir, snapshot_interval).await;
    });

    let app = http::router(broker);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
