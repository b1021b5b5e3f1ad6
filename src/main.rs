//! Quota Cache maintenance worker
//!
//! Builds the configured cache store, connects it, and runs the periodic
//! maintenance task until SIGINT/SIGTERM.

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quota_cache::{spawn_maintenance_task, CacheStore, Config, SessionCacheService};

/// Entry point for the maintenance worker.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache store for the configured backend and connect it
/// 4. Start the background maintenance task
/// 5. Wait for SIGINT/SIGTERM and shut down
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quota_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Quota Cache worker");

    let config = Config::from_env();
    let store = CacheStore::from_config(&config).context("invalid cache configuration")?;
    info!(
        "Configuration loaded: backend={}, session_ttl={}s, base_daily_quota={}, maintenance_interval={}s",
        store.backend_name(),
        config.session_ttl,
        config.base_daily_quota,
        config.maintenance_interval
    );

    store
        .connect()
        .await
        .context("failed to connect cache backend")?;
    info!("Cache store ready ({})", store.state());

    let sessions = SessionCacheService::from_config(store.clone(), &config);
    let maintenance_handle =
        spawn_maintenance_task(store.clone(), sessions, config.maintenance_interval);
    info!("Maintenance task started");

    shutdown_signal().await?;

    maintenance_handle.abort();
    warn!("Maintenance task aborted");
    info!("Worker shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() -> anyhow::Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<anyhow::Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            info!("Received Ctrl+C, initiating shutdown...");
        }
        result = terminate => {
            result?;
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
    Ok(())
}
