//! cachepool host process
//!
//! Owns one cache and one connection pool for the lifetime of the process,
//! keeps the cache tidy and the database maintained until shutdown.

use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cachepool::cache::{shared, CacheStore};
use cachepool::{spawn_cleanup_task, Config, QueryExecutor};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Create the shared cache and start the TTL cleanup task
/// 4. Open the connection pool and run database maintenance
/// 5. Wait for SIGINT/SIGTERM, then stop the cleanup task and close the pool
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cachepool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    config.validate()?;
    info!(
        "Configuration loaded: max_size={}, default_ttl={}s, cleanup_interval={}s, max_connections={}, backing_path={}",
        config.cache.max_size,
        config.cache.default_ttl,
        config.cache.cleanup_interval,
        config.pool.max_connections,
        config.pool.backing_path.display()
    );

    let cache = shared(CacheStore::<serde_json::Value>::from_config(&config.cache));
    let cleanup_handle = spawn_cleanup_task(
        cache.clone(),
        Duration::from_secs(config.cache.cleanup_interval),
    );

    let executor = QueryExecutor::from_config(&config.pool);
    executor
        .initialize()
        .await
        .with_context(|| format!("opening {}", config.pool.backing_path.display()))?;

    let report = executor.optimize().await;
    if !report.is_clean() {
        warn!("{} maintenance command(s) failed", report.failed.len());
    }

    shutdown_signal().await;

    cleanup_handle.abort();
    let stats = cache.lock().stats();
    info!(
        "Cache stats at shutdown: size={}, hits={}, misses={}, evictions={}",
        stats.size, stats.hits, stats.misses, stats.evictions
    );
    executor.close();

    info!("Shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
