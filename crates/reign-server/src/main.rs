//! Server binary for the Reign territory game.
//!
//! Wires the store, the cycle scheduler, the game services and the
//! observer server together, then runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `reign-config.yaml` (or the path given as
//!    the first argument), with `REIGN_PORT` and `REIGN_DATABASE_URL`
//!    overrides
//! 2. Initialize structured logging (tracing)
//! 3. Open the store: connect to `PostgreSQL`, run migrations and load the
//!    read model when a database URL is configured, otherwise run in memory
//! 4. Create the configured seed worlds that do not exist yet
//! 5. Anchor never-ticked worlds and start every world's cycle, seeded ones
//!    included
//! 6. Start the observer server
//! 7. Wait for `Ctrl-C`, then stop the cycles and close the pool

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use reign_core::config::{LogFormat, LoggingConfig, ReignConfig, StorageConfig};
use reign_core::SystemClock;
use reign_db::{MemoryStore, PgStore, PostgresConfig, PostgresPool, WorldStore};
use reign_observer::state::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ServerError;

/// Default configuration file, relative to the working directory.
const CONFIG_FILE: &str = "reign-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any startup step fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let config = ReignConfig::load_or_default(&config_path).map_err(ServerError::from)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        config = %config_path.display(),
        host = %config.server.host,
        port = config.server.port,
        database = config.storage.database_url.is_some(),
        seed_worlds = config.seed_worlds.len(),
        "reign-server starting"
    );

    // 3. Open the store.
    let (store, pool) = open_store(&config.storage).await?;

    let state = Arc::new(AppState::new(
        store,
        Arc::new(SystemClock),
        config.world_defaults.clone(),
    ));

    // 4. Seed worlds.
    let seeded = state
        .worlds
        .seed_worlds(&config.seed_worlds)
        .map_err(ServerError::from)?;
    info!(seeded, "Seed worlds created");

    // 5. Start every world's cycle. Seeding does not arm timers, so each
    //    world is started exactly once here.
    let started = state.scheduler.initialize_all();
    info!(started, "Cycle scheduler initialized");

    // 6. Start the observer server.
    let (addr, observer) = reign_observer::spawn_observer(&config.server, Arc::clone(&state))
        .await
        .map_err(ServerError::from)?;
    info!(%addr, "Observer API server started");

    // 7. Run until interrupted.
    tokio::signal::ctrl_c().await.map_err(ServerError::from)?;
    info!("Shutdown signal received");

    observer.abort();
    for world in state.worlds.all_worlds() {
        state.scheduler.stop(world.id);
    }
    if let Some(pool) = pool {
        pool.close().await;
    }

    info!("reign-server shutdown complete");
    Ok(())
}

/// Open the configured store.
///
/// Returns the pool alongside a `PostgreSQL`-backed store so it can be
/// closed on shutdown.
///
/// # Errors
///
/// Returns [`ServerError::Store`] if connecting, migrating or loading fails.
async fn open_store(
    storage: &StorageConfig,
) -> Result<(Arc<dyn WorldStore>, Option<PostgresPool>), ServerError> {
    let Some(url) = storage.database_url.as_deref() else {
        warn!("No database URL configured, state will not survive restarts");
        return Ok((Arc::new(MemoryStore::new()), None));
    };

    let pool = PostgresPool::connect(
        &PostgresConfig::new(url).with_max_connections(storage.max_connections),
    )
    .await?;
    pool.run_migrations().await?;
    let store = PgStore::open(&pool).await?;
    Ok((Arc::new(store), Some(pool)))
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}
