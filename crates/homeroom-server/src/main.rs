//! Gamification service binary for Homeroom.
//!
//! Wires together the configuration, the `PostgreSQL` pool, the
//! cadence engine, the HTTP API, and the periodic tick driver.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `homeroom-config.yaml`
//! 3. Connect to `PostgreSQL` and run migrations
//! 4. Build the cadence engine over the host-table signal source
//! 5. Start the HTTP API server
//! 6. Run the periodic tick loop until Ctrl-C

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use homeroom_api::{AppState, ServerConfig};
use homeroom_core::{ConfigError, EngineConfig};
use homeroom_db::{DbError, PostgresPool};
use homeroom_engine::{CadenceEngine, EngineError, PgSignalSource};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Errors that can occur during service startup.
#[derive(Debug, thiserror::Error)]
enum ServiceError {
    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The database could not be reached or migrated.
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// The engine could not be constructed.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Application entry point for the gamification service.
///
/// # Errors
///
/// Returns an error if any initialization step fails.
#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("homeroom-server starting");

    // 2. Load configuration.
    let config = Arc::new(load_config()?);
    info!(
        timezone = config.schedule.timezone,
        api_port = config.infrastructure.api_port,
        tick_interval_secs = config.infrastructure.tick_interval_secs,
        "Configuration loaded"
    );

    // 3. Connect to PostgreSQL and migrate.
    let pool = PostgresPool::connect_url(&config.infrastructure.postgres_url).await?;
    pool.run_migrations().await?;

    // 4. Build the engine. Attendance and assignment signals come from
    //    the host application's tables in the same database.
    let signals = PgSignalSource::new(pool.pool().clone());
    let engine = CadenceEngine::new(pool.pool().clone(), Arc::clone(&config), signals)?;
    let state = Arc::new(AppState::new(engine));

    // 5. Start the HTTP API server.
    let server_config = ServerConfig {
        host: String::from("0.0.0.0"),
        port: config.infrastructure.api_port,
    };
    let api_state = Arc::clone(&state);
    tokio::spawn(async move {
        if let Err(error) = homeroom_api::start_server(&server_config, api_state).await {
            warn!(%error, "API server exited");
        }
    });

    // 6. Periodic tick loop. The interval stays well below the finest
    //    trigger granularity so due states are picked up promptly.
    let interval_secs = config.infrastructure.tick_interval_secs.max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    info!(interval_secs, "Entering cadence tick loop");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match state.engine.tick(Utc::now()).await {
                    Ok(outcome) => {
                        if outcome.daily_spawned > 0
                            || outcome.expired > 0
                            || outcome.weekly_evaluated > 0
                        {
                            info!(
                                daily_spawned = outcome.daily_spawned,
                                expired = outcome.expired,
                                weekly_evaluated = outcome.weekly_evaluated,
                                "Tick advanced due worlds"
                            );
                        }
                    }
                    Err(error) => warn!(%error, "cadence tick failed"),
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    warn!(%error, "ctrl-c handler failed");
                }
                break;
            }
        }
    }

    pool.close().await;
    info!("homeroom-server shutdown complete");
    Ok(())
}

/// Load the service configuration from `homeroom-config.yaml`.
///
/// Looks for the config file relative to the current working
/// directory; missing file falls back to defaults (with `DATABASE_URL`
/// still applied from the environment).
fn load_config() -> Result<EngineConfig, ServiceError> {
    let config_path = Path::new("homeroom-config.yaml");
    if config_path.exists() {
        Ok(EngineConfig::from_file(config_path)?)
    } else {
        info!("Config file not found, using defaults");
        let mut config = EngineConfig::default();
        config.infrastructure.apply_env_overrides();
        Ok(config)
    }
}
