//! Atlas assignment expiry sweeper.
//!
//! Persists the `expired` state for assignments whose expiry has passed.
//! Snapshots already ignore lapsed assignments, so the sweep only keeps the
//! stored ledger in step with effective state.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use atlas_application::LedgerService;
use atlas_core::{AppError, AppResult};
use atlas_infrastructure::{MIGRATOR, PostgresAccessRepository, PostgresUserDirectory};
use chrono::Utc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    max_connections: u32,
    sweep_interval_secs: u64,
    run_once: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(&config).await?;
    let ledger_service = build_ledger_service(pool);

    info!(
        sweep_interval_secs = config.sweep_interval_secs,
        run_once = config.run_once,
        "atlas-worker started"
    );

    if config.run_once {
        let expired = ledger_service.expire_lapsed_assignments(Utc::now()).await?;
        info!(expired, "expiry sweep finished");
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(config.sweep_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match ledger_service.expire_lapsed_assignments(Utc::now()).await {
                    Ok(expired) => {
                        if expired == 0 {
                            debug!("no lapsed assignments");
                        }
                    }
                    Err(error) => warn!(error = %error, "expiry sweep failed"),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    warn!(error = %error, "failed to listen for shutdown signal");
                }
                info!("atlas-worker stopping");
                return Ok(());
            }
        }
    }
}

fn build_ledger_service(pool: PgPool) -> LedgerService {
    let repository = Arc::new(PostgresAccessRepository::new(pool.clone()));
    let directory = Arc::new(PostgresUserDirectory::new(pool));

    LedgerService::new(
        repository.clone(),
        repository.clone(),
        repository,
        directory,
    )
}

async fn connect_pool(config: &WorkerConfig) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let max_connections = parse_env_u32("DATABASE_MAX_CONNECTIONS", 2)?;
        let sweep_interval_secs = parse_env_u64("EXPIRY_SWEEP_INTERVAL_SECS", 60)?;
        let run_once = env::args().nth(1).as_deref() == Some("once");

        if max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        if sweep_interval_secs == 0 {
            return Err(AppError::Validation(
                "EXPIRY_SWEEP_INTERVAL_SECS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            max_connections,
            sweep_interval_secs,
            run_once,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
