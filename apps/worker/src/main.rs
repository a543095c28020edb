//! Gatehouse background worker: expired session sweep.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gatehouse_application::SessionRepository;
use gatehouse_core::{AppError, AppResult};
use gatehouse_infrastructure::PostgresSessionRepository;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    sweep_interval_seconds: u64,
    run_once: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;
    let sessions: Arc<dyn SessionRepository> = Arc::new(PostgresSessionRepository::new(pool));

    info!(
        sweep_interval_seconds = config.sweep_interval_seconds,
        run_once = config.run_once,
        "gatehouse-worker started"
    );

    loop {
        match sweep_expired_sessions(sessions.as_ref()).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "expired sessions swept"),
            Err(error) => warn!(error = %error, "session sweep failed"),
        }

        if config.run_once {
            return Ok(());
        }

        tokio::time::sleep(Duration::from_secs(config.sweep_interval_seconds)).await;
    }
}

/// Deletes every session record whose expiry has passed.
async fn sweep_expired_sessions(sessions: &dyn SessionRepository) -> AppResult<u64> {
    sessions.delete_expired(Utc::now()).await
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let sweep_interval_seconds = parse_env_u64("SESSION_SWEEP_INTERVAL_SECONDS", 300)?;
        if sweep_interval_seconds == 0 {
            return Err(AppError::Validation(
                "SESSION_SWEEP_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            sweep_interval_seconds,
            run_once: env::args().nth(1).as_deref() == Some("once"),
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

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
