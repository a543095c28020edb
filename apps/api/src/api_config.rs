use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use gatehouse_core::AppError;
use gatehouse_infrastructure::MIN_SECRET_LENGTH;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub session_token_secret: String,
    pub session_token_issuer: String,
    pub session_max_age: chrono::Duration,
    pub session_lookup_timeout: Duration,
    pub strict_session_validation: bool,
    pub expose_missing_permissions: bool,
    pub permission_cache_ttl: Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
        Url::parse(frontend_url.as_str())
            .map_err(|error| AppError::Validation(format!("invalid FRONTEND_URL: {error}")))?;

        let session_token_secret = required_env("SESSION_TOKEN_SECRET")?;
        if session_token_secret.len() < MIN_SECRET_LENGTH {
            return Err(AppError::Validation(format!(
                "SESSION_TOKEN_SECRET must be at least {MIN_SECRET_LENGTH} characters"
            )));
        }

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let session_token_issuer =
            env::var("SESSION_TOKEN_ISSUER").unwrap_or_else(|_| "gatehouse".to_owned());

        let max_age_seconds = parsed_env::<i64>("SESSION_MAX_AGE_SECONDS", 86_400)?;
        if max_age_seconds <= 0 {
            return Err(AppError::Validation(
                "SESSION_MAX_AGE_SECONDS must be positive".to_owned(),
            ));
        }

        let lookup_timeout_ms = parsed_env::<u64>("SESSION_LOOKUP_TIMEOUT_MS", 1_500)?;
        if lookup_timeout_ms == 0 {
            return Err(AppError::Validation(
                "SESSION_LOOKUP_TIMEOUT_MS must be positive".to_owned(),
            ));
        }

        let cookie_name =
            env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "gatehouse_session".to_owned());
        if cookie_name.trim().is_empty() {
            return Err(AppError::Validation(
                "SESSION_COOKIE_NAME must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            migrate_only,
            database_url,
            frontend_url,
            api_host,
            api_port,
            session_token_secret,
            session_token_issuer,
            session_max_age: chrono::Duration::seconds(max_age_seconds),
            session_lookup_timeout: Duration::from_millis(lookup_timeout_ms),
            strict_session_validation: flag_env("STRICT_SESSION_VALIDATION"),
            expose_missing_permissions: flag_env("EXPOSE_MISSING_PERMISSIONS"),
            permission_cache_ttl: Duration::from_secs(parsed_env::<u64>(
                "PERMISSION_CACHE_TTL_SECONDS",
                30,
            )?),
            cookie_name,
            cookie_secure: flag_env("SESSION_COOKIE_SECURE"),
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    let value = env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn flag_env(name: &str) -> bool {
    env::var(name)
        .unwrap_or_else(|_| "false".to_owned())
        .eq_ignore_ascii_case("true")
}

fn parsed_env<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        _ => Ok(default),
    }
}
