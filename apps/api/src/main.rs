//! Gatehouse API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod dto;
mod error;
mod handlers;
mod middleware;
mod route_rules;
mod state;

use std::sync::Arc;

use gatehouse_application::{
    AccessAdminService, AuditRecorder, AuthenticationService, AuthorizationGate, EventBus,
    SessionConfig, SessionService, TracingEventListener,
};
use gatehouse_core::AppError;
use gatehouse_infrastructure::{
    Argon2CredentialHasher, CachedPermissionResolver, JwtSessionTokenCodec, MIGRATOR,
    PermissionCacheInvalidator, PostgresAccessAdminRepository, PostgresAuditLogRepository,
    PostgresIdentityRepository, PostgresPermissionResolver, PostgresSessionRepository,
};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::api_config::{ApiConfig, init_tracing};
use crate::route_rules::{build_gate_policy, build_route_rules};
use crate::state::{AppState, CookieSettings};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let route_rules = Arc::new(build_route_rules()?);
    let gate_policy = build_gate_policy(&config)?;
    info!(
        rules = route_rules.len(),
        strict_globally = gate_policy.strict_globally,
        "route rules loaded"
    );

    let event_bus = EventBus::new();
    let audit_recorder =
        AuditRecorder::new(Arc::new(PostgresAuditLogRepository::new(pool.clone())));
    audit_recorder.register(&event_bus);
    event_bus.subscribe_all(Arc::new(TracingEventListener));

    let permission_resolver = Arc::new(CachedPermissionResolver::new(
        Arc::new(PostgresPermissionResolver::new(pool.clone())),
        config.permission_cache_ttl,
    ));
    PermissionCacheInvalidator::new(permission_resolver.clone()).register(&event_bus);

    let session_service = SessionService::new(
        Arc::new(PostgresSessionRepository::new(pool.clone())),
        Arc::new(JwtSessionTokenCodec::new(
            config.session_token_secret.as_str(),
            config.session_token_issuer.clone(),
        )?),
        SessionConfig {
            max_age: config.session_max_age,
            lookup_timeout: config.session_lookup_timeout,
        },
    );

    let gate = AuthorizationGate::new(
        session_service.clone(),
        route_rules,
        permission_resolver,
        gate_policy,
    );
    let authentication_service = AuthenticationService::new(
        Arc::new(PostgresIdentityRepository::new(pool.clone())),
        Arc::new(Argon2CredentialHasher::new()),
        session_service.clone(),
        event_bus.clone(),
    );
    let access_admin_service = AccessAdminService::new(
        Arc::new(PostgresAccessAdminRepository::new(pool)),
        session_service,
        event_bus.clone(),
    );

    let app = api_router::build_router(AppState {
        gate,
        authentication_service,
        access_admin_service,
        audit_recorder,
        event_bus,
        cookie: CookieSettings {
            name: config.cookie_name.clone(),
            secure: config.cookie_secure,
            max_age_seconds: config.session_max_age.num_seconds(),
        },
        frontend_url: config.frontend_url.clone(),
    })?;

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind {address}: {error}")))?;

    info!(%address, "gatehouse api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("server error: {error}")))
}
