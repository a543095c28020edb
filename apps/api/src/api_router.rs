mod cors;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use gatehouse_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

use self::cors::build_cors_layer;

/// Builds the HTTP surface. Every route passes through the authorization gate.
pub fn build_router(app_state: AppState) -> Result<Router, AppError> {
    let cors_layer = build_cors_layer(app_state.frontend_url.as_str())?;

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/api/auth/login", post(handlers::auth::login_handler))
        .route("/api/auth/logout", post(handlers::auth::logout_handler))
        .route("/api/auth/me", get(handlers::auth::me_handler))
        .route(
            "/api/audit/logs",
            get(handlers::audit::list_audit_logs_handler),
        )
        .route("/api/audit/stats", get(handlers::audit::audit_stats_handler))
        .route(
            "/api/security/roles",
            get(handlers::security::list_roles_handler)
                .post(handlers::security::create_role_handler),
        )
        .route(
            "/api/security/roles/{role_id}",
            put(handlers::security::update_role_handler)
                .delete(handlers::security::delete_role_handler),
        )
        .route(
            "/api/security/roles/{role_id}/permissions",
            post(handlers::security::grant_permission_handler),
        )
        .route(
            "/api/security/roles/{role_id}/permissions/{permission}",
            delete(handlers::security::revoke_permission_handler),
        )
        .route(
            "/api/security/subjects/{subject_id}/roles/{role_id}",
            put(handlers::security::assign_role_handler)
                .delete(handlers::security::unassign_role_handler),
        )
        .route(
            "/api/security/subjects/{subject_id}/sessions",
            delete(handlers::security::revoke_sessions_handler),
        )
        .layer(from_fn_with_state(
            app_state.clone(),
            middleware::authorize_request,
        ))
        .layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_same_origin_for_mutations,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state))
}

#[cfg(test)]
mod tests;
