use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use gatehouse_application::{
    DenyReason, GateDecision, GateDenial, GateRequest, RequestContext,
};
use gatehouse_core::AppError;
use gatehouse_domain::{AccessDeniedPayload, EventArea, EventKind, EventPayload};
use tracing::{info, warn};

use crate::dto::AccessDeniedResponse;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Runs the authorization gate for every request.
///
/// Allowed requests carry the `RequestContext` and, on protected routes,
/// the `Principal` and `AuthenticatedSubject` as request extensions.
pub async fn authorize_request(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = extract_request_context(request.headers());
    let stamp = session_stamp(request.headers(), state.cookie.name.as_str());
    let path = request.uri().path().to_owned();
    let query = request.uri().query().map(ToOwned::to_owned);

    let decision = state
        .gate
        .evaluate(GateRequest {
            path: path.as_str(),
            query: query.as_deref(),
            stamp: stamp.as_deref(),
        })
        .await;

    match decision {
        Ok(GateDecision::Allow(principal)) => {
            if let Some(principal) = principal {
                request.extensions_mut().insert(principal.subject.clone());
                request.extensions_mut().insert(principal);
            }
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Ok(GateDecision::Deny(denial)) => {
            if denial.reason == DenyReason::InsufficientPermissions {
                let payload = AccessDeniedPayload {
                    subject_id: denial.subject_id,
                    path: path.clone(),
                    reason: denial.reason.as_str().to_owned(),
                    missing_permissions: denial.missing_permissions.clone(),
                };
                publish_access_denied(&state, payload, &context).await;
            }
            info!(
                path = %path,
                reason = denial.reason.as_str(),
                correlation_id = %context.correlation_id,
                "request denied"
            );
            denial_response(&denial, wants_json(request.headers()))
        }
        Err(error) => {
            warn!(path = %path, error = %error, "authorization gate failed");
            ApiError::from(error).into_response()
        }
    }
}

/// Rejects cookie-authenticated mutations coming from another origin.
pub async fn require_same_origin_for_mutations(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if is_state_changing_method(request.method()) && bearer_token(request.headers()).is_none() {
        let headers = request.headers();

        if let Some(fetch_site) = headers.get("sec-fetch-site")
            && fetch_site == HeaderValue::from_static("cross-site")
        {
            return Err(AppError::Forbidden("cross-site request blocked".to_owned()).into());
        }

        let origin = headers
            .get(header::ORIGIN)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let referer = headers
            .get(header::REFERER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        let allowed_origin = state.frontend_url.trim_end_matches('/');
        let origin_is_allowed = origin == allowed_origin;
        let referer_is_allowed = referer.starts_with(allowed_origin);

        if !origin_is_allowed && !referer_is_allowed {
            return Err(AppError::Forbidden("origin validation failed".to_owned()).into());
        }
    }

    Ok(next.run(request).await)
}

/// Publishes a permission denial so the audit recorder persists it.
pub(crate) async fn publish_access_denied(
    state: &AppState,
    payload: AccessDeniedPayload,
    context: &RequestContext,
) {
    let metadata = context.event_metadata(EventArea::Api, payload.subject_id);
    let path = payload.path.clone();
    let dispatched = state
        .event_bus
        .dispatch(
            EventKind::AccessDenied,
            EventPayload::AccessDenied(payload),
            Some(metadata),
        )
        .await;

    if let Err(error) = dispatched {
        warn!(path = %path, error = %error, "failed to publish access denial");
    }
}

fn denial_response(denial: &GateDenial, json: bool) -> Response {
    if !json {
        return Redirect::to(denial.redirect_to.as_str()).into_response();
    }

    let status = match denial.reason {
        DenyReason::Unauthenticated | DenyReason::SessionInvalidated => StatusCode::UNAUTHORIZED,
        DenyReason::SessionValidationFailed => StatusCode::SERVICE_UNAVAILABLE,
        DenyReason::InsufficientPermissions => StatusCode::FORBIDDEN,
    };

    (
        status,
        Json(AccessDeniedResponse {
            error: denial.reason.as_str().to_owned(),
            redirect_to: denial.redirect_to.clone(),
        }),
    )
        .into_response()
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Reads the stateless token from the bearer header, falling back to the session cookie.
pub(crate) fn session_stamp(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token.to_owned());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

pub(crate) fn extract_request_context(headers: &HeaderMap) -> RequestContext {
    let source_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    let client_descriptor = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    RequestContext::new(source_address, client_descriptor)
}

fn is_state_changing_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
