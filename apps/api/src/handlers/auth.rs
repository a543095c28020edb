use axum::Json;
use axum::extract::{Extension, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use gatehouse_application::{Principal, RequestContext};
use gatehouse_core::{AppError, AuthenticatedSubject};

use crate::dto::{AuthLoginRequest, AuthLoginResponse, PrincipalResponse};
use crate::error::ApiResult;
use crate::state::{AppState, CookieSettings};

pub async fn login_handler(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(payload): Json<AuthLoginRequest>,
) -> ApiResult<Response> {
    let signed_in = state
        .authentication_service
        .login(payload.login.as_str(), payload.password.as_str(), &context)
        .await?;

    let cookie = session_cookie(
        &state.cookie,
        signed_in.session.stamp.as_str(),
        state.cookie.max_age_seconds,
    )?;
    let mut response = Json(AuthLoginResponse::from(&signed_in)).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);

    Ok(response)
}

pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    Extension(context): Extension<RequestContext>,
) -> ApiResult<Response> {
    state
        .authentication_service
        .logout(&subject, &context)
        .await?;

    let cookie = session_cookie(&state.cookie, "", 0)?;
    let mut response = StatusCode::NO_CONTENT.into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);

    Ok(response)
}

pub async fn me_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<PrincipalResponse>> {
    let identity = state
        .authentication_service
        .current_identity(principal.subject_id())
        .await?;
    let permissions = state.gate.effective_permissions(&principal).await?;

    Ok(Json(PrincipalResponse::new(identity, &permissions)))
}

fn session_cookie(
    settings: &CookieSettings,
    value: &str,
    max_age_seconds: i64,
) -> ApiResult<HeaderValue> {
    let mut cookie = format!(
        "{}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}",
        settings.name
    );
    if settings.secure {
        cookie.push_str("; Secure");
    }

    HeaderValue::from_str(cookie.as_str()).map_err(|error| {
        AppError::Internal(format!("failed to build session cookie: {error}")).into()
    })
}
