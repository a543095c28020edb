use axum::Json;
use axum::extract::{Query, State};

use crate::dto::{AuditLogPageResponse, AuditLogQuery, AuditStatsResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_audit_logs_handler(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<AuditLogPageResponse>> {
    let pagination = query.pagination();
    let page = state
        .audit_recorder
        .get_logs(&query.filter(), pagination)
        .await?;

    Ok(Json(AuditLogPageResponse::new(page, pagination)))
}

pub async fn audit_stats_handler(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<AuditStatsResponse>> {
    let stats = state.audit_recorder.get_stats(&query.filter()).await?;

    Ok(Json(AuditStatsResponse::from(stats)))
}
