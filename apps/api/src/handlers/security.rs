use axum::Json;
use axum::extract::{Extension, OriginalUri, Path, State};
use axum::http::StatusCode;
use tracing::info;
use uuid::Uuid;

use gatehouse_application::{DenyReason, Principal, RequestContext};
use gatehouse_core::{AppError, SubjectId};
use gatehouse_domain::{AccessDeniedPayload, PermissionId};

use crate::dto::{
    CreateRoleRequest, GrantPermissionRequest, MutationResponse, RoleResponse,
    SessionRevocationResponse, UpdateRoleRequest,
};
use crate::error::ApiResult;
use crate::middleware::publish_access_denied;
use crate::state::AppState;

mod assignments;
mod roles;

pub use assignments::{assign_role_handler, revoke_sessions_handler, unassign_role_handler};
pub use roles::{
    create_role_handler, delete_role_handler, grant_permission_handler, list_roles_handler,
    revoke_permission_handler, update_role_handler,
};

/// Permission every role or assignment mutation needs on top of the route rule.
const ROLE_MANAGE: &str = "role:manage";

/// Checks a handler-level permission; denials are audited like gate denials.
async fn require_permission(
    state: &AppState,
    principal: &Principal,
    context: &RequestContext,
    path: &str,
    permission: &str,
) -> ApiResult<()> {
    let required = permission.parse::<PermissionId>()?;
    let granted = state.gate.effective_permissions(principal).await?;
    if granted.contains(&required) {
        return Ok(());
    }

    let payload = AccessDeniedPayload {
        subject_id: Some(principal.subject_id()),
        path: path.to_owned(),
        reason: DenyReason::InsufficientPermissions.as_str().to_owned(),
        missing_permissions: vec![required.clone()],
    };
    publish_access_denied(state, payload, context).await;
    info!(
        path,
        subject_id = %principal.subject_id(),
        permission = %required,
        "mutation denied"
    );

    Err(AppError::Forbidden(format!("missing permission '{required}'")).into())
}

fn parse_permission(value: &str) -> ApiResult<PermissionId> {
    Ok(value.trim().parse::<PermissionId>()?)
}
