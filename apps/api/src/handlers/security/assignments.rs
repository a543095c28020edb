use super::*;

pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    OriginalUri(uri): OriginalUri,
    Path((subject_id, role_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<MutationResponse>> {
    require_permission(&state, &principal, &context, uri.path(), ROLE_MANAGE).await?;

    let changed = state
        .access_admin_service
        .assign_role(
            principal.subject_id(),
            SubjectId::from_uuid(subject_id),
            role_id,
            &context,
        )
        .await?;

    Ok(Json(MutationResponse { changed }))
}

pub async fn unassign_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    OriginalUri(uri): OriginalUri,
    Path((subject_id, role_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<MutationResponse>> {
    require_permission(&state, &principal, &context, uri.path(), ROLE_MANAGE).await?;

    let changed = state
        .access_admin_service
        .unassign_role(
            principal.subject_id(),
            SubjectId::from_uuid(subject_id),
            role_id,
            &context,
        )
        .await?;

    Ok(Json(MutationResponse { changed }))
}

/// Administrative logout; the route rule already requires `session:revoke`.
pub async fn revoke_sessions_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    Path(subject_id): Path<Uuid>,
) -> ApiResult<Json<SessionRevocationResponse>> {
    let subject_id = SubjectId::from_uuid(subject_id);
    let revoked_sessions = state
        .access_admin_service
        .revoke_subject_sessions(principal.subject_id(), subject_id, &context)
        .await?;

    Ok(Json(SessionRevocationResponse {
        subject_id: subject_id.to_string(),
        revoked_sessions,
    }))
}
