use super::*;

pub async fn list_roles_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .access_admin_service
        .list_roles()
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    OriginalUri(uri): OriginalUri,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    require_permission(&state, &principal, &context, uri.path(), ROLE_MANAGE).await?;

    let permissions = payload
        .permissions
        .iter()
        .map(|value| parse_permission(value.as_str()))
        .collect::<ApiResult<Vec<_>>>()?;

    let role = state
        .access_admin_service
        .create_role(
            principal.subject_id(),
            gatehouse_application::CreateRoleInput {
                name: payload.name,
                description: payload.description,
                permissions,
            },
            &context,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    OriginalUri(uri): OriginalUri,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    require_permission(&state, &principal, &context, uri.path(), ROLE_MANAGE).await?;

    let role = state
        .access_admin_service
        .update_role(
            principal.subject_id(),
            role_id,
            gatehouse_application::UpdateRoleInput {
                name: payload.name,
                description: payload.description,
            },
            &context,
        )
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn delete_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    OriginalUri(uri): OriginalUri,
    Path(role_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state, &principal, &context, uri.path(), ROLE_MANAGE).await?;

    state
        .access_admin_service
        .delete_role(principal.subject_id(), role_id, &context)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn grant_permission_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    OriginalUri(uri): OriginalUri,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<GrantPermissionRequest>,
) -> ApiResult<Json<MutationResponse>> {
    require_permission(&state, &principal, &context, uri.path(), ROLE_MANAGE).await?;

    let changed = state
        .access_admin_service
        .grant_permission(
            principal.subject_id(),
            role_id,
            parse_permission(payload.permission.as_str())?,
            &context,
        )
        .await?;

    Ok(Json(MutationResponse { changed }))
}

pub async fn revoke_permission_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(context): Extension<RequestContext>,
    OriginalUri(uri): OriginalUri,
    Path((role_id, permission)): Path<(Uuid, String)>,
) -> ApiResult<Json<MutationResponse>> {
    require_permission(&state, &principal, &context, uri.path(), ROLE_MANAGE).await?;

    let changed = state
        .access_admin_service
        .revoke_permission(
            principal.subject_id(),
            role_id,
            parse_permission(permission.as_str())?,
            &context,
        )
        .await?;

    Ok(Json(MutationResponse { changed }))
}
