use super::*;
use crate::dto::{
    BulkOutcomeResponse, BulkPermissionsRequest, GrantPermissionRequest, GrantResponse,
};

pub async fn list_role_permissions_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<Json<Vec<GrantResponse>>> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    let grants = state
        .ledger_service
        .list_role_grants(RoleId::from_uuid(role_id))
        .await?
        .into_iter()
        .map(GrantResponse::from)
        .collect();

    Ok(Json(grants))
}

pub async fn grant_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<GrantPermissionRequest>,
) -> ApiResult<(StatusCode, Json<GrantResponse>)> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    let permission_id =
        parse_uuid("permission", payload.permission_id.as_str()).map(PermissionId::from_uuid)?;
    let grant = state
        .ledger_service
        .grant_permission(RoleId::from_uuid(role_id), permission_id, actor.user_id())
        .await?;

    Ok((StatusCode::CREATED, Json(GrantResponse::from(grant))))
}

pub async fn revoke_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path((role_id, permission_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    state
        .ledger_service
        .revoke_permission(
            RoleId::from_uuid(role_id),
            PermissionId::from_uuid(permission_id),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_grant_permissions_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<BulkPermissionsRequest>,
) -> ApiResult<Json<BulkOutcomeResponse>> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    let permission_ids = parse_permission_ids(&payload.permission_ids)?;
    let outcome = state
        .ledger_service
        .bulk_assign_permissions(RoleId::from_uuid(role_id), &permission_ids, actor.user_id())
        .await?;

    Ok(Json(BulkOutcomeResponse::from(outcome)))
}

pub async fn bulk_revoke_permissions_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<BulkPermissionsRequest>,
) -> ApiResult<Json<BulkOutcomeResponse>> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    let permission_ids = parse_permission_ids(&payload.permission_ids)?;
    let outcome = state
        .ledger_service
        .bulk_revoke_permissions(RoleId::from_uuid(role_id), &permission_ids)
        .await?;

    Ok(Json(BulkOutcomeResponse::from(outcome)))
}
