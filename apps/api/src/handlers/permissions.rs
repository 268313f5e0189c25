use atlas_application::CreatePermissionInput;
use atlas_domain::{Action, PermissionPatch};

use super::*;
use crate::dto::{CreatePermissionRequest, PermissionResponse, UpdatePermissionRequest};

pub async fn list_permissions_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
) -> ApiResult<Json<Vec<PermissionResponse>>> {
    require_manage(&state, &actor, ResourceType::Permission).await?;

    let permissions = state
        .registry_service
        .list_permissions()
        .await?
        .into_iter()
        .map(PermissionResponse::from)
        .collect();

    Ok(Json(permissions))
}

pub async fn get_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<Json<PermissionResponse>> {
    require_manage(&state, &actor, ResourceType::Permission).await?;

    let permission = state
        .registry_service
        .get_permission(PermissionId::from_uuid(permission_id))
        .await?;

    Ok(Json(PermissionResponse::from(permission)))
}

pub async fn create_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Json(payload): Json<CreatePermissionRequest>,
) -> ApiResult<(StatusCode, Json<PermissionResponse>)> {
    require_manage(&state, &actor, ResourceType::Permission).await?;

    let permission = state
        .registry_service
        .create_permission(CreatePermissionInput {
            name: payload.name,
            display_name: payload.display_name,
            description: payload.description,
            resource: payload.resource.parse::<ResourceType>()?,
            action: payload.action.parse::<Action>()?,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(PermissionResponse::from(permission))))
}

pub async fn update_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(permission_id): Path<Uuid>,
    Json(payload): Json<UpdatePermissionRequest>,
) -> ApiResult<Json<PermissionResponse>> {
    require_manage(&state, &actor, ResourceType::Permission).await?;

    let patch = PermissionPatch {
        display_name: payload.display_name,
        description: payload.description,
        resource: payload
            .resource
            .as_deref()
            .map(str::parse::<ResourceType>)
            .transpose()?,
        action: payload
            .action
            .as_deref()
            .map(str::parse::<Action>)
            .transpose()?,
    };

    let permission = state
        .registry_service
        .update_permission(PermissionId::from_uuid(permission_id), patch)
        .await?;

    Ok(Json(PermissionResponse::from(permission)))
}

pub async fn deactivate_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<Json<PermissionResponse>> {
    require_manage(&state, &actor, ResourceType::Permission).await?;

    let permission = state
        .registry_service
        .deactivate_permission(PermissionId::from_uuid(permission_id))
        .await?;

    Ok(Json(PermissionResponse::from(permission)))
}

pub async fn activate_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<Json<PermissionResponse>> {
    require_manage(&state, &actor, ResourceType::Permission).await?;

    let permission = state
        .registry_service
        .activate_permission(PermissionId::from_uuid(permission_id))
        .await?;

    Ok(Json(PermissionResponse::from(permission)))
}
