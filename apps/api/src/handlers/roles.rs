use atlas_application::CreateRoleInput;
use atlas_domain::RolePatch;

use super::*;
use crate::dto::{CreateRoleRequest, RoleResponse, UpdateRoleRequest};

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    let roles = state
        .registry_service
        .list_roles()
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn get_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<Json<RoleResponse>> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    let role = state
        .registry_service
        .get_role(RoleId::from_uuid(role_id))
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    let role = state
        .registry_service
        .create_role(CreateRoleInput {
            name: payload.name,
            display_name: payload.display_name,
            description: payload.description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    let role = state
        .registry_service
        .update_role(
            RoleId::from_uuid(role_id),
            RolePatch {
                display_name: payload.display_name,
                description: payload.description,
            },
        )
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn deactivate_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<Json<RoleResponse>> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    let role = state
        .registry_service
        .deactivate_role(RoleId::from_uuid(role_id))
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn activate_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<Json<RoleResponse>> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    let role = state
        .registry_service
        .activate_role(RoleId::from_uuid(role_id))
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn delete_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    state
        .registry_service
        .delete_role(RoleId::from_uuid(role_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
