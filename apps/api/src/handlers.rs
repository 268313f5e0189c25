use std::str::FromStr;

use atlas_core::{ActorIdentity, AppError, UserId};
use atlas_domain::{PermissionId, ResourceType, RoleId};
use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

mod assignments;
mod authorization;
mod grants;
mod health;
mod permissions;
mod roles;

pub use assignments::{
    assign_role_handler, bulk_assign_users_handler, bulk_remove_users_handler,
    list_user_roles_handler, remove_role_handler,
};
pub use authorization::{check_access_handler, my_access_handler};
pub use grants::{
    bulk_grant_permissions_handler, bulk_revoke_permissions_handler, grant_permission_handler,
    list_role_permissions_handler, revoke_permission_handler,
};
pub use health::health_handler;
pub use permissions::{
    activate_permission_handler, create_permission_handler, deactivate_permission_handler,
    get_permission_handler, list_permissions_handler, update_permission_handler,
};
pub use roles::{
    activate_role_handler, create_role_handler, deactivate_role_handler, delete_role_handler,
    get_role_handler, list_roles_handler, update_role_handler,
};

async fn require_manage(
    state: &AppState,
    actor: &ActorIdentity,
    resource_type: ResourceType,
) -> ApiResult<()> {
    state
        .authorization_service
        .require_manage(actor.user_id(), resource_type)
        .await?;
    Ok(())
}

fn parse_uuid(kind: &str, value: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value.trim())
        .map_err(|error| AppError::Validation(format!("invalid {kind} id '{value}': {error}")))
}

fn parse_role_id(value: &str) -> Result<RoleId, AppError> {
    parse_uuid("role", value).map(RoleId::from_uuid)
}

fn parse_permission_ids(values: &[String]) -> Result<Vec<PermissionId>, AppError> {
    values
        .iter()
        .map(|value| parse_uuid("permission", value).map(PermissionId::from_uuid))
        .collect()
}

fn parse_user_ids(values: &[String]) -> Result<Vec<UserId>, AppError> {
    values.iter().map(|value| UserId::from_str(value)).collect()
}

#[cfg(test)]
mod tests;
