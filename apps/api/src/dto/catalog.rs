use atlas_domain::{Permission, Role};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::timestamp;

/// Incoming payload for role creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/create-role-request.ts"
)]
pub struct CreateRoleRequest {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
}

/// Incoming payload for role updates. The machine name is immutable.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/update-role-request.ts"
)]
pub struct UpdateRoleRequest {
    pub display_name: Option<String>,
    pub description: Option<String>,
}

/// API representation of a role.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/role-response.ts"
)]
pub struct RoleResponse {
    pub role_id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub state: String,
    pub is_system: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Role> for RoleResponse {
    fn from(value: Role) -> Self {
        Self {
            role_id: value.id().to_string(),
            name: value.name().as_str().to_owned(),
            display_name: value.display_name().as_str().to_owned(),
            description: value.description().to_owned(),
            state: value.state().as_str().to_owned(),
            is_system: value.is_system(),
            created_at: timestamp(value.created_at()),
            updated_at: timestamp(value.updated_at()),
        }
    }
}

/// Incoming payload for permission creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/create-permission-request.ts"
)]
pub struct CreatePermissionRequest {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub resource: String,
    pub action: String,
}

/// Incoming payload for permission updates. The machine name is immutable.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/update-permission-request.ts"
)]
pub struct UpdatePermissionRequest {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub resource: Option<String>,
    pub action: Option<String>,
}

/// API representation of a permission.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/permission-response.ts"
)]
pub struct PermissionResponse {
    pub permission_id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub resource: String,
    pub action: String,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Permission> for PermissionResponse {
    fn from(value: Permission) -> Self {
        Self {
            permission_id: value.id().to_string(),
            name: value.name().as_str().to_owned(),
            display_name: value.display_name().as_str().to_owned(),
            description: value.description().to_owned(),
            resource: value.resource().as_str().to_owned(),
            action: value.action().as_str().to_owned(),
            state: value.state().as_str().to_owned(),
            created_at: timestamp(value.created_at()),
            updated_at: timestamp(value.updated_at()),
        }
    }
}
