use atlas_domain::{RolePermissionGrant, UserRoleAssignment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::timestamp;

/// Incoming payload for granting one permission to a role.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/grant-permission-request.ts"
)]
pub struct GrantPermissionRequest {
    pub permission_id: String,
}

/// Incoming payload for bulk grant and revoke.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/bulk-permissions-request.ts"
)]
pub struct BulkPermissionsRequest {
    pub permission_ids: Vec<String>,
}

/// API representation of a role-permission grant.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/grant-response.ts"
)]
pub struct GrantResponse {
    pub grant_id: String,
    pub role_id: String,
    pub permission_id: String,
    pub granted_by: String,
    pub granted_at: String,
    pub state: String,
    pub revoked_at: Option<String>,
}

impl From<RolePermissionGrant> for GrantResponse {
    fn from(value: RolePermissionGrant) -> Self {
        Self {
            grant_id: value.id().to_string(),
            role_id: value.role_id().to_string(),
            permission_id: value.permission_id().to_string(),
            granted_by: value.granted_by().to_string(),
            granted_at: timestamp(value.granted_at()),
            state: value.state().as_str().to_owned(),
            revoked_at: value.revoked_at().map(timestamp),
        }
    }
}

/// Incoming payload for assigning a role to a user.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/assign-role-request.ts"
)]
pub struct AssignRoleRequest {
    pub role_id: String,
    #[ts(type = "string | null")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Incoming payload for bulk role assignment and removal.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/bulk-users-request.ts"
)]
pub struct BulkUsersRequest {
    pub user_ids: Vec<String>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// API representation of a user-role assignment.
///
/// `state` is the stored state and `effective_state` the state at response
/// time, which differs once an expiry has passed but the sweeper has not run.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/role-assignment-response.ts"
)]
pub struct RoleAssignmentResponse {
    pub assignment_id: String,
    pub user_id: String,
    pub role_id: String,
    pub assigned_by: String,
    pub assigned_at: String,
    pub expires_at: Option<String>,
    pub state: String,
    pub effective_state: String,
    pub revoked_at: Option<String>,
}

impl RoleAssignmentResponse {
    pub fn from_assignment(value: &UserRoleAssignment, as_of: DateTime<Utc>) -> Self {
        Self {
            assignment_id: value.id().to_string(),
            user_id: value.user_id().to_string(),
            role_id: value.role_id().to_string(),
            assigned_by: value.assigned_by().to_string(),
            assigned_at: timestamp(value.assigned_at()),
            expires_at: value.expires_at().map(timestamp),
            state: value.stored_state().as_str().to_owned(),
            effective_state: value.effective_state(as_of).as_str().to_owned(),
            revoked_at: value.revoked_at().map(timestamp),
        }
    }
}
