mod authorization;
mod catalog;
mod common;
mod ledger;

pub use authorization::{
    AccessCheckRequest, AccessDecisionResponse, AccessSnapshotResponse, SnapshotRoleResponse,
};
pub use catalog::{
    CreatePermissionRequest, CreateRoleRequest, PermissionResponse, RoleResponse,
    UpdatePermissionRequest, UpdateRoleRequest,
};
pub use common::{BulkOutcomeResponse, HealthResponse};
pub use ledger::{
    AssignRoleRequest, BulkPermissionsRequest, BulkUsersRequest, GrantPermissionRequest,
    GrantResponse, RoleAssignmentResponse,
};

/// Formats timestamps the way every response carries them.
fn timestamp(value: chrono::DateTime<chrono::Utc>) -> String {
    value.to_rfc3339()
}
