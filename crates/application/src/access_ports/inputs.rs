use atlas_core::UserId;
use atlas_domain::{Action, ResourceType, RoleId};
use chrono::{DateTime, Utc};

/// Input payload for creating roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique machine name.
    pub name: String,
    /// Human-friendly name.
    pub display_name: String,
    /// Free-form description.
    pub description: String,
}

/// Input payload for creating permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePermissionInput {
    /// Unique machine name.
    pub name: String,
    /// Human-friendly name.
    pub display_name: String,
    /// Free-form description.
    pub description: String,
    /// Resource tag.
    pub resource: ResourceType,
    /// Action tag.
    pub action: Action,
}

/// Input payload for assigning one role to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignRoleInput {
    /// User receiving the role.
    pub user_id: UserId,
    /// Role being assigned.
    pub role_id: RoleId,
    /// Actor performing the assignment.
    pub assigned_by: UserId,
    /// Optional expiry; must lie in the future.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Input payload for assigning one role to many users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkAssignRolesInput {
    /// Users receiving the role.
    pub user_ids: Vec<UserId>,
    /// Role being assigned.
    pub role_id: RoleId,
    /// Actor performing the assignment.
    pub assigned_by: UserId,
    /// Optional expiry shared by every new assignment.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of a bulk ledger mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Pairs whose state changed.
    pub applied: usize,
    /// Pairs already in the requested state.
    pub skipped: usize,
}
