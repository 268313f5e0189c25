use async_trait::async_trait;
use chrono::{DateTime, Utc};

use atlas_core::{AppResult, UserId};
use atlas_domain::{
    AssignedRole, Permission, PermissionId, Role, RoleId, RolePermissionGrant, UserRoleAssignment,
};

use super::inputs::BulkOutcome;

/// Repository port for the role catalog.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Persists a new role.
    ///
    /// Fails with `DuplicateName` when a role that is not deleted already
    /// uses the name.
    async fn insert_role(&self, role: Role) -> AppResult<()>;

    /// Persists mutable fields (display name, description, state) of an
    /// existing role.
    async fn save_role(&self, role: &Role) -> AppResult<()>;

    /// Finds a role by identifier, including deleted roles.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Finds a role that is not deleted by machine name.
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>>;

    /// Lists roles that are not deleted, ordered by name.
    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    /// Marks a role deleted and deactivates every grant and assignment that
    /// references it, in one atomic step.
    ///
    /// Fails with `HasActiveAssignments` when an assignment of the role is
    /// still effective at `as_of`; nothing changes in that case.
    async fn delete_role(&self, role_id: RoleId, as_of: DateTime<Utc>) -> AppResult<()>;
}

/// Repository port for the permission catalog.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Persists a new permission; fails with `DuplicateName` on name reuse.
    async fn insert_permission(&self, permission: Permission) -> AppResult<()>;

    /// Persists mutable fields of an existing permission.
    async fn save_permission(&self, permission: &Permission) -> AppResult<()>;

    /// Finds a permission by identifier.
    async fn find_permission(&self, permission_id: PermissionId)
    -> AppResult<Option<Permission>>;

    /// Finds a permission by machine name.
    async fn find_permission_by_name(&self, name: &str) -> AppResult<Option<Permission>>;

    /// Finds every permission among `permission_ids` that exists.
    async fn find_permissions(&self, permission_ids: &[PermissionId])
    -> AppResult<Vec<Permission>>;

    /// Lists permissions ordered by name.
    async fn list_permissions(&self) -> AppResult<Vec<Permission>>;
}

/// Repository port for the user-role and role-permission ledgers.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Persists a new assignment.
    ///
    /// Stored-active assignments of the same pair that lapsed before `as_of`
    /// are marked expired first. Fails with `AlreadyAssigned` when an
    /// assignment of the pair is still effective.
    async fn insert_assignment(
        &self,
        assignment: UserRoleAssignment,
        as_of: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Soft-revokes the effective assignment of a pair.
    ///
    /// Fails with `NotFound` when the pair has no effective assignment.
    async fn revoke_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
        as_of: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Persists many assignments in one transaction, skipping pairs that
    /// already hold an effective assignment.
    async fn insert_assignments(
        &self,
        assignments: Vec<UserRoleAssignment>,
        as_of: DateTime<Utc>,
    ) -> AppResult<BulkOutcome>;

    /// Soft-revokes the effective assignments of `role_id` for every user in
    /// one transaction, skipping users without one.
    async fn revoke_assignments(
        &self,
        role_id: RoleId,
        user_ids: &[UserId],
        as_of: DateTime<Utc>,
    ) -> AppResult<BulkOutcome>;

    /// Lists every assignment ever recorded for a user, newest first.
    async fn list_assignments_for_user(&self, user_id: UserId)
    -> AppResult<Vec<UserRoleAssignment>>;

    /// Persists the expired state of every assignment that lapsed before
    /// `as_of` and returns how many changed.
    async fn expire_lapsed_assignments(&self, as_of: DateTime<Utc>) -> AppResult<u64>;

    /// Persists a new grant; fails with `AlreadyGranted` when the pair already
    /// has an active grant.
    async fn insert_grant(&self, grant: RolePermissionGrant) -> AppResult<()>;

    /// Soft-revokes the active grant of a pair; fails with `NotFound` when
    /// there is none.
    async fn revoke_grant(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Persists many grants in one transaction, skipping active pairs.
    async fn insert_grants(&self, grants: Vec<RolePermissionGrant>) -> AppResult<BulkOutcome>;

    /// Soft-revokes the active grants of `role_id` for every permission in
    /// one transaction, skipping pairs without one.
    async fn revoke_grants(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
        at: DateTime<Utc>,
    ) -> AppResult<BulkOutcome>;

    /// Lists every grant ever recorded for a role, newest first.
    async fn list_grants_for_role(&self, role_id: RoleId) -> AppResult<Vec<RolePermissionGrant>>;

    /// Reads, in one batch, the user's stored-active assignments with their
    /// roles and the roles' active grants with their permissions.
    ///
    /// The result may include rows that are no longer effective at `as_of`;
    /// snapshot assembly filters them.
    async fn load_access(&self, user_id: UserId, as_of: DateTime<Utc>)
    -> AppResult<Vec<AssignedRole>>;
}
