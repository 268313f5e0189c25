use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use atlas_core::{AppError, AppResult, UserId};
use atlas_domain::{
    AccountStatus, PermissionId, Role, RoleId, RolePermissionGrant, UserRoleAssignment,
};

use crate::access_ports::{
    AssignRoleInput, AssignmentStore, BulkAssignRolesInput, BulkOutcome, PermissionStore,
    RoleStore, UserDirectory,
};

/// Application service for user-role assignments and role-permission grants.
#[derive(Clone)]
pub struct LedgerService {
    roles: Arc<dyn RoleStore>,
    permissions: Arc<dyn PermissionStore>,
    assignments: Arc<dyn AssignmentStore>,
    directory: Arc<dyn UserDirectory>,
}

impl LedgerService {
    /// Creates a new ledger service from store implementations.
    #[must_use]
    pub fn new(
        roles: Arc<dyn RoleStore>,
        permissions: Arc<dyn PermissionStore>,
        assignments: Arc<dyn AssignmentStore>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            roles,
            permissions,
            assignments,
            directory,
        }
    }

    /// Assigns a role to a user.
    ///
    /// Fails with `AlreadyAssigned` while an effective assignment of the pair
    /// exists. A lapsed assignment does not block a new one.
    pub async fn assign_role(&self, input: AssignRoleInput) -> AppResult<UserRoleAssignment> {
        let now = Utc::now();
        ensure_future_expiry(input.expires_at, now)?;
        self.require_role(input.role_id).await?;
        self.require_user(input.user_id).await?;

        let assignment = UserRoleAssignment::assign(
            input.user_id,
            input.role_id,
            input.assigned_by,
            now,
            input.expires_at,
        );
        self.assignments
            .insert_assignment(assignment.clone(), now)
            .await?;

        info!(
            user_id = %input.user_id,
            role_id = %input.role_id,
            assigned_by = %input.assigned_by,
            expires_at = ?input.expires_at,
            "role assigned"
        );
        Ok(assignment)
    }

    /// Soft-revokes the effective assignment of a role to a user.
    pub async fn remove_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<()> {
        self.assignments
            .revoke_assignment(user_id, role_id, Utc::now())
            .await?;

        info!(user_id = %user_id, role_id = %role_id, "role removed");
        Ok(())
    }

    /// Grants a permission to a role.
    pub async fn grant_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
        granted_by: UserId,
    ) -> AppResult<RolePermissionGrant> {
        self.require_role(role_id).await?;
        self.permissions
            .find_permission(permission_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("permission '{permission_id}' does not exist"))
            })?;

        let grant = RolePermissionGrant::grant(role_id, permission_id, granted_by, Utc::now());
        self.assignments.insert_grant(grant.clone()).await?;

        info!(
            role_id = %role_id,
            permission_id = %permission_id,
            granted_by = %granted_by,
            "permission granted"
        );
        Ok(grant)
    }

    /// Soft-revokes the active grant of a permission to a role.
    pub async fn revoke_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        self.assignments
            .revoke_grant(role_id, permission_id, Utc::now())
            .await?;

        info!(role_id = %role_id, permission_id = %permission_id, "permission revoked");
        Ok(())
    }

    /// Assigns one role to many users.
    ///
    /// Every identifier is validated before anything changes. Users already
    /// holding the role are skipped.
    pub async fn bulk_assign_roles(&self, input: BulkAssignRolesInput) -> AppResult<BulkOutcome> {
        let now = Utc::now();
        ensure_future_expiry(input.expires_at, now)?;
        self.require_role(input.role_id).await?;
        let user_ids = unique(&input.user_ids);
        self.require_users(&user_ids).await?;

        let assignments = user_ids
            .iter()
            .map(|user_id| {
                UserRoleAssignment::assign(
                    *user_id,
                    input.role_id,
                    input.assigned_by,
                    now,
                    input.expires_at,
                )
            })
            .collect();
        let outcome = self.assignments.insert_assignments(assignments, now).await?;

        info!(
            role_id = %input.role_id,
            applied = outcome.applied,
            skipped = outcome.skipped,
            "bulk role assignment finished"
        );
        Ok(outcome)
    }

    /// Removes one role from many users.
    ///
    /// Every identifier is validated before anything changes. Users without
    /// an effective assignment are skipped.
    pub async fn bulk_remove_roles(
        &self,
        role_id: RoleId,
        user_ids: &[UserId],
    ) -> AppResult<BulkOutcome> {
        self.require_role(role_id).await?;
        let user_ids = unique(user_ids);
        self.require_users(&user_ids).await?;

        let outcome = self
            .assignments
            .revoke_assignments(role_id, &user_ids, Utc::now())
            .await?;

        info!(
            role_id = %role_id,
            applied = outcome.applied,
            skipped = outcome.skipped,
            "bulk role removal finished"
        );
        Ok(outcome)
    }

    /// Grants many permissions to one role.
    ///
    /// Every identifier is validated before anything changes. Permissions
    /// already granted are skipped.
    pub async fn bulk_assign_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
        granted_by: UserId,
    ) -> AppResult<BulkOutcome> {
        self.require_role(role_id).await?;
        let permission_ids = unique(permission_ids);
        self.require_permissions(&permission_ids).await?;

        let now = Utc::now();
        let grants = permission_ids
            .iter()
            .map(|permission_id| RolePermissionGrant::grant(role_id, *permission_id, granted_by, now))
            .collect();
        let outcome = self.assignments.insert_grants(grants).await?;

        info!(
            role_id = %role_id,
            applied = outcome.applied,
            skipped = outcome.skipped,
            "bulk permission grant finished"
        );
        Ok(outcome)
    }

    /// Revokes many permissions from one role.
    ///
    /// Every identifier is validated before anything changes. Permissions
    /// without an active grant are skipped.
    pub async fn bulk_revoke_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<BulkOutcome> {
        self.require_role(role_id).await?;
        let permission_ids = unique(permission_ids);
        self.require_permissions(&permission_ids).await?;

        let outcome = self
            .assignments
            .revoke_grants(role_id, &permission_ids, Utc::now())
            .await?;

        info!(
            role_id = %role_id,
            applied = outcome.applied,
            skipped = outcome.skipped,
            "bulk permission revoke finished"
        );
        Ok(outcome)
    }

    /// Lists the full assignment history of a user.
    pub async fn list_user_assignments(&self, user_id: UserId) -> AppResult<Vec<UserRoleAssignment>> {
        self.assignments.list_assignments_for_user(user_id).await
    }

    /// Lists the full grant history of a role.
    pub async fn list_role_grants(&self, role_id: RoleId) -> AppResult<Vec<RolePermissionGrant>> {
        self.require_role(role_id).await?;
        self.assignments.list_grants_for_role(role_id).await
    }

    /// Persists the expired state of assignments that lapsed before `as_of`.
    pub async fn expire_lapsed_assignments(&self, as_of: DateTime<Utc>) -> AppResult<u64> {
        let expired = self.assignments.expire_lapsed_assignments(as_of).await?;

        if expired > 0 {
            info!(expired, "lapsed assignments expired");
        }
        Ok(expired)
    }

    async fn require_role(&self, role_id: RoleId) -> AppResult<Role> {
        self.roles
            .find_role(role_id)
            .await?
            .filter(|role| !role.is_deleted())
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))
    }

    async fn require_user(&self, user_id: UserId) -> AppResult<()> {
        match self.directory.account_status(user_id).await? {
            AccountStatus::Unknown => Err(AppError::NotFound(format!(
                "user '{user_id}' does not exist"
            ))),
            AccountStatus::Inactive => {
                warn!(user_id = %user_id, "assigning role to inactive account");
                Ok(())
            }
            AccountStatus::Active => Ok(()),
        }
    }

    async fn require_users(&self, user_ids: &[UserId]) -> AppResult<()> {
        if user_ids.is_empty() {
            return Ok(());
        }

        let missing = self.directory.find_missing_users(user_ids).await?;
        if missing.is_empty() {
            return Ok(());
        }

        Err(AppError::NotFound(format!(
            "users do not exist: {}",
            join_ids(&missing)
        )))
    }

    async fn require_permissions(&self, permission_ids: &[PermissionId]) -> AppResult<()> {
        if permission_ids.is_empty() {
            return Ok(());
        }

        let found: BTreeSet<PermissionId> = self
            .permissions
            .find_permissions(permission_ids)
            .await?
            .iter()
            .map(|permission| permission.id())
            .collect();
        let missing: Vec<PermissionId> = permission_ids
            .iter()
            .filter(|permission_id| !found.contains(permission_id))
            .copied()
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        Err(AppError::NotFound(format!(
            "permissions do not exist: {}",
            join_ids(&missing)
        )))
    }
}

fn ensure_future_expiry(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> AppResult<()> {
    match expires_at {
        Some(expires_at) if expires_at <= now => Err(AppError::Validation(format!(
            "expiry '{}' must be in the future",
            expires_at.to_rfc3339()
        ))),
        _ => Ok(()),
    }
}

/// Drops repeated identifiers while keeping first-seen order.
fn unique<T: Ord + Copy>(ids: &[T]) -> Vec<T> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn join_ids<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
