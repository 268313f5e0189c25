use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use atlas_application::{AssignmentStore, BulkOutcome, PermissionStore, RoleStore};
use atlas_core::{AppError, AppResult, UserId};
use atlas_domain::{
    AssignedRole, AssignmentState, CatalogState, GrantedPermission, Permission, PermissionId, Role,
    RoleId, RolePermissionGrant, UserRoleAssignment,
};

/// In-memory catalog and ledger implementation.
///
/// All state lives behind one lock so every mutation, bulk ones included,
/// is applied atomically.
#[derive(Debug, Default)]
pub struct InMemoryAccessRepository {
    state: RwLock<AccessState>,
}

#[derive(Debug, Default)]
struct AccessState {
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, Permission>,
    assignments: Vec<UserRoleAssignment>,
    grants: Vec<RolePermissionGrant>,
}

impl InMemoryAccessRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccessState {
    fn live_role_named(&self, name: &str) -> Option<&Role> {
        self.roles
            .values()
            .find(|role| !role.is_deleted() && role.name().as_str() == name)
    }

    /// Persists the expired state of lapsed assignments of one pair.
    fn expire_pair(&mut self, user_id: UserId, role_id: RoleId, as_of: DateTime<Utc>) {
        for assignment in self.assignments.iter_mut().filter(|assignment| {
            assignment.user_id() == user_id && assignment.role_id() == role_id
        }) {
            assignment.expire_if_lapsed(as_of);
        }
    }

    fn effective_assignment_mut(
        &mut self,
        user_id: UserId,
        role_id: RoleId,
        as_of: DateTime<Utc>,
    ) -> Option<&mut UserRoleAssignment> {
        self.assignments.iter_mut().find(|assignment| {
            assignment.user_id() == user_id
                && assignment.role_id() == role_id
                && assignment.is_effective(as_of)
        })
    }

    fn active_grant_mut(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Option<&mut RolePermissionGrant> {
        self.grants.iter_mut().find(|grant| {
            grant.role_id() == role_id && grant.permission_id() == permission_id && grant.is_active()
        })
    }

    fn ensure_live_role(&self, role_id: RoleId) -> AppResult<()> {
        match self.roles.get(&role_id) {
            Some(role) if !role.is_deleted() => Ok(()),
            _ => Err(AppError::NotFound(format!("role '{role_id}' does not exist"))),
        }
    }

    /// Adds an assignment unless the pair already holds an effective one.
    fn try_assign(&mut self, assignment: UserRoleAssignment, as_of: DateTime<Utc>) -> bool {
        let (user_id, role_id) = (assignment.user_id(), assignment.role_id());
        self.expire_pair(user_id, role_id, as_of);

        if self.effective_assignment_mut(user_id, role_id, as_of).is_some() {
            return false;
        }

        self.assignments.push(assignment);
        true
    }

    /// Adds a grant unless the pair already has an active one.
    fn try_grant(&mut self, grant: RolePermissionGrant) -> bool {
        if self
            .active_grant_mut(grant.role_id(), grant.permission_id())
            .is_some()
        {
            return false;
        }

        self.grants.push(grant);
        true
    }

    fn granted_permissions(&self, role_id: RoleId) -> Vec<GrantedPermission> {
        self.grants
            .iter()
            .filter(|grant| grant.role_id() == role_id && grant.is_active())
            .filter_map(|grant| {
                self.permissions
                    .get(&grant.permission_id())
                    .map(|permission| GrantedPermission {
                        grant: grant.clone(),
                        permission: permission.clone(),
                    })
            })
            .collect()
    }
}

#[async_trait]
impl RoleStore for InMemoryAccessRepository {
    async fn insert_role(&self, role: Role) -> AppResult<()> {
        let mut state = self.state.write().await;

        if state.live_role_named(role.name().as_str()).is_some() {
            return Err(AppError::DuplicateName(format!(
                "role '{}' already exists",
                role.name()
            )));
        }

        state.roles.insert(role.id(), role);
        Ok(())
    }

    async fn save_role(&self, role: &Role) -> AppResult<()> {
        let mut state = self.state.write().await;
        let Some(stored) = state.roles.get_mut(&role.id()) else {
            return Err(AppError::NotFound(format!(
                "role '{}' does not exist",
                role.id()
            )));
        };

        *stored = role.clone();
        Ok(())
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.state.read().await.roles.get(&role_id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        Ok(self.state.read().await.live_role_named(name).cloned())
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state
            .roles
            .values()
            .filter(|role| !role.is_deleted())
            .cloned()
            .collect();
        roles.sort_by(|left, right| left.name().cmp(right.name()));

        Ok(roles)
    }

    async fn delete_role(&self, role_id: RoleId, as_of: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.ensure_live_role(role_id)?;

        if state
            .assignments
            .iter()
            .any(|assignment| assignment.role_id() == role_id && assignment.is_effective(as_of))
        {
            return Err(AppError::HasActiveAssignments(format!(
                "role '{role_id}' is still assigned to users"
            )));
        }

        for assignment in state
            .assignments
            .iter_mut()
            .filter(|assignment| assignment.role_id() == role_id)
        {
            assignment.expire_if_lapsed(as_of);
        }
        for grant in state
            .grants
            .iter_mut()
            .filter(|grant| grant.role_id() == role_id && grant.is_active())
        {
            grant.revoke(as_of);
        }
        if let Some(role) = state.roles.get_mut(&role_id) {
            role.transition(CatalogState::Deleted, as_of);
        }

        Ok(())
    }
}

#[async_trait]
impl PermissionStore for InMemoryAccessRepository {
    async fn insert_permission(&self, permission: Permission) -> AppResult<()> {
        let mut state = self.state.write().await;

        if state
            .permissions
            .values()
            .any(|stored| stored.name() == permission.name())
        {
            return Err(AppError::DuplicateName(format!(
                "permission '{}' already exists",
                permission.name()
            )));
        }

        state.permissions.insert(permission.id(), permission);
        Ok(())
    }

    async fn save_permission(&self, permission: &Permission) -> AppResult<()> {
        let mut state = self.state.write().await;
        let Some(stored) = state.permissions.get_mut(&permission.id()) else {
            return Err(AppError::NotFound(format!(
                "permission '{}' does not exist",
                permission.id()
            )));
        };

        *stored = permission.clone();
        Ok(())
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<Permission>> {
        Ok(self
            .state
            .read()
            .await
            .permissions
            .get(&permission_id)
            .cloned())
    }

    async fn find_permission_by_name(&self, name: &str) -> AppResult<Option<Permission>> {
        Ok(self
            .state
            .read()
            .await
            .permissions
            .values()
            .find(|permission| permission.name().as_str() == name)
            .cloned())
    }

    async fn find_permissions(
        &self,
        permission_ids: &[PermissionId],
    ) -> AppResult<Vec<Permission>> {
        let state = self.state.read().await;

        Ok(permission_ids
            .iter()
            .filter_map(|permission_id| state.permissions.get(permission_id).cloned())
            .collect())
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        let state = self.state.read().await;
        let mut permissions: Vec<Permission> = state.permissions.values().cloned().collect();
        permissions.sort_by(|left, right| left.name().cmp(right.name()));

        Ok(permissions)
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAccessRepository {
    async fn insert_assignment(
        &self,
        assignment: UserRoleAssignment,
        as_of: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.ensure_live_role(assignment.role_id())?;

        let (user_id, role_id) = (assignment.user_id(), assignment.role_id());
        if !state.try_assign(assignment, as_of) {
            return Err(AppError::AlreadyAssigned(format!(
                "user '{user_id}' already holds role '{role_id}'"
            )));
        }

        Ok(())
    }

    async fn revoke_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
        as_of: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let Some(assignment) = state.effective_assignment_mut(user_id, role_id, as_of) else {
            return Err(AppError::NotFound(format!(
                "user '{user_id}' does not hold role '{role_id}'"
            )));
        };

        assignment.revoke(as_of);
        Ok(())
    }

    async fn insert_assignments(
        &self,
        assignments: Vec<UserRoleAssignment>,
        as_of: DateTime<Utc>,
    ) -> AppResult<BulkOutcome> {
        let mut state = self.state.write().await;
        for assignment in &assignments {
            state.ensure_live_role(assignment.role_id())?;
        }

        let mut outcome = BulkOutcome::default();
        for assignment in assignments {
            if state.try_assign(assignment, as_of) {
                outcome.applied += 1;
            } else {
                outcome.skipped += 1;
            }
        }

        Ok(outcome)
    }

    async fn revoke_assignments(
        &self,
        role_id: RoleId,
        user_ids: &[UserId],
        as_of: DateTime<Utc>,
    ) -> AppResult<BulkOutcome> {
        let mut state = self.state.write().await;
        let mut outcome = BulkOutcome::default();

        for user_id in user_ids {
            match state.effective_assignment_mut(*user_id, role_id, as_of) {
                Some(assignment) => {
                    assignment.revoke(as_of);
                    outcome.applied += 1;
                }
                None => outcome.skipped += 1,
            }
        }

        Ok(outcome)
    }

    async fn list_assignments_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        let state = self.state.read().await;
        let mut assignments: Vec<UserRoleAssignment> = state
            .assignments
            .iter()
            .filter(|assignment| assignment.user_id() == user_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|assignment| std::cmp::Reverse(assignment.assigned_at()));

        Ok(assignments)
    }

    async fn expire_lapsed_assignments(&self, as_of: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let mut expired = 0;

        for assignment in &mut state.assignments {
            if assignment.expire_if_lapsed(as_of) {
                expired += 1;
            }
        }

        Ok(expired)
    }

    async fn insert_grant(&self, grant: RolePermissionGrant) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.ensure_live_role(grant.role_id())?;

        let (role_id, permission_id) = (grant.role_id(), grant.permission_id());
        if !state.try_grant(grant) {
            return Err(AppError::AlreadyGranted(format!(
                "role '{role_id}' already has permission '{permission_id}'"
            )));
        }

        Ok(())
    }

    async fn revoke_grant(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let Some(grant) = state.active_grant_mut(role_id, permission_id) else {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' has no grant for permission '{permission_id}'"
            )));
        };

        grant.revoke(at);
        Ok(())
    }

    async fn insert_grants(&self, grants: Vec<RolePermissionGrant>) -> AppResult<BulkOutcome> {
        let mut state = self.state.write().await;
        for grant in &grants {
            state.ensure_live_role(grant.role_id())?;
        }

        let mut outcome = BulkOutcome::default();
        for grant in grants {
            if state.try_grant(grant) {
                outcome.applied += 1;
            } else {
                outcome.skipped += 1;
            }
        }

        Ok(outcome)
    }

    async fn revoke_grants(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
        at: DateTime<Utc>,
    ) -> AppResult<BulkOutcome> {
        let mut state = self.state.write().await;
        let mut outcome = BulkOutcome::default();

        for permission_id in permission_ids {
            match state.active_grant_mut(role_id, *permission_id) {
                Some(grant) => {
                    grant.revoke(at);
                    outcome.applied += 1;
                }
                None => outcome.skipped += 1,
            }
        }

        Ok(outcome)
    }

    async fn list_grants_for_role(&self, role_id: RoleId) -> AppResult<Vec<RolePermissionGrant>> {
        let state = self.state.read().await;
        let mut grants: Vec<RolePermissionGrant> = state
            .grants
            .iter()
            .filter(|grant| grant.role_id() == role_id)
            .cloned()
            .collect();
        grants.sort_by_key(|grant| std::cmp::Reverse(grant.granted_at()));

        Ok(grants)
    }

    async fn load_access(
        &self,
        user_id: UserId,
        _as_of: DateTime<Utc>,
    ) -> AppResult<Vec<AssignedRole>> {
        let state = self.state.read().await;

        Ok(state
            .assignments
            .iter()
            .filter(|assignment| {
                assignment.user_id() == user_id
                    && assignment.stored_state() == AssignmentState::Active
            })
            .filter_map(|assignment| {
                let role = state.roles.get(&assignment.role_id())?;
                Some(AssignedRole {
                    assignment: assignment.clone(),
                    role: role.clone(),
                    grants: state.granted_permissions(role.id()),
                })
            })
            .collect())
    }
}
