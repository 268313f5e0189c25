use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use atlas_core::{AppError, AppResult, UserId};
use atlas_domain::{
    AccountStatus, AssignedRole, AssignmentState, CatalogState, GrantedPermission, Permission,
    PermissionId, Role, RoleId, RolePermissionGrant, UserRoleAssignment,
};

use crate::access_ports::{AssignmentStore, BulkOutcome, PermissionStore, RoleStore, UserDirectory};

#[derive(Default)]
pub(crate) struct FakeStore {
    pub(crate) roles: Mutex<Vec<Role>>,
    pub(crate) permissions: Mutex<Vec<Permission>>,
    pub(crate) assignments: Mutex<Vec<UserRoleAssignment>>,
    pub(crate) grants: Mutex<Vec<RolePermissionGrant>>,
    pub(crate) access_loads: AtomicUsize,
}

impl FakeStore {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) async fn seed_role(&self, name: &str) -> Role {
        let Ok(role) = Role::create(name, name, "", Utc::now()) else {
            panic!("fixture role '{name}' should be valid");
        };
        self.roles.lock().await.push(role.clone());
        role
    }

    pub(crate) async fn seed_permission(
        &self,
        name: &str,
        resource: atlas_domain::ResourceType,
        action: atlas_domain::Action,
    ) -> Permission {
        let Ok(permission) = Permission::create(name, name, "", resource, action, Utc::now()) else {
            panic!("fixture permission '{name}' should be valid");
        };
        self.permissions.lock().await.push(permission.clone());
        permission
    }
}

#[async_trait]
impl RoleStore for FakeStore {
    async fn insert_role(&self, role: Role) -> AppResult<()> {
        let mut roles = self.roles.lock().await;
        if roles
            .iter()
            .any(|stored| !stored.is_deleted() && stored.name() == role.name())
        {
            return Err(AppError::DuplicateName(role.name().to_string()));
        }
        roles.push(role);
        Ok(())
    }

    async fn save_role(&self, role: &Role) -> AppResult<()> {
        let mut roles = self.roles.lock().await;
        let Some(stored) = roles.iter_mut().find(|stored| stored.id() == role.id()) else {
            return Err(AppError::NotFound(role.id().to_string()));
        };
        *stored = role.clone();
        Ok(())
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .find(|role| role.id() == role_id)
            .cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .find(|role| !role.is_deleted() && role.name().as_str() == name)
            .cloned())
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let mut roles: Vec<Role> = self
            .roles
            .lock()
            .await
            .iter()
            .filter(|role| !role.is_deleted())
            .cloned()
            .collect();
        roles.sort_by(|left, right| left.name().cmp(right.name()));
        Ok(roles)
    }

    async fn delete_role(&self, role_id: RoleId, as_of: DateTime<Utc>) -> AppResult<()> {
        let mut assignments = self.assignments.lock().await;
        if assignments
            .iter()
            .any(|assignment| assignment.role_id() == role_id && assignment.is_effective(as_of))
        {
            return Err(AppError::HasActiveAssignments(role_id.to_string()));
        }
        for assignment in assignments
            .iter_mut()
            .filter(|assignment| assignment.role_id() == role_id)
        {
            assignment.expire_if_lapsed(as_of);
        }

        for grant in self
            .grants
            .lock()
            .await
            .iter_mut()
            .filter(|grant| grant.role_id() == role_id && grant.is_active())
        {
            grant.revoke(as_of);
        }

        let mut roles = self.roles.lock().await;
        if let Some(role) = roles.iter_mut().find(|role| role.id() == role_id) {
            role.transition(CatalogState::Deleted, as_of);
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for FakeStore {
    async fn insert_permission(&self, permission: Permission) -> AppResult<()> {
        let mut permissions = self.permissions.lock().await;
        if permissions
            .iter()
            .any(|stored| stored.name() == permission.name())
        {
            return Err(AppError::DuplicateName(permission.name().to_string()));
        }
        permissions.push(permission);
        Ok(())
    }

    async fn save_permission(&self, permission: &Permission) -> AppResult<()> {
        let mut permissions = self.permissions.lock().await;
        let Some(stored) = permissions
            .iter_mut()
            .find(|stored| stored.id() == permission.id())
        else {
            return Err(AppError::NotFound(permission.id().to_string()));
        };
        *stored = permission.clone();
        Ok(())
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<Permission>> {
        Ok(self
            .permissions
            .lock()
            .await
            .iter()
            .find(|permission| permission.id() == permission_id)
            .cloned())
    }

    async fn find_permission_by_name(&self, name: &str) -> AppResult<Option<Permission>> {
        Ok(self
            .permissions
            .lock()
            .await
            .iter()
            .find(|permission| permission.name().as_str() == name)
            .cloned())
    }

    async fn find_permissions(
        &self,
        permission_ids: &[PermissionId],
    ) -> AppResult<Vec<Permission>> {
        Ok(self
            .permissions
            .lock()
            .await
            .iter()
            .filter(|permission| permission_ids.contains(&permission.id()))
            .cloned()
            .collect())
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        Ok(self.permissions.lock().await.clone())
    }
}

#[async_trait]
impl AssignmentStore for FakeStore {
    async fn insert_assignment(
        &self,
        assignment: UserRoleAssignment,
        as_of: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut assignments = self.assignments.lock().await;
        if assignments.iter().any(|stored| {
            stored.user_id() == assignment.user_id()
                && stored.role_id() == assignment.role_id()
                && stored.is_effective(as_of)
        }) {
            return Err(AppError::AlreadyAssigned(assignment.role_id().to_string()));
        }
        assignments.push(assignment);
        Ok(())
    }

    async fn revoke_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
        as_of: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut assignments = self.assignments.lock().await;
        let Some(assignment) = assignments.iter_mut().find(|stored| {
            stored.user_id() == user_id && stored.role_id() == role_id && stored.is_effective(as_of)
        }) else {
            return Err(AppError::NotFound(format!("{user_id}:{role_id}")));
        };
        assignment.revoke(as_of);
        Ok(())
    }

    async fn insert_assignments(
        &self,
        new_assignments: Vec<UserRoleAssignment>,
        as_of: DateTime<Utc>,
    ) -> AppResult<BulkOutcome> {
        let mut assignments = self.assignments.lock().await;
        let mut outcome = BulkOutcome::default();
        for assignment in new_assignments {
            if assignments.iter().any(|stored| {
                stored.user_id() == assignment.user_id()
                    && stored.role_id() == assignment.role_id()
                    && stored.is_effective(as_of)
            }) {
                outcome.skipped += 1;
            } else {
                assignments.push(assignment);
                outcome.applied += 1;
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
        let mut assignments = self.assignments.lock().await;
        let mut outcome = BulkOutcome::default();
        for user_id in user_ids {
            match assignments.iter_mut().find(|stored| {
                stored.user_id() == *user_id
                    && stored.role_id() == role_id
                    && stored.is_effective(as_of)
            }) {
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
        Ok(self
            .assignments
            .lock()
            .await
            .iter()
            .filter(|assignment| assignment.user_id() == user_id)
            .cloned()
            .collect())
    }

    async fn expire_lapsed_assignments(&self, as_of: DateTime<Utc>) -> AppResult<u64> {
        let mut expired = 0;
        for assignment in self.assignments.lock().await.iter_mut() {
            if assignment.expire_if_lapsed(as_of) {
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn insert_grant(&self, grant: RolePermissionGrant) -> AppResult<()> {
        let mut grants = self.grants.lock().await;
        if grants.iter().any(|stored| {
            stored.role_id() == grant.role_id()
                && stored.permission_id() == grant.permission_id()
                && stored.is_active()
        }) {
            return Err(AppError::AlreadyGranted(grant.permission_id().to_string()));
        }
        grants.push(grant);
        Ok(())
    }

    async fn revoke_grant(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut grants = self.grants.lock().await;
        let Some(grant) = grants.iter_mut().find(|stored| {
            stored.role_id() == role_id && stored.permission_id() == permission_id && stored.is_active()
        }) else {
            return Err(AppError::NotFound(format!("{role_id}:{permission_id}")));
        };
        grant.revoke(at);
        Ok(())
    }

    async fn insert_grants(&self, new_grants: Vec<RolePermissionGrant>) -> AppResult<BulkOutcome> {
        let mut grants = self.grants.lock().await;
        let mut outcome = BulkOutcome::default();
        for grant in new_grants {
            if grants.iter().any(|stored| {
                stored.role_id() == grant.role_id()
                    && stored.permission_id() == grant.permission_id()
                    && stored.is_active()
            }) {
                outcome.skipped += 1;
            } else {
                grants.push(grant);
                outcome.applied += 1;
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
        let mut grants = self.grants.lock().await;
        let mut outcome = BulkOutcome::default();
        for permission_id in permission_ids {
            match grants.iter_mut().find(|stored| {
                stored.role_id() == role_id
                    && stored.permission_id() == *permission_id
                    && stored.is_active()
            }) {
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
        Ok(self
            .grants
            .lock()
            .await
            .iter()
            .filter(|grant| grant.role_id() == role_id)
            .cloned()
            .collect())
    }

    async fn load_access(
        &self,
        user_id: UserId,
        _as_of: DateTime<Utc>,
    ) -> AppResult<Vec<AssignedRole>> {
        self.access_loads.fetch_add(1, Ordering::SeqCst);

        let assignments = self.assignments.lock().await.clone();
        let roles = self.roles.lock().await.clone();
        let permissions = self.permissions.lock().await.clone();
        let grants = self.grants.lock().await.clone();

        Ok(assignments
            .into_iter()
            .filter(|assignment| {
                assignment.user_id() == user_id
                    && assignment.stored_state() == AssignmentState::Active
            })
            .filter_map(|assignment| {
                let role = roles
                    .iter()
                    .find(|role| role.id() == assignment.role_id())?
                    .clone();
                let granted = grants
                    .iter()
                    .filter(|grant| grant.role_id() == role.id() && grant.is_active())
                    .filter_map(|grant| {
                        permissions
                            .iter()
                            .find(|permission| permission.id() == grant.permission_id())
                            .map(|permission| GrantedPermission {
                                grant: grant.clone(),
                                permission: permission.clone(),
                            })
                    })
                    .collect();
                Some(AssignedRole {
                    assignment,
                    role,
                    grants: granted,
                })
            })
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakeDirectory {
    accounts: Mutex<HashMap<UserId, AccountStatus>>,
}

impl FakeDirectory {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) async fn add_user(&self, status: AccountStatus) -> UserId {
        let user_id = UserId::new();
        self.accounts.lock().await.insert(user_id, status);
        user_id
    }
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn account_status(&self, user_id: UserId) -> AppResult<AccountStatus> {
        Ok(self
            .accounts
            .lock()
            .await
            .get(&user_id)
            .copied()
            .unwrap_or(AccountStatus::Unknown))
    }

    async fn find_missing_users(&self, user_ids: &[UserId]) -> AppResult<Vec<UserId>> {
        let accounts = self.accounts.lock().await;
        Ok(user_ids
            .iter()
            .filter(|user_id| !accounts.contains_key(user_id))
            .copied()
            .collect())
    }
}
