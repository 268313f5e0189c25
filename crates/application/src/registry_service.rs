use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use atlas_core::{AppError, AppResult};
use atlas_domain::{
    CatalogState, Permission, PermissionId, PermissionPatch, Role, RoleId, RolePatch, SystemRole,
};

use crate::access_ports::{CreatePermissionInput, CreateRoleInput, PermissionStore, RoleStore};

/// Application service for the role and permission catalog.
#[derive(Clone)]
pub struct RegistryService {
    roles: Arc<dyn RoleStore>,
    permissions: Arc<dyn PermissionStore>,
}

impl RegistryService {
    /// Creates a new registry service from store implementations.
    #[must_use]
    pub fn new(roles: Arc<dyn RoleStore>, permissions: Arc<dyn PermissionStore>) -> Self {
        Self { roles, permissions }
    }

    /// Creates a new active role.
    pub async fn create_role(&self, input: CreateRoleInput) -> AppResult<Role> {
        let role = Role::create(input.name, input.display_name, input.description, Utc::now())?;
        self.roles.insert_role(role.clone()).await?;

        info!(role_id = %role.id(), role_name = %role.name(), "role created");
        Ok(role)
    }

    /// Applies a partial update to a role. The machine name never changes.
    pub async fn update_role(&self, role_id: RoleId, patch: RolePatch) -> AppResult<Role> {
        let mut role = self.get_role(role_id).await?;
        role.apply_patch(patch, Utc::now())?;
        self.roles.save_role(&role).await?;

        info!(role_id = %role_id, "role updated");
        Ok(role)
    }

    /// Deactivates a role so it contributes nothing to snapshots.
    ///
    /// Reserved roles cannot be deactivated.
    pub async fn deactivate_role(&self, role_id: RoleId) -> AppResult<Role> {
        let mut role = self.get_role(role_id).await?;
        ensure_not_reserved(&role, "deactivated")?;

        if role.state() != CatalogState::Inactive {
            role.transition(CatalogState::Inactive, Utc::now());
            self.roles.save_role(&role).await?;
            info!(role_id = %role_id, "role deactivated");
        }

        Ok(role)
    }

    /// Restores an inactive role.
    pub async fn activate_role(&self, role_id: RoleId) -> AppResult<Role> {
        let mut role = self.get_role(role_id).await?;

        if !role.is_active() {
            role.transition(CatalogState::Active, Utc::now());
            self.roles.save_role(&role).await?;
            info!(role_id = %role_id, "role activated");
        }

        Ok(role)
    }

    /// Deletes a role and deactivates its grants and assignments.
    ///
    /// Fails with `SystemProtected` for reserved roles and with
    /// `HasActiveAssignments` while any assignment of the role is effective.
    pub async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let role = self.get_role(role_id).await?;
        ensure_not_reserved(&role, "deleted")?;

        self.roles.delete_role(role_id, Utc::now()).await?;

        info!(role_id = %role_id, role_name = %role.name(), "role deleted");
        Ok(())
    }

    /// Lists roles that are not deleted.
    pub async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.roles.list_roles().await
    }

    /// Returns a role that is not deleted.
    pub async fn get_role(&self, role_id: RoleId) -> AppResult<Role> {
        self.roles
            .find_role(role_id)
            .await?
            .filter(|role| !role.is_deleted())
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))
    }

    /// Finds a role that is not deleted by machine name.
    pub async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        self.roles.find_role_by_name(name.trim()).await
    }

    /// Creates a new active permission.
    pub async fn create_permission(&self, input: CreatePermissionInput) -> AppResult<Permission> {
        let permission = Permission::create(
            input.name,
            input.display_name,
            input.description,
            input.resource,
            input.action,
            Utc::now(),
        )?;
        if self
            .permissions
            .find_permission_by_name(permission.name().as_str())
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateName(format!(
                "permission '{}' already exists",
                permission.name()
            )));
        }
        self.permissions
            .insert_permission(permission.clone())
            .await?;

        info!(
            permission_id = %permission.id(),
            permission_name = %permission.name(),
            resource = %permission.resource(),
            action = %permission.action(),
            "permission created"
        );
        Ok(permission)
    }

    /// Applies a partial update to a permission. The machine name never
    /// changes.
    pub async fn update_permission(
        &self,
        permission_id: PermissionId,
        patch: PermissionPatch,
    ) -> AppResult<Permission> {
        let mut permission = self.get_permission(permission_id).await?;
        permission.apply_patch(patch, Utc::now())?;
        self.permissions.save_permission(&permission).await?;

        info!(permission_id = %permission_id, "permission updated");
        Ok(permission)
    }

    /// Deactivates a permission so no grant makes it reachable.
    pub async fn deactivate_permission(&self, permission_id: PermissionId) -> AppResult<Permission> {
        self.set_permission_active(permission_id, false).await
    }

    /// Restores an inactive permission.
    pub async fn activate_permission(&self, permission_id: PermissionId) -> AppResult<Permission> {
        self.set_permission_active(permission_id, true).await
    }

    /// Lists every permission.
    pub async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        self.permissions.list_permissions().await
    }

    /// Finds a permission by machine name.
    pub async fn find_permission_by_name(&self, name: &str) -> AppResult<Option<Permission>> {
        self.permissions.find_permission_by_name(name.trim()).await
    }

    /// Returns one permission.
    pub async fn get_permission(&self, permission_id: PermissionId) -> AppResult<Permission> {
        self.permissions
            .find_permission(permission_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("permission '{permission_id}' does not exist"))
            })
    }

    /// Creates any missing reserved role and reactivates reserved roles that
    /// are not active. Safe to run repeatedly.
    pub async fn bootstrap_system_roles(&self) -> AppResult<Vec<Role>> {
        let mut roles = Vec::with_capacity(SystemRole::all().len());

        for system_role in SystemRole::all() {
            let role = match self.roles.find_role_by_name(system_role.as_str()).await? {
                Some(mut role) => {
                    if !role.is_active() {
                        role.transition(CatalogState::Active, Utc::now());
                        self.roles.save_role(&role).await?;
                        info!(role_name = %system_role, "reserved role reactivated");
                    }
                    role
                }
                None => self.create_system_role(*system_role).await?,
            };
            roles.push(role);
        }

        Ok(roles)
    }

    async fn create_system_role(&self, system_role: SystemRole) -> AppResult<Role> {
        let role = Role::create(
            system_role.as_str(),
            system_role.display_name(),
            format!("Reserved {} role", system_role.display_name().to_lowercase()),
            Utc::now(),
        )?;

        match self.roles.insert_role(role.clone()).await {
            Ok(()) => {
                info!(role_name = %system_role, "reserved role created");
                Ok(role)
            }
            // Another process bootstrapped the same role concurrently.
            Err(AppError::DuplicateName(_)) => self
                .roles
                .find_role_by_name(system_role.as_str())
                .await?
                .ok_or_else(|| {
                    AppError::Internal(format!(
                        "reserved role '{system_role}' vanished during bootstrap"
                    ))
                }),
            Err(error) => Err(error),
        }
    }

    async fn set_permission_active(
        &self,
        permission_id: PermissionId,
        active: bool,
    ) -> AppResult<Permission> {
        let mut permission = self.get_permission(permission_id).await?;

        if permission.is_active() != active {
            permission.set_active(active, Utc::now());
            self.permissions.save_permission(&permission).await?;
            info!(permission_id = %permission_id, active, "permission state changed");
        }

        Ok(permission)
    }
}

fn ensure_not_reserved(role: &Role, verb: &str) -> AppResult<()> {
    if role.is_system() {
        return Err(AppError::SystemProtected(format!(
            "reserved role '{}' cannot be {verb}",
            role.name()
        )));
    }

    Ok(())
}
