use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use atlas_application::{PermissionStore, RoleStore};
use atlas_core::{AppError, AppResult};
use atlas_domain::{Permission, PermissionId, Role, RoleId};

use super::{
    PermissionRow, PostgresAccessRepository, RoleRow, commit, is_unique_violation,
    lock_live_role_for_update, uuids,
};

const ROLE_COLUMNS: &str =
    "id, name, display_name, description, state, created_at, updated_at";
const PERMISSION_COLUMNS: &str =
    "id, name, display_name, description, resource, action, state, created_at, updated_at";

#[async_trait]
impl RoleStore for PostgresAccessRepository {
    async fn insert_role(&self, role: Role) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO roles (id, name, display_name, description, state, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(role.id().as_uuid())
        .bind(role.name().as_str())
        .bind(role.display_name().as_str())
        .bind(role.description())
        .bind(role.state().as_str())
        .bind(role.created_at())
        .bind(role.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                return AppError::DuplicateName(format!("role '{}' already exists", role.name()));
            }
            AppError::Internal(format!("failed to create role: {error}"))
        })?;

        Ok(())
    }

    async fn save_role(&self, role: &Role) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE roles
            SET display_name = $2, description = $3, state = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(role.id().as_uuid())
        .bind(role.display_name().as_str())
        .bind(role.description())
        .bind(role.state().as_str())
        .bind(role.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                return AppError::DuplicateName(format!("role '{}' already exists", role.name()));
            }
            AppError::Internal(format!("failed to update role: {error}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "role '{}' does not exist",
                role.id()
            )));
        }

        Ok(())
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, RoleRow>(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"))
            .bind(role_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?
            .map(Role::try_from)
            .transpose()
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1 AND state <> 'deleted'"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role by name: {error}")))?
        .map(Role::try_from)
        .transpose()
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE state <> 'deleted' ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?
        .into_iter()
        .map(Role::try_from)
        .collect()
    }

    async fn delete_role(&self, role_id: RoleId, as_of: DateTime<Utc>) -> AppResult<()> {
        let mut transaction = self.begin().await?;
        lock_live_role_for_update(&mut transaction, role_id).await?;

        let has_effective = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM user_role_assignments
                WHERE role_id = $1
                    AND state = 'active'
                    AND (expires_at IS NULL OR expires_at > $2)
            )
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(as_of)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to check role assignments: {error}"))
        })?;

        if has_effective {
            return Err(AppError::HasActiveAssignments(format!(
                "role '{role_id}' is still assigned to users"
            )));
        }

        let expired = sqlx::query(
            r#"
            UPDATE user_role_assignments
            SET state = 'expired'
            WHERE role_id = $1 AND state = 'active'
            "#,
        )
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to expire assignments: {error}")))?
        .rows_affected();

        let revoked = sqlx::query(
            r#"
            UPDATE role_permission_grants
            SET state = 'revoked', revoked_at = $2
            WHERE role_id = $1 AND state = 'active'
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(as_of)
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke grants: {error}")))?
        .rows_affected();

        sqlx::query(
            r#"
            UPDATE roles
            SET state = 'deleted', updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(as_of)
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?;

        commit(transaction).await?;

        info!(
            role_id = %role_id,
            expired_assignments = expired,
            revoked_grants = revoked,
            "role row marked deleted"
        );
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for PostgresAccessRepository {
    async fn insert_permission(&self, permission: Permission) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO permissions (
                id, name, display_name, description, resource, action, state, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(permission.id().as_uuid())
        .bind(permission.name().as_str())
        .bind(permission.display_name().as_str())
        .bind(permission.description())
        .bind(permission.resource().as_str())
        .bind(permission.action().as_str())
        .bind(permission.state().as_str())
        .bind(permission.created_at())
        .bind(permission.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                return AppError::DuplicateName(format!(
                    "permission '{}' already exists",
                    permission.name()
                ));
            }
            AppError::Internal(format!("failed to create permission: {error}"))
        })?;

        Ok(())
    }

    async fn save_permission(&self, permission: &Permission) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE permissions
            SET display_name = $2,
                description = $3,
                resource = $4,
                action = $5,
                state = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(permission.id().as_uuid())
        .bind(permission.display_name().as_str())
        .bind(permission.description())
        .bind(permission.resource().as_str())
        .bind(permission.action().as_str())
        .bind(permission.state().as_str())
        .bind(permission.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update permission: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "permission '{}' does not exist",
                permission.id()
            )));
        }

        Ok(())
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<Permission>> {
        sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = $1"
        ))
        .bind(permission_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find permission: {error}")))?
        .map(Permission::try_from)
        .transpose()
    }

    async fn find_permission_by_name(&self, name: &str) -> AppResult<Option<Permission>> {
        sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find permission by name: {error}"))
        })?
        .map(Permission::try_from)
        .transpose()
    }

    async fn find_permissions(
        &self,
        permission_ids: &[PermissionId],
    ) -> AppResult<Vec<Permission>> {
        sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = ANY($1)"
        ))
        .bind(uuids(permission_ids, PermissionId::as_uuid))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find permissions: {error}")))?
        .into_iter()
        .map(Permission::try_from)
        .collect()
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list permissions: {error}")))?
        .into_iter()
        .map(Permission::try_from)
        .collect()
    }
}
