use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use atlas_application::{AssignmentStore, BulkOutcome};
use atlas_core::{AppError, AppResult, UserId};
use atlas_domain::{AssignedRole, PermissionId, RoleId, RolePermissionGrant, UserRoleAssignment};

use super::{
    AccessRow, AssignmentRow, GrantRow, PostgresAccessRepository, aggregate_access, commit,
    is_foreign_key_violation, is_unique_violation, lock_live_role, uuids,
};

const INSERT_ASSIGNMENT: &str = r#"
    INSERT INTO user_role_assignments (
        id, user_id, role_id, assigned_by, assigned_at, expires_at, state, revoked_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
"#;

const INSERT_GRANT: &str = r#"
    INSERT INTO role_permission_grants (
        id, role_id, permission_id, granted_by, granted_at, state, revoked_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

/// Persists the expired state of lapsed assignments of one pair so the
/// active-pair index admits a new assignment.
async fn expire_lapsed_pair(
    transaction: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    role_id: RoleId,
    as_of: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE user_role_assignments
        SET state = 'expired'
        WHERE user_id = $1
            AND role_id = $2
            AND state = 'active'
            AND expires_at IS NOT NULL
            AND expires_at <= $3
        "#,
    )
    .bind(user_id.as_uuid())
    .bind(role_id.as_uuid())
    .bind(as_of)
    .execute(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to expire lapsed assignment: {error}")))?;

    Ok(())
}

async fn insert_assignment_row(
    transaction: &mut Transaction<'_, Postgres>,
    assignment: &UserRoleAssignment,
    skip_conflicts: bool,
) -> Result<u64, sqlx::Error> {
    let statement = if skip_conflicts {
        format!("{INSERT_ASSIGNMENT} ON CONFLICT DO NOTHING")
    } else {
        INSERT_ASSIGNMENT.to_owned()
    };

    Ok(sqlx::query(&statement)
        .bind(assignment.id())
        .bind(assignment.user_id().as_uuid())
        .bind(assignment.role_id().as_uuid())
        .bind(assignment.assigned_by().as_uuid())
        .bind(assignment.assigned_at())
        .bind(assignment.expires_at())
        .bind(assignment.stored_state().as_str())
        .bind(assignment.revoked_at())
        .execute(&mut **transaction)
        .await?
        .rows_affected())
}

async fn insert_grant_row(
    transaction: &mut Transaction<'_, Postgres>,
    grant: &RolePermissionGrant,
    skip_conflicts: bool,
) -> Result<u64, sqlx::Error> {
    let statement = if skip_conflicts {
        format!("{INSERT_GRANT} ON CONFLICT DO NOTHING")
    } else {
        INSERT_GRANT.to_owned()
    };

    Ok(sqlx::query(&statement)
        .bind(grant.id())
        .bind(grant.role_id().as_uuid())
        .bind(grant.permission_id().as_uuid())
        .bind(grant.granted_by().as_uuid())
        .bind(grant.granted_at())
        .bind(grant.state().as_str())
        .bind(grant.revoked_at())
        .execute(&mut **transaction)
        .await?
        .rows_affected())
}

#[async_trait]
impl AssignmentStore for PostgresAccessRepository {
    async fn insert_assignment(
        &self,
        assignment: UserRoleAssignment,
        as_of: DateTime<Utc>,
    ) -> AppResult<()> {
        let (user_id, role_id) = (assignment.user_id(), assignment.role_id());
        let mut transaction = self.begin().await?;
        lock_live_role(&mut transaction, role_id).await?;
        expire_lapsed_pair(&mut transaction, user_id, role_id, as_of).await?;

        insert_assignment_row(&mut transaction, &assignment, false)
            .await
            .map_err(|error| {
                if is_unique_violation(&error) {
                    return AppError::AlreadyAssigned(format!(
                        "user '{user_id}' already holds role '{role_id}'"
                    ));
                }
                if is_foreign_key_violation(&error) {
                    return AppError::NotFound(format!("user '{user_id}' does not exist"));
                }
                AppError::Internal(format!("failed to assign role: {error}"))
            })?;

        commit(transaction).await
    }

    async fn revoke_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
        as_of: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE user_role_assignments
            SET state = 'revoked', revoked_at = $3
            WHERE user_id = $1
                AND role_id = $2
                AND state = 'active'
                AND (expires_at IS NULL OR expires_at > $3)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .bind(as_of)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke assignment: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "user '{user_id}' does not hold role '{role_id}'"
            )));
        }

        Ok(())
    }

    async fn insert_assignments(
        &self,
        assignments: Vec<UserRoleAssignment>,
        as_of: DateTime<Utc>,
    ) -> AppResult<BulkOutcome> {
        let mut transaction = self.begin().await?;
        let mut locked_roles = Vec::new();
        let mut outcome = BulkOutcome::default();

        for assignment in &assignments {
            let role_id = assignment.role_id();
            if !locked_roles.contains(&role_id) {
                lock_live_role(&mut transaction, role_id).await?;
                locked_roles.push(role_id);
            }

            expire_lapsed_pair(&mut transaction, assignment.user_id(), role_id, as_of).await?;
            let inserted = insert_assignment_row(&mut transaction, assignment, true)
                .await
                .map_err(|error| {
                    if is_foreign_key_violation(&error) {
                        return AppError::NotFound(format!(
                            "user '{}' does not exist",
                            assignment.user_id()
                        ));
                    }
                    AppError::Internal(format!("failed to assign roles: {error}"))
                })?;

            if inserted == 0 {
                outcome.skipped += 1;
            } else {
                outcome.applied += 1;
            }
        }

        commit(transaction).await?;
        Ok(outcome)
    }

    async fn revoke_assignments(
        &self,
        role_id: RoleId,
        user_ids: &[UserId],
        as_of: DateTime<Utc>,
    ) -> AppResult<BulkOutcome> {
        let revoked = sqlx::query(
            r#"
            UPDATE user_role_assignments
            SET state = 'revoked', revoked_at = $3
            WHERE role_id = $1
                AND user_id = ANY($2)
                AND state = 'active'
                AND (expires_at IS NULL OR expires_at > $3)
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(uuids(user_ids, UserId::as_uuid))
        .bind(as_of)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to remove roles: {error}")))?
        .rows_affected();

        let applied = usize::try_from(revoked).unwrap_or(user_ids.len());
        Ok(BulkOutcome {
            applied,
            skipped: user_ids.len().saturating_sub(applied),
        })
    }

    async fn list_assignments_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, user_id, role_id, assigned_by, assigned_at, expires_at, state, revoked_at
            FROM user_role_assignments
            WHERE user_id = $1
            ORDER BY assigned_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list assignments: {error}")))?
        .into_iter()
        .map(UserRoleAssignment::try_from)
        .collect()
    }

    async fn expire_lapsed_assignments(&self, as_of: DateTime<Utc>) -> AppResult<u64> {
        Ok(sqlx::query(
            r#"
            UPDATE user_role_assignments
            SET state = 'expired'
            WHERE state = 'active'
                AND expires_at IS NOT NULL
                AND expires_at <= $1
            "#,
        )
        .bind(as_of)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to expire assignments: {error}")))?
        .rows_affected())
    }

    async fn insert_grant(&self, grant: RolePermissionGrant) -> AppResult<()> {
        let (role_id, permission_id) = (grant.role_id(), grant.permission_id());
        let mut transaction = self.begin().await?;
        lock_live_role(&mut transaction, role_id).await?;

        insert_grant_row(&mut transaction, &grant, false)
            .await
            .map_err(|error| {
                if is_unique_violation(&error) {
                    return AppError::AlreadyGranted(format!(
                        "role '{role_id}' already has permission '{permission_id}'"
                    ));
                }
                if is_foreign_key_violation(&error) {
                    return AppError::NotFound(format!(
                        "permission '{permission_id}' does not exist"
                    ));
                }
                AppError::Internal(format!("failed to grant permission: {error}"))
            })?;

        commit(transaction).await
    }

    async fn revoke_grant(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE role_permission_grants
            SET state = 'revoked', revoked_at = $3
            WHERE role_id = $1 AND permission_id = $2 AND state = 'active'
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(permission_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke permission: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' has no grant for permission '{permission_id}'"
            )));
        }

        Ok(())
    }

    async fn insert_grants(&self, grants: Vec<RolePermissionGrant>) -> AppResult<BulkOutcome> {
        let mut transaction = self.begin().await?;
        let mut locked_roles = Vec::new();
        let mut outcome = BulkOutcome::default();

        for grant in &grants {
            let role_id = grant.role_id();
            if !locked_roles.contains(&role_id) {
                lock_live_role(&mut transaction, role_id).await?;
                locked_roles.push(role_id);
            }

            let inserted = insert_grant_row(&mut transaction, grant, true)
                .await
                .map_err(|error| {
                    if is_foreign_key_violation(&error) {
                        return AppError::NotFound(format!(
                            "permission '{}' does not exist",
                            grant.permission_id()
                        ));
                    }
                    AppError::Internal(format!("failed to grant permissions: {error}"))
                })?;

            if inserted == 0 {
                outcome.skipped += 1;
            } else {
                outcome.applied += 1;
            }
        }

        commit(transaction).await?;
        Ok(outcome)
    }

    async fn revoke_grants(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
        at: DateTime<Utc>,
    ) -> AppResult<BulkOutcome> {
        let revoked = sqlx::query(
            r#"
            UPDATE role_permission_grants
            SET state = 'revoked', revoked_at = $3
            WHERE role_id = $1 AND permission_id = ANY($2) AND state = 'active'
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(uuids(permission_ids, PermissionId::as_uuid))
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke permissions: {error}")))?
        .rows_affected();

        let applied = usize::try_from(revoked).unwrap_or(permission_ids.len());
        Ok(BulkOutcome {
            applied,
            skipped: permission_ids.len().saturating_sub(applied),
        })
    }

    async fn list_grants_for_role(&self, role_id: RoleId) -> AppResult<Vec<RolePermissionGrant>> {
        sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT id, role_id, permission_id, granted_by, granted_at, state, revoked_at
            FROM role_permission_grants
            WHERE role_id = $1
            ORDER BY granted_at DESC
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list grants: {error}")))?
        .into_iter()
        .map(RolePermissionGrant::try_from)
        .collect()
    }

    async fn load_access(
        &self,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Vec<AssignedRole>> {
        let rows = sqlx::query_as::<_, AccessRow>(
            r#"
            SELECT
                assignments.id,
                assignments.user_id,
                assignments.role_id,
                assignments.assigned_by,
                assignments.assigned_at,
                assignments.expires_at,
                assignments.state,
                assignments.revoked_at,
                roles.name AS role_name,
                roles.display_name AS role_display_name,
                roles.description AS role_description,
                roles.state AS role_state,
                roles.created_at AS role_created_at,
                roles.updated_at AS role_updated_at,
                grants.id AS grant_id,
                grants.granted_by,
                grants.granted_at,
                grants.state AS grant_state,
                permissions.id AS permission_id,
                permissions.name AS permission_name,
                permissions.display_name AS permission_display_name,
                permissions.description AS permission_description,
                permissions.resource AS permission_resource,
                permissions.action AS permission_action,
                permissions.state AS permission_state,
                permissions.created_at AS permission_created_at,
                permissions.updated_at AS permission_updated_at
            FROM user_role_assignments AS assignments
            INNER JOIN roles
                ON roles.id = assignments.role_id
            LEFT JOIN role_permission_grants AS grants
                ON grants.role_id = roles.id
                AND grants.state = 'active'
            LEFT JOIN permissions
                ON permissions.id = grants.permission_id
            WHERE assignments.user_id = $1
                AND assignments.state = 'active'
                AND (assignments.expires_at IS NULL OR assignments.expires_at > $2)
                AND roles.state = 'active'
            ORDER BY assignments.assigned_at, assignments.id, permissions.name
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load access: {error}")))?;

        aggregate_access(rows)
    }
}
