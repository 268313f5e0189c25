use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use atlas_core::{AppError, AppResult, UserId};
use atlas_domain::{
    Action, AssignedRole, AssignmentState, CatalogState, GrantState, GrantedPermission, Permission,
    PermissionId, ResourceType, Role, RoleId, RolePermissionGrant, UserRoleAssignment,
};

mod catalog;
mod ledger;

/// PostgreSQL-backed catalog and ledger.
///
/// Active-pair uniqueness is enforced by partial unique indexes; bulk
/// mutations run inside one transaction.
#[derive(Clone)]
pub struct PostgresAccessRepository {
    pool: PgPool,
}

impl PostgresAccessRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))
    }
}

async fn commit(transaction: Transaction<'_, Postgres>) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| AppError::Internal(format!("failed to commit transaction: {error}")))
}

/// Takes a shared lock on a role row for the rest of the transaction and
/// fails unless the role exists and is not deleted.
///
/// Ledger inserts hold this lock so they serialize against
/// [`lock_live_role_for_update`] in role deletion.
async fn lock_live_role(
    transaction: &mut Transaction<'_, Postgres>,
    role_id: RoleId,
) -> AppResult<()> {
    lock_role_row(transaction, role_id, "FOR SHARE").await
}

/// Takes an exclusive lock on a role row; waits for in-flight ledger inserts
/// on the same role to finish first.
async fn lock_live_role_for_update(
    transaction: &mut Transaction<'_, Postgres>,
    role_id: RoleId,
) -> AppResult<()> {
    lock_role_row(transaction, role_id, "FOR UPDATE").await
}

async fn lock_role_row(
    transaction: &mut Transaction<'_, Postgres>,
    role_id: RoleId,
    lock_clause: &'static str,
) -> AppResult<()> {
    let state = sqlx::query_scalar::<_, String>(&format!(
        "SELECT state FROM roles WHERE id = $1 {lock_clause}"
    ))
    .bind(role_id.as_uuid())
    .fetch_optional(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to lock role '{role_id}': {error}")))?;

    match state.as_deref().map(str::parse::<CatalogState>).transpose()? {
        Some(CatalogState::Active | CatalogState::Inactive) => Ok(()),
        Some(CatalogState::Deleted) | None => Err(AppError::NotFound(format!(
            "role '{role_id}' does not exist"
        ))),
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(database_error)
        if database_error.code().as_deref() == Some("23505"))
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(database_error)
        if database_error.code().as_deref() == Some("23503"))
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    display_name: String,
    description: String,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RoleRow> for Role {
    type Error = AppError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Role::new(
            RoleId::from_uuid(row.id),
            row.name,
            row.display_name,
            row.description,
            row.state.parse()?,
            row.created_at,
            row.updated_at,
        )
    }
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    id: Uuid,
    name: String,
    display_name: String,
    description: String,
    resource: String,
    action: String,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PermissionRow> for Permission {
    type Error = AppError;

    fn try_from(row: PermissionRow) -> Result<Self, Self::Error> {
        Permission::new(
            PermissionId::from_uuid(row.id),
            row.name,
            row.display_name,
            row.description,
            row.resource.parse::<ResourceType>()?,
            row.action.parse::<Action>()?,
            row.state.parse()?,
            row.created_at,
            row.updated_at,
        )
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    id: Uuid,
    role_id: Uuid,
    permission_id: Uuid,
    granted_by: Uuid,
    granted_at: DateTime<Utc>,
    state: String,
    revoked_at: Option<DateTime<Utc>>,
}

impl TryFrom<GrantRow> for RolePermissionGrant {
    type Error = AppError;

    fn try_from(row: GrantRow) -> Result<Self, Self::Error> {
        Ok(RolePermissionGrant::restore(
            row.id,
            RoleId::from_uuid(row.role_id),
            PermissionId::from_uuid(row.permission_id),
            UserId::from_uuid(row.granted_by),
            row.granted_at,
            row.state.parse::<GrantState>()?,
            row.revoked_at,
        ))
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    id: Uuid,
    user_id: Uuid,
    role_id: Uuid,
    assigned_by: Uuid,
    assigned_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    state: String,
    revoked_at: Option<DateTime<Utc>>,
}

impl TryFrom<AssignmentRow> for UserRoleAssignment {
    type Error = AppError;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        Ok(UserRoleAssignment::restore(
            row.id,
            UserId::from_uuid(row.user_id),
            RoleId::from_uuid(row.role_id),
            UserId::from_uuid(row.assigned_by),
            row.assigned_at,
            row.expires_at,
            row.state.parse::<AssignmentState>()?,
            row.revoked_at,
        ))
    }
}

/// One assignment joined with its role and, when present, one active grant
/// and its permission.
#[derive(Debug, FromRow)]
struct AccessRow {
    #[sqlx(flatten)]
    assignment: AssignmentRow,
    role_name: String,
    role_display_name: String,
    role_description: String,
    role_state: String,
    role_created_at: DateTime<Utc>,
    role_updated_at: DateTime<Utc>,
    grant_id: Option<Uuid>,
    granted_by: Option<Uuid>,
    granted_at: Option<DateTime<Utc>>,
    grant_state: Option<String>,
    permission_id: Option<Uuid>,
    permission_name: Option<String>,
    permission_display_name: Option<String>,
    permission_description: Option<String>,
    permission_resource: Option<String>,
    permission_action: Option<String>,
    permission_state: Option<String>,
    permission_created_at: Option<DateTime<Utc>>,
    permission_updated_at: Option<DateTime<Utc>>,
}

impl AccessRow {
    fn split(self) -> AppResult<(UserRoleAssignment, Role, Option<GrantedPermission>)> {
        let role = Role::try_from(RoleRow {
            id: self.assignment.role_id,
            name: self.role_name,
            display_name: self.role_display_name,
            description: self.role_description,
            state: self.role_state,
            created_at: self.role_created_at,
            updated_at: self.role_updated_at,
        })?;
        let role_id = self.assignment.role_id;
        let assignment = UserRoleAssignment::try_from(self.assignment)?;

        let granted = match (
            self.grant_id,
            self.granted_by,
            self.granted_at,
            self.grant_state,
            self.permission_id,
            self.permission_name,
            self.permission_display_name,
            self.permission_description,
            self.permission_resource,
            self.permission_action,
            self.permission_state,
            self.permission_created_at,
            self.permission_updated_at,
        ) {
            (
                Some(grant_id),
                Some(granted_by),
                Some(granted_at),
                Some(grant_state),
                Some(permission_id),
                Some(name),
                Some(display_name),
                Some(description),
                Some(resource),
                Some(action),
                Some(state),
                Some(created_at),
                Some(updated_at),
            ) => Some(GrantedPermission {
                grant: RolePermissionGrant::try_from(GrantRow {
                    id: grant_id,
                    role_id,
                    permission_id,
                    granted_by,
                    granted_at,
                    state: grant_state,
                    revoked_at: None,
                })?,
                permission: Permission::try_from(PermissionRow {
                    id: permission_id,
                    name,
                    display_name,
                    description,
                    resource,
                    action,
                    state,
                    created_at,
                    updated_at,
                })?,
            }),
            _ => None,
        };

        Ok((assignment, role, granted))
    }
}

/// Folds joined rows, ordered by assignment, into one entry per assignment.
fn aggregate_access(rows: Vec<AccessRow>) -> AppResult<Vec<AssignedRole>> {
    let mut access: Vec<AssignedRole> = Vec::new();

    for row in rows {
        let (assignment, role, granted) = row.split()?;

        match access.last_mut() {
            Some(current) if current.assignment.id() == assignment.id() => {
                current.grants.extend(granted);
            }
            _ => access.push(AssignedRole {
                assignment,
                role,
                grants: granted.into_iter().collect(),
            }),
        }
    }

    Ok(access)
}

fn uuids<T>(ids: &[T], as_uuid: fn(&T) -> Uuid) -> Vec<Uuid> {
    ids.iter().map(as_uuid).collect()
}
