use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use atlas_application::UserDirectory;
use atlas_core::{AppError, AppResult, UserId};
use atlas_domain::AccountStatus;

/// PostgreSQL-backed user directory reading the platform `users` table.
#[derive(Clone)]
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    /// Creates a directory with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn account_status(&self, user_id: UserId) -> AppResult<AccountStatus> {
        let is_active =
            sqlx::query_scalar::<_, bool>("SELECT is_active FROM users WHERE id = $1")
                .bind(user_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to read account status: {error}"))
                })?;

        Ok(match is_active {
            Some(true) => AccountStatus::Active,
            Some(false) => AccountStatus::Inactive,
            None => AccountStatus::Unknown,
        })
    }

    async fn find_missing_users(&self, user_ids: &[UserId]) -> AppResult<Vec<UserId>> {
        let requested: Vec<Uuid> = user_ids.iter().map(UserId::as_uuid).collect();
        let existing: HashSet<Uuid> =
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = ANY($1)")
                .bind(requested)
                .fetch_all(&self.pool)
                .await
                .map_err(|error| AppError::Internal(format!("failed to look up users: {error}")))?
                .into_iter()
                .collect();

        Ok(user_ids
            .iter()
            .filter(|user_id| !existing.contains(&user_id.as_uuid()))
            .copied()
            .collect())
    }
}
