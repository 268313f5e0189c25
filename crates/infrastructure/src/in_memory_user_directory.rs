use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use atlas_application::UserDirectory;
use atlas_core::{AppResult, UserId};
use atlas_domain::AccountStatus;

/// In-memory user directory keyed by user id.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    accounts: RwLock<HashMap<UserId, bool>>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or updates an account.
    pub async fn upsert_user(&self, user_id: UserId, is_active: bool) {
        self.accounts.write().await.insert(user_id, is_active);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn account_status(&self, user_id: UserId) -> AppResult<AccountStatus> {
        Ok(match self.accounts.read().await.get(&user_id) {
            Some(true) => AccountStatus::Active,
            Some(false) => AccountStatus::Inactive,
            None => AccountStatus::Unknown,
        })
    }

    async fn find_missing_users(&self, user_ids: &[UserId]) -> AppResult<Vec<UserId>> {
        let accounts = self.accounts.read().await;

        Ok(user_ids
            .iter()
            .filter(|user_id| !accounts.contains_key(user_id))
            .copied()
            .collect())
    }
}
