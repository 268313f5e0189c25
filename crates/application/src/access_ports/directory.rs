use async_trait::async_trait;

use atlas_core::{AppResult, UserId};
use atlas_domain::AccountStatus;

/// Port onto the platform's user accounts.
///
/// The engine only needs to know whether an account exists and whether it
/// may act; account management lives elsewhere.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the account status for one user.
    async fn account_status(&self, user_id: UserId) -> AppResult<AccountStatus>;

    /// Returns the subset of `user_ids` that have no account.
    async fn find_missing_users(&self, user_ids: &[UserId]) -> AppResult<Vec<UserId>>;
}
