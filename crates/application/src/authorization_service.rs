use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use atlas_core::{AppError, AppResult, UserId};
use atlas_domain::{
    AccessSnapshot, Action, AllowRule, Decision, DenyReason, ResourceType, decide,
    has_permission,
};

use crate::access_ports::{AssignmentStore, UserDirectory};

/// Loads immutable access snapshots from the ledger.
#[derive(Clone)]
pub struct SnapshotLoader {
    directory: Arc<dyn UserDirectory>,
    assignments: Arc<dyn AssignmentStore>,
}

impl SnapshotLoader {
    /// Creates a new loader from port implementations.
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>, assignments: Arc<dyn AssignmentStore>) -> Self {
        Self {
            directory,
            assignments,
        }
    }

    /// Loads the effective roles and permissions of a user at `as_of`.
    ///
    /// Inactive and unknown accounts yield a denied snapshot without reading
    /// the ledger.
    pub async fn load_snapshot(
        &self,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> AppResult<AccessSnapshot> {
        let account = self.directory.account_status(user_id).await?;
        if !account.is_active() {
            debug!(user_id = %user_id, account = account.as_str(), "denied snapshot");
            return Ok(AccessSnapshot::denied(user_id, account, as_of));
        }

        let access = self.assignments.load_access(user_id, as_of).await?;
        Ok(AccessSnapshot::assemble(user_id, account, as_of, access))
    }
}

/// Application service combining snapshot loading with decisions.
#[derive(Clone)]
pub struct AuthorizationService {
    loader: SnapshotLoader,
}

impl AuthorizationService {
    /// Creates a new authorization service.
    #[must_use]
    pub fn new(loader: SnapshotLoader) -> Self {
        Self { loader }
    }

    /// Loads the current snapshot of a user.
    pub async fn snapshot(&self, user_id: UserId) -> AppResult<AccessSnapshot> {
        self.loader.load_snapshot(user_id, Utc::now()).await
    }

    /// Decides whether the actor may perform `action` on a resource.
    pub async fn authorize(
        &self,
        actor: UserId,
        action: Action,
        resource_type: ResourceType,
        resource_owner: Option<UserId>,
    ) -> AppResult<Decision> {
        let snapshot = self.snapshot(actor).await?;
        let decision = decide(&snapshot, action, resource_type, resource_owner, actor);

        info!(
            actor = %actor,
            action = %action,
            resource_type = %resource_type,
            resource_owner = ?resource_owner.map(|owner| owner.to_string()),
            decision = %decision,
            "authorization decided"
        );
        Ok(decision)
    }

    /// Fails unless the actor may perform `action` on a resource.
    pub async fn require_action(
        &self,
        actor: UserId,
        action: Action,
        resource_type: ResourceType,
        resource_owner: Option<UserId>,
    ) -> AppResult<()> {
        match self
            .authorize(actor, action, resource_type, resource_owner)
            .await?
        {
            Decision::Allow(_) => Ok(()),
            Decision::Deny(DenyReason::AccountInactive) => Err(AppError::AccountInactive(
                format!("account '{actor}' is not active"),
            )),
            Decision::Deny(DenyReason::InsufficientPermission) => Err(AppError::Forbidden(
                format!("actor '{actor}' may not {action} {resource_type}"),
            )),
        }
    }

    /// Fails unless the actor may manage every aspect of `resource_type`.
    pub async fn require_manage(&self, actor: UserId, resource_type: ResourceType) -> AppResult<()> {
        self.require_action(actor, Action::Manage, resource_type, None)
            .await
    }

    /// Decides whether the named permission is reachable for the actor.
    pub async fn check_permission(
        &self,
        actor: UserId,
        permission_name: &str,
    ) -> AppResult<Decision> {
        let snapshot = self.snapshot(actor).await?;
        let decision = if snapshot.is_denied() {
            Decision::Deny(DenyReason::AccountInactive)
        } else if has_permission(&snapshot, permission_name) {
            Decision::Allow(AllowRule::ExplicitGrant)
        } else {
            Decision::Deny(DenyReason::InsufficientPermission)
        };

        info!(
            actor = %actor,
            permission = permission_name,
            decision = %decision,
            "permission check decided"
        );
        Ok(decision)
    }

    /// Fails unless the named permission is reachable for the actor.
    pub async fn require_permission(&self, actor: UserId, permission_name: &str) -> AppResult<()> {
        match self.check_permission(actor, permission_name).await? {
            Decision::Allow(_) => Ok(()),
            Decision::Deny(DenyReason::AccountInactive) => Err(AppError::AccountInactive(
                format!("account '{actor}' is not active"),
            )),
            Decision::Deny(DenyReason::InsufficientPermission) => Err(AppError::Forbidden(
                format!("actor '{actor}' is missing permission '{permission_name}'"),
            )),
        }
    }
}
