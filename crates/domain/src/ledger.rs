use std::str::FromStr;

use atlas_core::{AppError, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{PermissionId, RoleId};

/// Lifecycle of a role-permission grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantState {
    /// Grant contributes its permission to the role.
    Active,
    /// Grant was soft-revoked.
    Revoked,
}

impl GrantState {
    /// Returns a stable storage value for this state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }
}

impl FromStr for GrantState {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            _ => Err(AppError::Validation(format!("unknown grant state '{value}'"))),
        }
    }
}

/// Association between a role and a permission, with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermissionGrant {
    id: Uuid,
    role_id: RoleId,
    permission_id: PermissionId,
    granted_by: UserId,
    granted_at: DateTime<Utc>,
    state: GrantState,
    revoked_at: Option<DateTime<Utc>>,
}

impl RolePermissionGrant {
    /// Creates a new active grant.
    #[must_use]
    pub fn grant(
        role_id: RoleId,
        permission_id: PermissionId,
        granted_by: UserId,
        granted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            role_id,
            permission_id,
            granted_by,
            granted_at,
            state: GrantState::Active,
            revoked_at: None,
        }
    }

    /// Rebuilds a grant from stored values.
    #[must_use]
    pub fn restore(
        id: Uuid,
        role_id: RoleId,
        permission_id: PermissionId,
        granted_by: UserId,
        granted_at: DateTime<Utc>,
        state: GrantState,
        revoked_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            role_id,
            permission_id,
            granted_by,
            granted_at,
            state,
            revoked_at,
        }
    }

    /// Returns the grant record identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the granted role.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Returns the granted permission.
    #[must_use]
    pub fn permission_id(&self) -> PermissionId {
        self.permission_id
    }

    /// Returns the actor who created the grant.
    #[must_use]
    pub fn granted_by(&self) -> UserId {
        self.granted_by
    }

    /// Returns when the grant was created.
    #[must_use]
    pub fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> GrantState {
        self.state
    }

    /// Returns when the grant was revoked, if it was.
    #[must_use]
    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    /// Returns whether the grant contributes its permission.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == GrantState::Active
    }

    /// Soft-revokes the grant.
    pub fn revoke(&mut self, at: DateTime<Utc>) {
        self.state = GrantState::Revoked;
        self.revoked_at = Some(at);
    }
}

/// Lifecycle of a user-role assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentState {
    /// Assignment contributes its role.
    Active,
    /// Assignment was soft-revoked.
    Revoked,
    /// Assignment passed its expiry time.
    Expired,
}

impl AssignmentState {
    /// Returns a stable storage value for this state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

impl FromStr for AssignmentState {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            "expired" => Ok(Self::Expired),
            _ => Err(AppError::Validation(format!(
                "unknown assignment state '{value}'"
            ))),
        }
    }
}

/// Optionally time-bounded association between a user and a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoleAssignment {
    id: Uuid,
    user_id: UserId,
    role_id: RoleId,
    assigned_by: UserId,
    assigned_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    state: AssignmentState,
    revoked_at: Option<DateTime<Utc>>,
}

impl UserRoleAssignment {
    /// Creates a new active assignment.
    #[must_use]
    pub fn assign(
        user_id: UserId,
        role_id: RoleId,
        assigned_by: UserId,
        assigned_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            role_id,
            assigned_by,
            assigned_at,
            expires_at,
            state: AssignmentState::Active,
            revoked_at: None,
        }
    }

    /// Rebuilds an assignment from stored values.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn restore(
        id: Uuid,
        user_id: UserId,
        role_id: RoleId,
        assigned_by: UserId,
        assigned_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        state: AssignmentState,
        revoked_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            user_id,
            role_id,
            assigned_by,
            assigned_at,
            expires_at,
            state,
            revoked_at,
        }
    }

    /// Returns the assignment record identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the assigned user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the assigned role.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Returns the actor who created the assignment.
    #[must_use]
    pub fn assigned_by(&self) -> UserId {
        self.assigned_by
    }

    /// Returns when the assignment was created.
    #[must_use]
    pub fn assigned_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }

    /// Returns the optional expiry time.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns the stored lifecycle state.
    #[must_use]
    pub fn stored_state(&self) -> AssignmentState {
        self.state
    }

    /// Returns when the assignment was revoked, if it was.
    #[must_use]
    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    /// Returns the lifecycle state as observed at `as_of`.
    ///
    /// A stored `Active` state with `expires_at <= as_of` is `Expired`.
    #[must_use]
    pub fn effective_state(&self, as_of: DateTime<Utc>) -> AssignmentState {
        match (self.state, self.expires_at) {
            (AssignmentState::Active, Some(expires_at)) if expires_at <= as_of => {
                AssignmentState::Expired
            }
            (state, _) => state,
        }
    }

    /// Returns whether the assignment contributes its role at `as_of`.
    #[must_use]
    pub fn is_effective(&self, as_of: DateTime<Utc>) -> bool {
        self.effective_state(as_of) == AssignmentState::Active
    }

    /// Soft-revokes the assignment.
    pub fn revoke(&mut self, at: DateTime<Utc>) {
        self.state = AssignmentState::Revoked;
        self.revoked_at = Some(at);
    }

    /// Persists the expired state when the expiry time has passed.
    ///
    /// Returns whether the stored state changed.
    pub fn expire_if_lapsed(&mut self, as_of: DateTime<Utc>) -> bool {
        if self.state == AssignmentState::Active
            && self.effective_state(as_of) == AssignmentState::Expired
        {
            self.state = AssignmentState::Expired;
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use atlas_core::UserId;
    use chrono::{Duration, Utc};

    use super::{AssignmentState, RolePermissionGrant, UserRoleAssignment};
    use crate::{PermissionId, RoleId};

    #[test]
    fn assignment_without_expiry_stays_active() {
        let now = Utc::now();
        let assignment =
            UserRoleAssignment::assign(UserId::new(), RoleId::new(), UserId::new(), now, None);

        assert!(assignment.is_effective(now + Duration::days(3650)));
    }

    #[test]
    fn assignment_past_expiry_is_expired_even_if_stored_active() {
        let now = Utc::now();
        let assignment = UserRoleAssignment::assign(
            UserId::new(),
            RoleId::new(),
            UserId::new(),
            now - Duration::days(2),
            Some(now - Duration::days(1)),
        );

        assert_eq!(assignment.stored_state(), AssignmentState::Active);
        assert_eq!(assignment.effective_state(now), AssignmentState::Expired);
        assert!(!assignment.is_effective(now));
    }

    #[test]
    fn assignment_expiring_exactly_now_is_not_effective() {
        let now = Utc::now();
        let assignment =
            UserRoleAssignment::assign(UserId::new(), RoleId::new(), UserId::new(), now, Some(now));

        assert!(!assignment.is_effective(now));
    }

    #[test]
    fn revoked_assignment_stays_revoked_after_expiry() {
        let now = Utc::now();
        let mut assignment = UserRoleAssignment::assign(
            UserId::new(),
            RoleId::new(),
            UserId::new(),
            now,
            Some(now + Duration::hours(1)),
        );
        assignment.revoke(now);

        assert_eq!(
            assignment.effective_state(now + Duration::days(1)),
            AssignmentState::Revoked
        );
        assert!(!assignment.expire_if_lapsed(now + Duration::days(1)));
    }

    #[test]
    fn expire_if_lapsed_persists_expired_state_once() {
        let now = Utc::now();
        let mut assignment = UserRoleAssignment::assign(
            UserId::new(),
            RoleId::new(),
            UserId::new(),
            now - Duration::hours(2),
            Some(now - Duration::hours(1)),
        );

        assert!(assignment.expire_if_lapsed(now));
        assert_eq!(assignment.stored_state(), AssignmentState::Expired);
        assert!(!assignment.expire_if_lapsed(now));
    }

    #[test]
    fn revoked_grant_records_timestamp() {
        let now = Utc::now();
        let mut grant =
            RolePermissionGrant::grant(RoleId::new(), PermissionId::new(), UserId::new(), now);
        grant.revoke(now);

        assert!(!grant.is_active());
        assert_eq!(grant.revoked_at(), Some(now));
    }
}
