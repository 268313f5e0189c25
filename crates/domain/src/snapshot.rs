//! Point-in-time view of one actor's effective roles and permissions.
//!
//! A snapshot is assembled once per authorization request from rows the
//! stores return, and is never refreshed afterwards. Every check made against
//! it therefore sees the same world state, even if the ledger changes while
//! the request is in flight.

use std::collections::{BTreeMap, BTreeSet};

use atlas_core::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Permission, Role};
use crate::ledger::{RolePermissionGrant, UserRoleAssignment};
use crate::security::{Action, ResourceType, SystemRole};

/// Account status reported by the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Account may act.
    Active,
    /// Account was deactivated.
    Inactive,
    /// No account exists for the identifier.
    Unknown,
}

impl AccountStatus {
    /// Returns a stable value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Unknown => "unknown",
        }
    }

    /// Returns whether the account may act.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self == Self::Active
    }
}

/// One grant together with the permission it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantedPermission {
    /// Grant row.
    pub grant: RolePermissionGrant,
    /// Granted permission.
    pub permission: Permission,
}

/// One assignment together with its role and the role's grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedRole {
    /// Assignment row.
    pub assignment: UserRoleAssignment,
    /// Assigned role.
    pub role: Role,
    /// Grants attached to the role.
    pub grants: Vec<GrantedPermission>,
}

/// Immutable view of one actor's effective access at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSnapshot {
    user_id: UserId,
    as_of: DateTime<Utc>,
    account: AccountStatus,
    roles: BTreeMap<String, BTreeSet<String>>,
    permissions: BTreeSet<String>,
    capabilities: BTreeSet<(ResourceType, Action)>,
    highest_system_role: Option<SystemRole>,
}

impl AccessSnapshot {
    /// Assembles a snapshot from stored access rows.
    ///
    /// Rows that are not effective at `as_of` are dropped: assignments that
    /// are revoked, expired or belong to another user, roles that are not
    /// active, grants that are revoked and permissions that are inactive.
    /// An account that is not active yields a denied snapshot with no roles.
    #[must_use]
    pub fn assemble(
        user_id: UserId,
        account: AccountStatus,
        as_of: DateTime<Utc>,
        access: Vec<AssignedRole>,
    ) -> Self {
        if !account.is_active() {
            return Self::denied(user_id, account, as_of);
        }

        let mut roles: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut permissions = BTreeSet::new();
        let mut capabilities = BTreeSet::new();
        let mut highest_system_role = None;

        for assigned in access {
            let AssignedRole {
                assignment,
                role,
                grants,
            } = assigned;

            if assignment.user_id() != user_id
                || assignment.role_id() != role.id()
                || !assignment.is_effective(as_of)
                || !role.is_active()
            {
                continue;
            }

            if let Some(system_role) = role.system_role() {
                highest_system_role = highest_system_role.max(Some(system_role));
            }

            let role_permissions = roles.entry(role.name().as_str().to_owned()).or_default();

            for GrantedPermission { grant, permission } in grants {
                if !grant.is_active()
                    || grant.role_id() != role.id()
                    || grant.permission_id() != permission.id()
                    || !permission.is_active()
                {
                    continue;
                }

                role_permissions.insert(permission.name().as_str().to_owned());
                permissions.insert(permission.name().as_str().to_owned());
                capabilities.insert((permission.resource(), permission.action()));
            }
        }

        Self {
            user_id,
            as_of,
            account,
            roles,
            permissions,
            capabilities,
            highest_system_role,
        }
    }

    /// Creates a snapshot that denies every check.
    #[must_use]
    pub fn denied(user_id: UserId, account: AccountStatus, as_of: DateTime<Utc>) -> Self {
        Self {
            user_id,
            as_of,
            account,
            roles: BTreeMap::new(),
            permissions: BTreeSet::new(),
            capabilities: BTreeSet::new(),
            highest_system_role: None,
        }
    }

    /// Returns the user the snapshot was loaded for.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the point in time the snapshot reflects.
    #[must_use]
    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    /// Returns the account status observed at load time.
    #[must_use]
    pub fn account_status(&self) -> AccountStatus {
        self.account
    }

    /// Returns whether the snapshot denies every check.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        !self.account.is_active()
    }

    /// Returns effective role names in sorted order.
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    /// Returns the permissions reachable through one effective role.
    #[must_use]
    pub fn role_permissions(&self, role_name: &str) -> Option<&BTreeSet<String>> {
        self.roles.get(role_name)
    }

    /// Returns every reachable permission name.
    #[must_use]
    pub fn permission_names(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Returns every reachable (resource, action) pair.
    #[must_use]
    pub fn capabilities(&self) -> &BTreeSet<(ResourceType, Action)> {
        &self.capabilities
    }

    /// Returns the most privileged reserved role held, if any.
    #[must_use]
    pub fn highest_system_role(&self) -> Option<SystemRole> {
        self.highest_system_role
    }

    pub(crate) fn contains_role(&self, role_name: &str) -> bool {
        self.roles.contains_key(role_name)
    }

    pub(crate) fn contains_permission(&self, permission_name: &str) -> bool {
        self.permissions.contains(permission_name)
    }

    pub(crate) fn contains_capability(&self, resource: ResourceType, action: Action) -> bool {
        self.capabilities.contains(&(resource, action))
    }
}


#[cfg(test)]
mod tests {
    use atlas_core::UserId;
    use chrono::{Duration, Utc};

    use super::fixtures::{assigned, permission, role};
    use super::{AccessSnapshot, AccountStatus, AssignedRole};
    use crate::catalog::CatalogState;
    use crate::ledger::UserRoleAssignment;
    use crate::security::{Action, ResourceType, SystemRole};

    #[test]
    fn assemble_collects_roles_and_permissions() {
        let now = Utc::now();
        let user_id = UserId::new();
        let edit = permission("can_edit_place", ResourceType::Place, Action::Update, now);
        let access = vec![assigned(user_id, role("moderator", now), vec![edit], now)];

        let snapshot = AccessSnapshot::assemble(user_id, AccountStatus::Active, now, access);

        assert_eq!(snapshot.role_names().collect::<Vec<_>>(), vec!["moderator"]);
        assert!(snapshot.permission_names().contains("can_edit_place"));
        assert!(
            snapshot
                .capabilities()
                .contains(&(ResourceType::Place, Action::Update))
        );
        assert_eq!(snapshot.highest_system_role(), Some(SystemRole::Moderator));
        assert!(
            snapshot
                .role_permissions("moderator")
                .is_some_and(|permissions| permissions.contains("can_edit_place"))
        );
    }

    #[test]
    fn assemble_drops_expired_assignments() {
        let now = Utc::now();
        let user_id = UserId::new();
        let admin = role("admin", now);
        let access = vec![AssignedRole {
            assignment: UserRoleAssignment::assign(
                user_id,
                admin.id(),
                UserId::new(),
                now - Duration::days(30),
                Some(now - Duration::days(1)),
            ),
            role: admin,
            grants: Vec::new(),
        }];

        let snapshot = AccessSnapshot::assemble(user_id, AccountStatus::Active, now, access);

        assert_eq!(snapshot.role_names().count(), 0);
        assert_eq!(snapshot.highest_system_role(), None);
    }

    #[test]
    fn assemble_drops_inactive_roles_and_permissions() {
        let now = Utc::now();
        let user_id = UserId::new();
        let mut editor = role("editor", now);
        editor.transition(CatalogState::Inactive, now);
        let mut stale = permission("can_delete_place", ResourceType::Place, Action::Delete, now);
        stale.set_active(false, now);
        let fresh = permission("can_read_place", ResourceType::Place, Action::Read, now);

        let access = vec![
            assigned(user_id, editor, Vec::new(), now),
            assigned(user_id, role("user", now), vec![stale, fresh], now),
        ];

        let snapshot = AccessSnapshot::assemble(user_id, AccountStatus::Active, now, access);

        assert_eq!(snapshot.role_names().collect::<Vec<_>>(), vec!["user"]);
        assert!(!snapshot.permission_names().contains("can_delete_place"));
        assert!(snapshot.permission_names().contains("can_read_place"));
    }

    #[test]
    fn assemble_drops_rows_for_other_users() {
        let now = Utc::now();
        let user_id = UserId::new();
        let access = vec![assigned(UserId::new(), role("admin", now), Vec::new(), now)];

        let snapshot = AccessSnapshot::assemble(user_id, AccountStatus::Active, now, access);

        assert_eq!(snapshot.role_names().count(), 0);
    }

    #[test]
    fn inactive_account_yields_denied_snapshot() {
        let now = Utc::now();
        let user_id = UserId::new();
        let access = vec![assigned(user_id, role("super_admin", now), Vec::new(), now)];

        let snapshot = AccessSnapshot::assemble(user_id, AccountStatus::Inactive, now, access);

        assert!(snapshot.is_denied());
        assert_eq!(snapshot.role_names().count(), 0);
        assert_eq!(snapshot.highest_system_role(), None);
    }

    #[test]
    fn highest_system_role_prefers_most_privileged() {
        let now = Utc::now();
        let user_id = UserId::new();
        let access = vec![
            assigned(user_id, role("user", now), Vec::new(), now),
            assigned(user_id, role("admin", now), Vec::new(), now),
            assigned(user_id, role("moderator", now), Vec::new(), now),
        ];

        let snapshot = AccessSnapshot::assemble(user_id, AccountStatus::Active, now, access);

        assert_eq!(snapshot.highest_system_role(), Some(SystemRole::Admin));
    }
}
