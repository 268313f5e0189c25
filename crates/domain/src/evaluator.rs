//! Pure authorization checks over an [`AccessSnapshot`].
//!
//! None of these functions perform I/O. Every check returns `false` for a
//! denied snapshot.

use crate::security::{Action, ResourceType, SystemRole};
use crate::snapshot::AccessSnapshot;

/// Returns whether the permission is reachable and the account is active.
#[must_use]
pub fn has_permission(snapshot: &AccessSnapshot, permission_name: &str) -> bool {
    !snapshot.is_denied() && snapshot.contains_permission(permission_name)
}

/// Returns whether any of the permissions is reachable.
#[must_use]
pub fn has_any_permission(snapshot: &AccessSnapshot, permission_names: &[&str]) -> bool {
    permission_names
        .iter()
        .any(|permission_name| has_permission(snapshot, permission_name))
}

/// Returns whether the role is effective for the snapshot's user.
#[must_use]
pub fn has_role(snapshot: &AccessSnapshot, role_name: &str) -> bool {
    !snapshot.is_denied() && snapshot.contains_role(role_name)
}

/// Returns whether any of the roles is effective.
#[must_use]
pub fn has_any_role(snapshot: &AccessSnapshot, role_names: &[&str]) -> bool {
    role_names
        .iter()
        .any(|role_name| has_role(snapshot, role_name))
}

/// Returns whether the snapshot holds `required` or a more privileged
/// reserved role.
#[must_use]
pub fn has_system_role_at_least(snapshot: &AccessSnapshot, required: SystemRole) -> bool {
    !snapshot.is_denied()
        && snapshot
            .highest_system_role()
            .is_some_and(|held| held.satisfies(required))
}

/// Returns whether `super_admin` is effective.
#[must_use]
pub fn is_super_admin(snapshot: &AccessSnapshot) -> bool {
    has_system_role_at_least(snapshot, SystemRole::SuperAdmin)
}

/// Returns whether `admin` or `super_admin` is effective.
#[must_use]
pub fn is_admin(snapshot: &AccessSnapshot) -> bool {
    has_system_role_at_least(snapshot, SystemRole::Admin)
}

/// Returns whether `moderator`, `admin` or `super_admin` is effective.
#[must_use]
pub fn is_moderator(snapshot: &AccessSnapshot) -> bool {
    has_system_role_at_least(snapshot, SystemRole::Moderator)
}

/// How a reachable permission matched a requested (action, resource) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantMatch {
    /// A permission with exactly the requested pair is reachable.
    Exact,
    /// Only a `manage` permission on the resource type is reachable.
    Manage,
}

/// Finds the reachable permission that covers the requested pair.
///
/// Super-admin status is not considered here.
#[must_use]
pub fn match_grant(
    snapshot: &AccessSnapshot,
    action: Action,
    resource: ResourceType,
) -> Option<GrantMatch> {
    if snapshot.is_denied() {
        return None;
    }

    if snapshot.contains_capability(resource, action) {
        return Some(GrantMatch::Exact);
    }

    snapshot
        .contains_capability(resource, Action::Manage)
        .then_some(GrantMatch::Manage)
}

/// Returns whether the snapshot may perform `action` on `resource`.
#[must_use]
pub fn can_perform_action(snapshot: &AccessSnapshot, action: Action, resource: ResourceType) -> bool {
    is_super_admin(snapshot) || match_grant(snapshot, action, resource).is_some()
}

/// Returns whether the snapshot may manage every aspect of `resource`.
#[must_use]
pub fn can_manage_resource(snapshot: &AccessSnapshot, resource: ResourceType) -> bool {
    can_perform_action(snapshot, Action::Manage, resource)
}
