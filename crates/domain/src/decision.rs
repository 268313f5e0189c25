use std::fmt::{Display, Formatter};

use atlas_core::UserId;
use serde::{Deserialize, Serialize};

use crate::evaluator::{GrantMatch, is_super_admin, match_grant};
use crate::security::{Action, ResourceType};
use crate::snapshot::AccessSnapshot;

/// Rule that allowed a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowRule {
    /// The actor is a super admin.
    SuperAdminBypass,
    /// A permission with the requested (resource, action) pair is reachable.
    ExplicitGrant,
    /// A `manage` permission on the resource type is reachable.
    ManageGrant,
    /// The actor owns the resource and the action is update or delete.
    OwnershipFallback,
}

impl AllowRule {
    /// Returns a stable value for this rule.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdminBypass => "super_admin_bypass",
            Self::ExplicitGrant => "explicit_grant",
            Self::ManageGrant => "manage_grant",
            Self::OwnershipFallback => "ownership_fallback",
        }
    }
}

/// Reason a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The actor's account is deactivated or unknown.
    AccountInactive,
    /// No rule allowed the request.
    InsufficientPermission,
}

impl DenyReason {
    /// Returns a stable value for this reason.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountInactive => "account_inactive",
            Self::InsufficientPermission => "insufficient_permission",
        }
    }
}

/// Final outcome of an authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "rule", rename_all = "snake_case")]
pub enum Decision {
    /// Request is allowed by the given rule.
    Allow(AllowRule),
    /// Request is denied for the given reason.
    Deny(DenyReason),
}

impl Decision {
    /// Returns whether the request is allowed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

impl Display for Decision {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow(rule) => write!(formatter, "allow ({})", rule.as_str()),
            Self::Deny(reason) => write!(formatter, "deny ({})", reason.as_str()),
        }
    }
}

/// Combines role, grant and ownership signals into a decision.
///
/// Order: super-admin bypass, then explicit or manage grants, then the
/// ownership fallback for update and delete. An unknown owner never matches.
#[must_use]
pub fn decide(
    snapshot: &AccessSnapshot,
    action: Action,
    resource_type: ResourceType,
    resource_owner: Option<UserId>,
    actor: UserId,
) -> Decision {
    if snapshot.is_denied() {
        return Decision::Deny(DenyReason::AccountInactive);
    }

    if is_super_admin(snapshot) {
        return Decision::Allow(AllowRule::SuperAdminBypass);
    }

    match match_grant(snapshot, action, resource_type) {
        Some(GrantMatch::Exact) => return Decision::Allow(AllowRule::ExplicitGrant),
        Some(GrantMatch::Manage) => return Decision::Allow(AllowRule::ManageGrant),
        None => {}
    }

    if action.allows_ownership_fallback() && resource_owner == Some(actor) {
        return Decision::Allow(AllowRule::OwnershipFallback);
    }

    Decision::Deny(DenyReason::InsufficientPermission)
}

#[cfg(test)]
mod tests {
    use atlas_core::UserId;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use proptest::sample::select;
    use uuid::Uuid;

    use super::{AllowRule, Decision, DenyReason, decide};
    use crate::evaluator::{can_perform_action, is_admin, is_moderator, is_super_admin};
    use crate::ledger::UserRoleAssignment;
    use crate::security::{Action, ResourceType};
    use crate::snapshot::fixtures::{assigned, permission, role};
    use crate::snapshot::{AccessSnapshot, AccountStatus, AssignedRole};

    const ROLE_NAMES: &[&str] = &["super_admin", "admin", "moderator", "user", "editor"];

    fn snapshot_for(user_id: UserId, role_names: &[&str]) -> AccessSnapshot {
        let now = Utc::now();
        let access = role_names
            .iter()
            .map(|name| assigned(user_id, role(name, now), Vec::new(), now))
            .collect();
        AccessSnapshot::assemble(user_id, AccountStatus::Active, now, access)
    }

    fn arb_action() -> impl Strategy<Value = Action> {
        select(Action::all().to_vec())
    }

    fn arb_resource() -> impl Strategy<Value = ResourceType> {
        select(ResourceType::all().to_vec())
    }

    fn arb_roles() -> impl Strategy<Value = Vec<&'static str>> {
        proptest::sample::subsequence(ROLE_NAMES.to_vec(), 0..=ROLE_NAMES.len())
    }

    proptest! {
        #[test]
        fn hierarchy_is_monotonic(roles in arb_roles()) {
            let snapshot = snapshot_for(UserId::new(), &roles);

            prop_assert!(!is_super_admin(&snapshot) || is_admin(&snapshot));
            prop_assert!(!is_admin(&snapshot) || is_moderator(&snapshot));
        }

        #[test]
        fn super_admin_is_allowed_everything(
            roles in arb_roles(),
            action in arb_action(),
            resource in arb_resource(),
            owner in proptest::option::of(any::<u128>()),
            actor in any::<u128>(),
        ) {
            let mut roles = roles;
            roles.push("super_admin");
            let snapshot = snapshot_for(UserId::new(), &roles);
            let owner = owner.map(|value| UserId::from_uuid(Uuid::from_u128(value)));
            let actor = UserId::from_uuid(Uuid::from_u128(actor));

            prop_assert_eq!(
                decide(&snapshot, action, resource, owner, actor),
                Decision::Allow(AllowRule::SuperAdminBypass)
            );
        }

        #[test]
        fn ownership_alone_never_grants_create_or_manage(
            action in select(vec![Action::Create, Action::Manage, Action::Read, Action::Moderate]),
            resource in arb_resource(),
        ) {
            let user_id = UserId::new();
            let snapshot = snapshot_for(user_id, &["user"]);

            prop_assert_eq!(
                decide(&snapshot, action, resource, Some(user_id), user_id),
                Decision::Deny(DenyReason::InsufficientPermission)
            );
        }

        #[test]
        fn decision_agrees_with_can_perform_action_when_not_owner(
            roles in arb_roles(),
            action in arb_action(),
            resource in arb_resource(),
        ) {
            let user_id = UserId::new();
            let snapshot = snapshot_for(user_id, &roles);

            prop_assert_eq!(
                decide(&snapshot, action, resource, None, user_id).is_allowed(),
                can_perform_action(&snapshot, action, resource)
            );
        }
    }

    #[test]
    fn scenario_moderator_with_edit_grant_updates_foreign_place() {
        let now = Utc::now();
        let user_id = UserId::new();
        let edit = permission("can_edit_place", ResourceType::Place, Action::Update, now);
        let snapshot = AccessSnapshot::assemble(
            user_id,
            AccountStatus::Active,
            now,
            vec![assigned(user_id, role("moderator", now), vec![edit], now)],
        );

        assert!(can_perform_action(
            &snapshot,
            Action::Update,
            ResourceType::Place
        ));
        assert_eq!(
            decide(
                &snapshot,
                Action::Update,
                ResourceType::Place,
                Some(UserId::new()),
                user_id
            ),
            Decision::Allow(AllowRule::ExplicitGrant)
        );
    }

    #[test]
    fn scenario_owner_deletes_own_place_without_grant() {
        let user_id = UserId::new();
        let snapshot = snapshot_for(user_id, &["user"]);

        assert_eq!(
            decide(
                &snapshot,
                Action::Delete,
                ResourceType::Place,
                Some(user_id),
                user_id
            ),
            Decision::Allow(AllowRule::OwnershipFallback)
        );
    }

    #[test]
    fn scenario_user_cannot_delete_foreign_place() {
        let user_id = UserId::new();
        let snapshot = snapshot_for(user_id, &["user"]);

        assert_eq!(
            decide(
                &snapshot,
                Action::Delete,
                ResourceType::Place,
                Some(UserId::new()),
                user_id
            ),
            Decision::Deny(DenyReason::InsufficientPermission)
        );
    }

    #[test]
    fn scenario_expired_admin_assignment_is_not_admin() {
        let now = Utc::now();
        let user_id = UserId::new();
        let admin = role("admin", now);
        let snapshot = AccessSnapshot::assemble(
            user_id,
            AccountStatus::Active,
            now,
            vec![AssignedRole {
                assignment: UserRoleAssignment::assign(
                    user_id,
                    admin.id(),
                    UserId::new(),
                    now - Duration::days(10),
                    Some(now - Duration::days(1)),
                ),
                role: admin,
                grants: Vec::new(),
            }],
        );

        assert!(!is_admin(&snapshot));
    }

    #[test]
    fn unknown_owner_never_matches_ownership() {
        let user_id = UserId::new();
        let snapshot = snapshot_for(user_id, &["user"]);

        assert_eq!(
            decide(&snapshot, Action::Update, ResourceType::Review, None, user_id),
            Decision::Deny(DenyReason::InsufficientPermission)
        );
    }

    #[test]
    fn inactive_account_is_denied_even_for_owned_resources() {
        let user_id = UserId::new();
        let snapshot = AccessSnapshot::denied(user_id, AccountStatus::Inactive, Utc::now());

        assert_eq!(
            decide(
                &snapshot,
                Action::Update,
                ResourceType::Place,
                Some(user_id),
                user_id
            ),
            Decision::Deny(DenyReason::AccountInactive)
        );
    }

    #[test]
    fn manage_grant_is_reported_as_such() {
        let now = Utc::now();
        let user_id = UserId::new();
        let manage = permission("can_manage_events", ResourceType::Event, Action::Manage, now);
        let snapshot = AccessSnapshot::assemble(
            user_id,
            AccountStatus::Active,
            now,
            vec![assigned(user_id, role("editor", now), vec![manage], now)],
        );

        assert_eq!(
            decide(&snapshot, Action::Moderate, ResourceType::Event, None, user_id),
            Decision::Allow(AllowRule::ManageGrant)
        );
    }
}
