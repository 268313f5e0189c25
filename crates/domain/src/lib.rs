//! Domain entities, invariants and the pure authorization engine.

#![forbid(unsafe_code)]

mod catalog;
mod decision;
mod ledger;
mod security;
mod snapshot;

pub mod evaluator;

pub use catalog::{
    CatalogState, MachineName, Permission, PermissionId, PermissionPatch, Role, RoleId, RolePatch,
};
pub use decision::{AllowRule, Decision, DenyReason, decide};
pub use evaluator::{
    GrantMatch, can_manage_resource, can_perform_action, has_any_permission, has_any_role,
    has_permission, has_role, is_admin, is_moderator, is_super_admin,
};
pub use ledger::{AssignmentState, GrantState, RolePermissionGrant, UserRoleAssignment};
pub use security::{Action, ResourceType, SystemRole};
pub use snapshot::{AccessSnapshot, AccountStatus, AssignedRole, GrantedPermission};
