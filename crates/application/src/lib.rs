//! Application services and ports for the access engine.

#![forbid(unsafe_code)]

mod access_ports;
mod authorization_service;
mod ledger_service;
mod registry_service;

#[cfg(test)]
mod test_support;

pub use access_ports::{
    AssignRoleInput, AssignmentStore, BulkAssignRolesInput, BulkOutcome, CreatePermissionInput,
    CreateRoleInput, PermissionStore, RoleStore, UserDirectory,
};
pub use authorization_service::{AuthorizationService, SnapshotLoader};
pub use ledger_service::LedgerService;
pub use registry_service::RegistryService;
