mod directory;
mod inputs;
mod stores;

pub use directory::UserDirectory;
pub use inputs::{
    AssignRoleInput, BulkAssignRolesInput, BulkOutcome, CreatePermissionInput, CreateRoleInput,
};
pub use stores::{AssignmentStore, PermissionStore, RoleStore};
