use std::fmt::{Display, Formatter};
use std::str::FromStr;

use atlas_core::{AppError, AppResult, NonEmptyString};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::security::{Action, ResourceType, SystemRole};

const MACHINE_NAME_MAX_LENGTH: usize = 64;

/// Unique identifier for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Unique identifier for a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionId(Uuid);

impl PermissionId {
    /// Creates a random permission identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a permission identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PermissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for PermissionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validated machine key used as the unique name of roles and permissions.
///
/// Machine keys are lowercase ASCII, start with a letter and may contain
/// digits, `_`, `.` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MachineName(String);

impl MachineName {
    /// Creates a validated machine name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "machine name must not be empty".to_owned(),
            ));
        }

        if trimmed.len() > MACHINE_NAME_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "machine name '{trimmed}' exceeds {MACHINE_NAME_MAX_LENGTH} characters"
            )));
        }

        let mut characters = trimmed.chars();
        let starts_with_letter = characters
            .next()
            .is_some_and(|character| character.is_ascii_lowercase());
        let rest_is_valid = characters.all(|character| {
            character.is_ascii_lowercase()
                || character.is_ascii_digit()
                || matches!(character, '_' | '.' | '-')
        });

        if !starts_with_letter || !rest_is_valid {
            return Err(AppError::Validation(format!(
                "machine name '{trimmed}' must start with a lowercase letter and contain only lowercase letters, digits, '_', '.' or '-'"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for MachineName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Lifecycle of catalog entries (roles and permissions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogState {
    /// Entry participates in authorization.
    Active,
    /// Entry is kept but contributes nothing to snapshots.
    Inactive,
    /// Entry was removed; retained only for audit history.
    Deleted,
}

impl CatalogState {
    /// Returns a stable storage value for this state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Deleted => "deleted",
        }
    }
}

impl FromStr for CatalogState {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "deleted" => Ok(Self::Deleted),
            _ => Err(AppError::Validation(format!(
                "unknown catalog state '{value}'"
            ))),
        }
    }
}

/// Partial update for a role. The machine name is immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePatch {
    /// New display name.
    pub display_name: Option<String>,
    /// New description.
    pub description: Option<String>,
}

/// Named bundle of permissions assignable to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: MachineName,
    display_name: NonEmptyString,
    description: String,
    state: CatalogState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Role {
    /// Creates a new active role.
    pub fn create(
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        Self::new(
            RoleId::new(),
            name,
            display_name,
            description,
            CatalogState::Active,
            now,
            now,
        )
    }

    /// Rebuilds a role from stored values, validating its fields.
    pub fn new(
        id: RoleId,
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        state: CatalogState,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            name: MachineName::new(name)?,
            display_name: NonEmptyString::new(display_name)?,
            description: description.into(),
            state,
            created_at,
            updated_at,
        })
    }

    /// Returns the role identifier.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the immutable machine name.
    #[must_use]
    pub fn name(&self) -> &MachineName {
        &self.name
    }

    /// Returns the human-friendly name.
    #[must_use]
    pub fn display_name(&self) -> &NonEmptyString {
        &self.display_name
    }

    /// Returns the free-form description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> CatalogState {
        self.state
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the reserved role this entry represents, if any.
    #[must_use]
    pub fn system_role(&self) -> Option<SystemRole> {
        SystemRole::from_name(self.name.as_str())
    }

    /// Returns whether the role is one of the four reserved roles.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.system_role().is_some()
    }

    /// Returns whether the role currently participates in authorization.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == CatalogState::Active
    }

    /// Returns whether the role was deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.state == CatalogState::Deleted
    }

    /// Applies a partial update.
    pub fn apply_patch(&mut self, patch: RolePatch, now: DateTime<Utc>) -> AppResult<()> {
        if let Some(display_name) = patch.display_name {
            self.display_name = NonEmptyString::new(display_name)?;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Moves the role to another lifecycle state.
    pub fn transition(&mut self, state: CatalogState, now: DateTime<Utc>) {
        self.state = state;
        self.updated_at = now;
    }
}

/// Partial update for a permission. The machine name is immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionPatch {
    /// New display name.
    pub display_name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New resource tag.
    pub resource: Option<ResourceType>,
    /// New action tag.
    pub action: Option<Action>,
}

/// Atomic (resource, action) capability grantable to roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    id: PermissionId,
    name: MachineName,
    display_name: NonEmptyString,
    description: String,
    resource: ResourceType,
    action: Action,
    state: CatalogState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Permission {
    /// Creates a new active permission.
    pub fn create(
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        resource: ResourceType,
        action: Action,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        Self::new(
            PermissionId::new(),
            name,
            display_name,
            description,
            resource,
            action,
            CatalogState::Active,
            now,
            now,
        )
    }

    /// Rebuilds a permission from stored values, validating its fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: PermissionId,
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        resource: ResourceType,
        action: Action,
        state: CatalogState,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        if state == CatalogState::Deleted {
            return Err(AppError::Validation(
                "permissions cannot be in the deleted state".to_owned(),
            ));
        }

        Ok(Self {
            id,
            name: MachineName::new(name)?,
            display_name: NonEmptyString::new(display_name)?,
            description: description.into(),
            resource,
            action,
            state,
            created_at,
            updated_at,
        })
    }

    /// Returns the permission identifier.
    #[must_use]
    pub fn id(&self) -> PermissionId {
        self.id
    }

    /// Returns the immutable machine name.
    #[must_use]
    pub fn name(&self) -> &MachineName {
        &self.name
    }

    /// Returns the human-friendly name.
    #[must_use]
    pub fn display_name(&self) -> &NonEmptyString {
        &self.display_name
    }

    /// Returns the free-form description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the resource tag.
    #[must_use]
    pub fn resource(&self) -> ResourceType {
        self.resource
    }

    /// Returns the action tag.
    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> CatalogState {
        self.state
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns whether the permission currently participates in authorization.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == CatalogState::Active
    }

    /// Applies a partial update.
    pub fn apply_patch(&mut self, patch: PermissionPatch, now: DateTime<Utc>) -> AppResult<()> {
        if let Some(display_name) = patch.display_name {
            self.display_name = NonEmptyString::new(display_name)?;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(resource) = patch.resource {
            self.resource = resource;
        }
        if let Some(action) = patch.action {
            self.action = action;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Moves the permission between the active and inactive states.
    pub fn set_active(&mut self, active: bool, now: DateTime<Utc>) {
        self.state = if active {
            CatalogState::Active
        } else {
            CatalogState::Inactive
        };
        self.updated_at = now;
    }
}
