use std::fmt::{Display, Formatter};
use std::str::FromStr;

use atlas_core::AppError;
use serde::{Deserialize, Serialize};

/// Operations a permission can authorize on a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Create new resources.
    Create,
    /// Read resources.
    Read,
    /// Update existing resources.
    Update,
    /// Delete resources.
    Delete,
    /// Moderate content (approve, hide, flag).
    Moderate,
    /// Every action on the resource type.
    Manage,
}

impl Action {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Moderate => "moderate",
            Self::Manage => "manage",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Action] = &[
            Action::Create,
            Action::Read,
            Action::Update,
            Action::Delete,
            Action::Moderate,
            Action::Manage,
        ];

        ALL
    }

    /// Returns whether a permission carrying this action covers `requested`.
    ///
    /// `manage` covers every action on its resource type.
    #[must_use]
    pub fn covers(&self, requested: Action) -> bool {
        *self == requested || *self == Self::Manage
    }

    /// Returns whether resource owners may perform this action without a grant.
    #[must_use]
    pub fn allows_ownership_fallback(&self) -> bool {
        matches!(self, Self::Update | Self::Delete)
    }
}

impl Display for Action {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "moderate" => Ok(Self::Moderate),
            "manage" => Ok(Self::Manage),
            _ => Err(AppError::Validation(format!("unknown action value '{value}'"))),
        }
    }
}

/// Resource types protected by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Places (points of interest).
    Place,
    /// Visitor reviews attached to places.
    Review,
    /// Place categories.
    Category,
    /// Uploaded images.
    Image,
    /// Events hosted at places.
    Event,
    /// Platform user accounts.
    User,
    /// Access-control roles.
    Role,
    /// Access-control permissions.
    Permission,
}

impl ResourceType {
    /// Returns a stable storage value for this resource type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Place => "place",
            Self::Review => "review",
            Self::Category => "category",
            Self::Image => "image",
            Self::Event => "event",
            Self::User => "user",
            Self::Role => "role",
            Self::Permission => "permission",
        }
    }

    /// Returns all known resource types.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[ResourceType] = &[
            ResourceType::Place,
            ResourceType::Review,
            ResourceType::Category,
            ResourceType::Image,
            ResourceType::Event,
            ResourceType::User,
            ResourceType::Role,
            ResourceType::Permission,
        ];

        ALL
    }
}

impl Display for ResourceType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "place" => Ok(Self::Place),
            "review" => Ok(Self::Review),
            "category" => Ok(Self::Category),
            "image" => Ok(Self::Image),
            "event" => Ok(Self::Event),
            "user" => Ok(Self::User),
            "role" => Ok(Self::Role),
            "permission" => Ok(Self::Permission),
            _ => Err(AppError::Validation(format!(
                "unknown resource type value '{value}'"
            ))),
        }
    }
}

/// The four reserved roles, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemRole {
    /// Regular registered user.
    User,
    /// Content moderator.
    Moderator,
    /// Platform administrator.
    Admin,
    /// Unrestricted administrator.
    SuperAdmin,
}

impl SystemRole {
    /// Returns the reserved machine name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Returns the default display name used when bootstrapping the role.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Moderator => "Moderator",
            Self::Admin => "Administrator",
            Self::SuperAdmin => "Super Administrator",
        }
    }

    /// Returns all reserved roles from least to most privileged.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[SystemRole] = &[
            SystemRole::User,
            SystemRole::Moderator,
            SystemRole::Admin,
            SystemRole::SuperAdmin,
        ];

        ALL
    }

    /// Resolves a role name to a reserved role, if it is one.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|role| role.as_str() == name)
    }

    /// Returns whether the role name is reserved.
    #[must_use]
    pub fn is_reserved(name: &str) -> bool {
        Self::from_name(name).is_some()
    }

    /// Returns whether holding this role satisfies a check for `required`.
    #[must_use]
    pub fn satisfies(&self, required: SystemRole) -> bool {
        *self >= required
    }
}

impl Display for SystemRole {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{Action, ResourceType, SystemRole};

    #[test]
    fn action_roundtrip_storage_value() {
        for action in Action::all() {
            let restored = Action::from_str(action.as_str());
            assert!(matches!(restored, Ok(value) if value == *action));
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(Action::from_str("publish").is_err());
        assert!(Action::from_str("Create").is_err());
    }

    #[test]
    fn unknown_resource_type_is_rejected() {
        assert!(ResourceType::from_str("places").is_err());
    }

    #[test]
    fn manage_covers_every_action() {
        for action in Action::all() {
            assert!(Action::Manage.covers(*action));
        }
        assert!(!Action::Update.covers(Action::Delete));
    }

    #[test]
    fn ownership_fallback_is_limited_to_update_and_delete() {
        let fallback: Vec<Action> = Action::all()
            .iter()
            .copied()
            .filter(Action::allows_ownership_fallback)
            .collect();
        assert_eq!(fallback, vec![Action::Update, Action::Delete]);
    }

    #[test]
    fn system_role_order_is_total() {
        assert!(SystemRole::SuperAdmin.satisfies(SystemRole::Admin));
        assert!(SystemRole::Admin.satisfies(SystemRole::Moderator));
        assert!(SystemRole::Moderator.satisfies(SystemRole::User));
        assert!(!SystemRole::Moderator.satisfies(SystemRole::Admin));
    }

    #[test]
    fn reserved_names_resolve() {
        assert_eq!(
            SystemRole::from_name("super_admin"),
            Some(SystemRole::SuperAdmin)
        );
        assert!(SystemRole::is_reserved("user"));
        assert!(!SystemRole::is_reserved("editor"));
    }
}
