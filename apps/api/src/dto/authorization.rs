use atlas_domain::{AccessSnapshot, Decision};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::timestamp;

/// One effective role and the permissions reachable through it.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/snapshot-role-response.ts"
)]
pub struct SnapshotRoleResponse {
    pub name: String,
    pub permissions: Vec<String>,
}

/// The caller's access snapshot.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/access-snapshot-response.ts"
)]
pub struct AccessSnapshotResponse {
    pub user_id: String,
    pub as_of: String,
    pub account_status: String,
    pub highest_system_role: Option<String>,
    pub roles: Vec<SnapshotRoleResponse>,
    pub permissions: Vec<String>,
}

impl From<&AccessSnapshot> for AccessSnapshotResponse {
    fn from(value: &AccessSnapshot) -> Self {
        let roles = value
            .role_names()
            .map(|name| SnapshotRoleResponse {
                name: name.to_owned(),
                permissions: value
                    .role_permissions(name)
                    .map(|permissions| permissions.iter().cloned().collect())
                    .unwrap_or_default(),
            })
            .collect();

        Self {
            user_id: value.user_id().to_string(),
            as_of: timestamp(value.as_of()),
            account_status: value.account_status().as_str().to_owned(),
            highest_system_role: value
                .highest_system_role()
                .map(|role| role.as_str().to_owned()),
            roles,
            permissions: value.permission_names().iter().cloned().collect(),
        }
    }
}

/// Incoming payload for an authorization check on behalf of the caller.
///
/// Either `permission` alone, or `action` with `resource_type` and an
/// optional `resource_owner`.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/access-check-request.ts"
)]
pub struct AccessCheckRequest {
    pub permission: Option<String>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_owner: Option<String>,
}

/// Result of an authorization check.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/access-decision-response.ts"
)]
pub struct AccessDecisionResponse {
    pub allowed: bool,
    pub rule: String,
}

impl From<Decision> for AccessDecisionResponse {
    fn from(value: Decision) -> Self {
        let rule = match value {
            Decision::Allow(rule) => rule.as_str(),
            Decision::Deny(reason) => reason.as_str(),
        };

        Self {
            allowed: value.is_allowed(),
            rule: rule.to_owned(),
        }
    }
}
