use serde::{Deserialize, Serialize};

use crate::UserId;

/// Caller identity resolved by the upstream authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    user_id: UserId,
    request_id: Option<String>,
}

impl ActorIdentity {
    /// Creates an actor identity for an authenticated user.
    #[must_use]
    pub fn new(user_id: UserId, request_id: Option<String>) -> Self {
        Self {
            user_id,
            request_id,
        }
    }

    /// Returns the authenticated user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the correlation id forwarded by the gateway, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}
