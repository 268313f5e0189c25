use atlas_domain::Action;

use super::*;
use crate::dto::{AccessCheckRequest, AccessDecisionResponse, AccessSnapshotResponse};

pub async fn my_access_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
) -> ApiResult<Json<AccessSnapshotResponse>> {
    let snapshot = state
        .authorization_service
        .snapshot(actor.user_id())
        .await?;

    Ok(Json(AccessSnapshotResponse::from(&snapshot)))
}

pub async fn check_access_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Json(payload): Json<AccessCheckRequest>,
) -> ApiResult<Json<AccessDecisionResponse>> {
    let decision = match payload {
        AccessCheckRequest {
            permission: Some(permission),
            action: None,
            resource_type: None,
            resource_owner: None,
        } => {
            state
                .authorization_service
                .check_permission(actor.user_id(), permission.as_str())
                .await?
        }
        AccessCheckRequest {
            permission: None,
            action: Some(action),
            resource_type: Some(resource_type),
            resource_owner,
        } => {
            let resource_owner = resource_owner
                .as_deref()
                .map(UserId::from_str)
                .transpose()?;

            state
                .authorization_service
                .authorize(
                    actor.user_id(),
                    action.parse::<Action>()?,
                    resource_type.parse::<ResourceType>()?,
                    resource_owner,
                )
                .await?
        }
        _ => {
            return Err(AppError::Validation(
                "provide either 'permission' or 'action' with 'resource_type'".to_owned(),
            )
            .into());
        }
    };

    Ok(Json(AccessDecisionResponse::from(decision)))
}
