use atlas_application::{AssignRoleInput, BulkAssignRolesInput};
use chrono::Utc;

use super::*;
use crate::dto::{AssignRoleRequest, BulkOutcomeResponse, BulkUsersRequest, RoleAssignmentResponse};

/// Active users may read their own history; everyone else needs role
/// management.
pub async fn list_user_roles_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<RoleAssignmentResponse>>> {
    let user_id = UserId::from_uuid(user_id);
    if actor.user_id() == user_id {
        let snapshot = state.authorization_service.snapshot(user_id).await?;
        if snapshot.is_denied() {
            return Err(AppError::AccountInactive(format!(
                "account '{user_id}' is not active"
            ))
            .into());
        }
    } else {
        require_manage(&state, &actor, ResourceType::Role).await?;
    }

    let now = Utc::now();
    let assignments = state
        .ledger_service
        .list_user_assignments(user_id)
        .await?
        .iter()
        .map(|assignment| RoleAssignmentResponse::from_assignment(assignment, now))
        .collect();

    Ok(Json(assignments))
}

pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<AssignRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleAssignmentResponse>)> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    let assignment = state
        .ledger_service
        .assign_role(AssignRoleInput {
            user_id: UserId::from_uuid(user_id),
            role_id: parse_role_id(payload.role_id.as_str())?,
            assigned_by: actor.user_id(),
            expires_at: payload.expires_at,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RoleAssignmentResponse::from_assignment(
            &assignment,
            Utc::now(),
        )),
    ))
}

pub async fn remove_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path((user_id, role_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    state
        .ledger_service
        .remove_role(UserId::from_uuid(user_id), RoleId::from_uuid(role_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_assign_users_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<BulkUsersRequest>,
) -> ApiResult<Json<BulkOutcomeResponse>> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    let outcome = state
        .ledger_service
        .bulk_assign_roles(BulkAssignRolesInput {
            user_ids: parse_user_ids(&payload.user_ids)?,
            role_id: RoleId::from_uuid(role_id),
            assigned_by: actor.user_id(),
            expires_at: payload.expires_at,
        })
        .await?;

    Ok(Json(BulkOutcomeResponse::from(outcome)))
}

pub async fn bulk_remove_users_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<BulkUsersRequest>,
) -> ApiResult<Json<BulkOutcomeResponse>> {
    require_manage(&state, &actor, ResourceType::Role).await?;

    let user_ids = parse_user_ids(&payload.user_ids)?;
    let outcome = state
        .ledger_service
        .bulk_remove_roles(RoleId::from_uuid(role_id), &user_ids)
        .await?;

    Ok(Json(BulkOutcomeResponse::from(outcome)))
}
