use atlas_core::{ActorIdentity, AppError, UserId};
use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::{HeaderName, StatusCode};
use uuid::Uuid;

use super::{
    assign_role_handler, bulk_assign_users_handler, check_access_handler,
    create_permission_handler, create_role_handler, delete_role_handler,
    grant_permission_handler, list_roles_handler, list_user_roles_handler, my_access_handler,
};
use crate::api_services::{AccessPorts, bootstrap_access, build_app_state};
use crate::dto::{
    AccessCheckRequest, AssignRoleRequest, BulkUsersRequest, CreatePermissionRequest,
    CreateRoleRequest, GrantPermissionRequest, PermissionResponse, RoleResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

struct Fixture {
    state: AppState,
    admin: ActorIdentity,
    member: ActorIdentity,
}

async fn fixture() -> Fixture {
    let admin = UserId::new();
    let member = UserId::new();
    let ports = AccessPorts::in_memory(&[admin, member]).await;
    let state = build_app_state(ports, HeaderName::from_static("x-actor-id"));

    let bootstrapped = bootstrap_access(&state, Some(admin)).await;
    assert!(bootstrapped.is_ok());

    Fixture {
        state,
        admin: ActorIdentity::new(admin, None),
        member: ActorIdentity::new(member, Some("req-1".to_owned())),
    }
}

async fn create_role(fixture: &Fixture, name: &str) -> RoleResponse {
    let created = create_role_handler(
        State(fixture.state.clone()),
        Extension(fixture.admin.clone()),
        Json(CreateRoleRequest {
            name: name.to_owned(),
            display_name: name.to_owned(),
            description: String::new(),
        }),
    )
    .await;

    let Ok((status, Json(role))) = created else {
        panic!("role '{name}' should be created");
    };
    assert_eq!(status, StatusCode::CREATED);
    role
}

async fn create_permission(
    fixture: &Fixture,
    name: &str,
    resource: &str,
    action: &str,
) -> PermissionResponse {
    let created = create_permission_handler(
        State(fixture.state.clone()),
        Extension(fixture.admin.clone()),
        Json(CreatePermissionRequest {
            name: name.to_owned(),
            display_name: name.to_owned(),
            description: String::new(),
            resource: resource.to_owned(),
            action: action.to_owned(),
        }),
    )
    .await;

    let Ok((status, Json(permission))) = created else {
        panic!("permission '{name}' should be created");
    };
    assert_eq!(status, StatusCode::CREATED);
    permission
}

fn parse_id(value: &str) -> Uuid {
    Uuid::parse_str(value).unwrap_or_else(|_| unreachable!())
}

async fn check(
    fixture: &Fixture,
    actor: &ActorIdentity,
    request: AccessCheckRequest,
) -> Result<(bool, String), ApiError> {
    let Json(response) = check_access_handler(
        State(fixture.state.clone()),
        Extension(actor.clone()),
        Json(request),
    )
    .await?;
    Ok((response.allowed, response.rule))
}

#[tokio::test]
async fn admin_endpoints_require_manage_permission() {
    let fixture = fixture().await;

    let listed = list_roles_handler(
        State(fixture.state.clone()),
        Extension(fixture.admin.clone()),
    )
    .await;
    let Ok(Json(roles)) = listed else {
        panic!("super admin should list roles");
    };
    assert!(roles.iter().any(|role| role.name == "super_admin" && role.is_system));

    let forbidden = list_roles_handler(
        State(fixture.state.clone()),
        Extension(fixture.member.clone()),
    )
    .await;
    assert!(matches!(forbidden, Err(ApiError(AppError::Forbidden(_)))));

    let stranger = list_roles_handler(
        State(fixture.state.clone()),
        Extension(ActorIdentity::new(UserId::new(), None)),
    )
    .await;
    assert!(matches!(stranger, Err(ApiError(AppError::AccountInactive(_)))));
}

#[tokio::test]
async fn reserved_roles_cannot_be_deleted() {
    let fixture = fixture().await;
    let listed = list_roles_handler(
        State(fixture.state.clone()),
        Extension(fixture.admin.clone()),
    )
    .await;
    let Ok(Json(roles)) = listed else {
        panic!("super admin should list roles");
    };
    let Some(moderator) = roles.iter().find(|role| role.name == "moderator") else {
        panic!("moderator should be bootstrapped");
    };

    let deleted = delete_role_handler(
        State(fixture.state.clone()),
        Extension(fixture.admin.clone()),
        Path(parse_id(&moderator.role_id)),
    )
    .await;

    assert!(matches!(deleted, Err(ApiError(AppError::SystemProtected(_)))));
}

#[tokio::test]
async fn granted_role_flows_into_checks() {
    let fixture = fixture().await;
    let editor = create_role(&fixture, "editor").await;
    let edit_place = create_permission(&fixture, "can_edit_place", "place", "update").await;

    let granted = grant_permission_handler(
        State(fixture.state.clone()),
        Extension(fixture.admin.clone()),
        Path(parse_id(&editor.role_id)),
        Json(GrantPermissionRequest {
            permission_id: edit_place.permission_id.clone(),
        }),
    )
    .await;
    assert!(matches!(granted, Ok((status, _)) if status == StatusCode::CREATED));

    let assigned = assign_role_handler(
        State(fixture.state.clone()),
        Extension(fixture.admin.clone()),
        Path(fixture.member.user_id().as_uuid()),
        Json(AssignRoleRequest {
            role_id: editor.role_id.clone(),
            expires_at: None,
        }),
    )
    .await;
    let Ok((status, Json(assignment))) = assigned else {
        panic!("editor should be assigned");
    };
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(assignment.effective_state, "active");
    assert_eq!(assignment.assigned_by, fixture.admin.user_id().to_string());

    let by_capability = check(
        &fixture,
        &fixture.member,
        AccessCheckRequest {
            action: Some("update".to_owned()),
            resource_type: Some("place".to_owned()),
            ..AccessCheckRequest::default()
        },
    )
    .await;
    assert!(matches!(by_capability, Ok((true, ref rule)) if rule == "explicit_grant"));

    let by_name = check(
        &fixture,
        &fixture.member,
        AccessCheckRequest {
            permission: Some("can_edit_place".to_owned()),
            ..AccessCheckRequest::default()
        },
    )
    .await;
    assert!(matches!(by_name, Ok((true, _))));

    let owned_delete = check(
        &fixture,
        &fixture.member,
        AccessCheckRequest {
            action: Some("delete".to_owned()),
            resource_type: Some("review".to_owned()),
            resource_owner: Some(fixture.member.user_id().to_string()),
            ..AccessCheckRequest::default()
        },
    )
    .await;
    assert!(matches!(owned_delete, Ok((true, ref rule)) if rule == "ownership_fallback"));

    let foreign_delete = check(
        &fixture,
        &fixture.member,
        AccessCheckRequest {
            action: Some("delete".to_owned()),
            resource_type: Some("review".to_owned()),
            resource_owner: Some(fixture.admin.user_id().to_string()),
            ..AccessCheckRequest::default()
        },
    )
    .await;
    assert!(
        matches!(foreign_delete, Ok((false, ref rule)) if rule == "insufficient_permission")
    );

    let me = my_access_handler(
        State(fixture.state.clone()),
        Extension(fixture.member.clone()),
    )
    .await;
    let Ok(Json(snapshot)) = me else {
        panic!("member snapshot should load");
    };
    assert_eq!(snapshot.account_status, "active");
    assert_eq!(snapshot.permissions, vec!["can_edit_place".to_owned()]);
    assert!(snapshot.roles.iter().any(|role| role.name == "editor"));
}

#[tokio::test]
async fn check_request_must_pick_one_form() {
    let fixture = fixture().await;

    let empty = check(&fixture, &fixture.member, AccessCheckRequest::default()).await;
    assert!(matches!(empty, Err(ApiError(AppError::Validation(_)))));

    let mixed = check(
        &fixture,
        &fixture.member,
        AccessCheckRequest {
            permission: Some("can_edit_place".to_owned()),
            action: Some("update".to_owned()),
            resource_type: Some("place".to_owned()),
            resource_owner: None,
        },
    )
    .await;
    assert!(matches!(mixed, Err(ApiError(AppError::Validation(_)))));

    let unknown_action = check(
        &fixture,
        &fixture.member,
        AccessCheckRequest {
            action: Some("teleport".to_owned()),
            resource_type: Some("place".to_owned()),
            ..AccessCheckRequest::default()
        },
    )
    .await;
    assert!(matches!(unknown_action, Err(ApiError(AppError::Validation(_)))));
}

#[tokio::test]
async fn bulk_assignment_is_idempotent() {
    let fixture = fixture().await;
    let reviewer = create_role(&fixture, "reviewer").await;
    let member_id = fixture.member.user_id().to_string();

    let request = || BulkUsersRequest {
        user_ids: vec![member_id.clone(), member_id.clone()],
        expires_at: None,
    };

    let first = bulk_assign_users_handler(
        State(fixture.state.clone()),
        Extension(fixture.admin.clone()),
        Path(parse_id(&reviewer.role_id)),
        Json(request()),
    )
    .await;
    assert!(matches!(first, Ok(Json(ref outcome)) if outcome.applied == 1 && outcome.skipped == 0));

    let second = bulk_assign_users_handler(
        State(fixture.state.clone()),
        Extension(fixture.admin.clone()),
        Path(parse_id(&reviewer.role_id)),
        Json(request()),
    )
    .await;
    assert!(matches!(second, Ok(Json(ref outcome)) if outcome.applied == 0 && outcome.skipped == 1));

    let unknown_user = bulk_assign_users_handler(
        State(fixture.state.clone()),
        Extension(fixture.admin.clone()),
        Path(parse_id(&reviewer.role_id)),
        Json(BulkUsersRequest {
            user_ids: vec![UserId::new().to_string()],
            expires_at: None,
        }),
    )
    .await;
    assert!(matches!(unknown_user, Err(ApiError(AppError::NotFound(_)))));
}

#[tokio::test]
async fn users_may_read_only_their_own_history() {
    let fixture = fixture().await;

    let own = list_user_roles_handler(
        State(fixture.state.clone()),
        Extension(fixture.member.clone()),
        Path(fixture.member.user_id().as_uuid()),
    )
    .await;
    assert!(matches!(own, Ok(Json(ref history)) if history.is_empty()));

    let foreign = list_user_roles_handler(
        State(fixture.state.clone()),
        Extension(fixture.member.clone()),
        Path(fixture.admin.user_id().as_uuid()),
    )
    .await;
    assert!(matches!(foreign, Err(ApiError(AppError::Forbidden(_)))));

    let by_admin = list_user_roles_handler(
        State(fixture.state.clone()),
        Extension(fixture.admin.clone()),
        Path(fixture.admin.user_id().as_uuid()),
    )
    .await;
    assert!(matches!(by_admin, Ok(Json(ref history)) if history.len() == 1));
}

#[tokio::test]
async fn unknown_account_cannot_read_own_history() {
    let fixture = fixture().await;
    let stranger = ActorIdentity::new(UserId::new(), None);

    let own = list_user_roles_handler(
        State(fixture.state.clone()),
        Extension(stranger.clone()),
        Path(stranger.user_id().as_uuid()),
    )
    .await;

    assert!(matches!(own, Err(ApiError(AppError::AccountInactive(_)))));
}
