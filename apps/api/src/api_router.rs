use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

pub fn build_router(app_state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/roles",
            get(handlers::list_roles_handler).post(handlers::create_role_handler),
        )
        .route(
            "/api/roles/{role_id}",
            get(handlers::get_role_handler)
                .patch(handlers::update_role_handler)
                .delete(handlers::delete_role_handler),
        )
        .route(
            "/api/roles/{role_id}/deactivate",
            post(handlers::deactivate_role_handler),
        )
        .route(
            "/api/roles/{role_id}/activate",
            post(handlers::activate_role_handler),
        )
        .route(
            "/api/roles/{role_id}/permissions",
            get(handlers::list_role_permissions_handler).post(handlers::grant_permission_handler),
        )
        .route(
            "/api/roles/{role_id}/permissions/bulk",
            post(handlers::bulk_grant_permissions_handler),
        )
        .route(
            "/api/roles/{role_id}/permissions/bulk-revoke",
            post(handlers::bulk_revoke_permissions_handler),
        )
        .route(
            "/api/roles/{role_id}/permissions/{permission_id}",
            delete(handlers::revoke_permission_handler),
        )
        .route(
            "/api/roles/{role_id}/users/bulk",
            post(handlers::bulk_assign_users_handler),
        )
        .route(
            "/api/roles/{role_id}/users/bulk-remove",
            post(handlers::bulk_remove_users_handler),
        )
        .route(
            "/api/permissions",
            get(handlers::list_permissions_handler).post(handlers::create_permission_handler),
        )
        .route(
            "/api/permissions/{permission_id}",
            get(handlers::get_permission_handler).patch(handlers::update_permission_handler),
        )
        .route(
            "/api/permissions/{permission_id}/deactivate",
            post(handlers::deactivate_permission_handler),
        )
        .route(
            "/api/permissions/{permission_id}/activate",
            post(handlers::activate_permission_handler),
        )
        .route(
            "/api/users/{user_id}/roles",
            get(handlers::list_user_roles_handler).post(handlers::assign_role_handler),
        )
        .route(
            "/api/users/{user_id}/roles/{role_id}",
            delete(handlers::remove_role_handler),
        )
        .route("/api/authorization/me", get(handlers::my_access_handler))
        .route(
            "/api/authorization/check",
            post(handlers::check_access_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_actor,
        ));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
