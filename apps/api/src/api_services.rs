use std::sync::Arc;

use atlas_application::{
    AssignRoleInput, AssignmentStore, AuthorizationService, LedgerService, PermissionStore,
    RegistryService, RoleStore, SnapshotLoader, UserDirectory,
};
use atlas_core::{AppError, UserId};
use atlas_domain::SystemRole;
use atlas_infrastructure::{
    InMemoryAccessRepository, InMemoryUserDirectory, MIGRATOR, PostgresAccessRepository,
    PostgresUserDirectory,
};
use axum::http::HeaderName;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::api_config::{ApiConfig, StoreBackend};
use crate::state::AppState;

pub async fn connect_and_migrate(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

/// Port implementations behind the application services.
pub struct AccessPorts {
    pub roles: Arc<dyn RoleStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub assignments: Arc<dyn AssignmentStore>,
    pub directory: Arc<dyn UserDirectory>,
}

impl AccessPorts {
    pub fn postgres(pool: PgPool) -> Self {
        let repository = Arc::new(PostgresAccessRepository::new(pool.clone()));

        Self {
            roles: repository.clone(),
            permissions: repository.clone(),
            assignments: repository,
            directory: Arc::new(PostgresUserDirectory::new(pool)),
        }
    }

    pub async fn in_memory(active_users: &[UserId]) -> Self {
        let repository = Arc::new(InMemoryAccessRepository::new());
        let directory = InMemoryUserDirectory::new();
        for user_id in active_users {
            directory.upsert_user(*user_id, true).await;
        }

        Self {
            roles: repository.clone(),
            permissions: repository.clone(),
            assignments: repository,
            directory: Arc::new(directory),
        }
    }
}

pub fn build_app_state(ports: AccessPorts, actor_header: HeaderName) -> AppState {
    let registry_service = RegistryService::new(ports.roles.clone(), ports.permissions.clone());
    let ledger_service = LedgerService::new(
        ports.roles,
        ports.permissions,
        ports.assignments.clone(),
        ports.directory.clone(),
    );
    let authorization_service =
        AuthorizationService::new(SnapshotLoader::new(ports.directory, ports.assignments));

    AppState {
        registry_service,
        ledger_service,
        authorization_service,
        actor_header,
    }
}

pub async fn build_ports(config: &ApiConfig) -> Result<AccessPorts, AppError> {
    match &config.store {
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = connect_and_migrate(database_url, *max_connections).await?;
            info!(store = "postgres", "access stores ready");
            Ok(AccessPorts::postgres(pool))
        }
        StoreBackend::Memory => {
            let users = config.memory_users();
            info!(store = "memory", users = users.len(), "access stores ready");
            Ok(AccessPorts::in_memory(&users).await)
        }
    }
}

/// Ensures the reserved roles exist and, when configured, that the bootstrap
/// account holds `super_admin`.
pub async fn bootstrap_access(
    state: &AppState,
    super_admin: Option<UserId>,
) -> Result<(), AppError> {
    let roles = state.registry_service.bootstrap_system_roles().await?;
    info!(roles = roles.len(), "reserved roles ready");

    let Some(user_id) = super_admin else {
        return Ok(());
    };

    let role = roles
        .iter()
        .find(|role| role.system_role() == Some(SystemRole::SuperAdmin))
        .ok_or_else(|| AppError::Internal("super_admin role missing after bootstrap".to_owned()))?;

    match state
        .ledger_service
        .assign_role(AssignRoleInput {
            user_id,
            role_id: role.id(),
            assigned_by: user_id,
            expires_at: None,
        })
        .await
    {
        Ok(_) => {
            info!(user_id = %user_id, "bootstrap super admin assigned");
            Ok(())
        }
        Err(AppError::AlreadyAssigned(_)) => Ok(()),
        Err(error) => Err(error),
    }
}
