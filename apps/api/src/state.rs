use atlas_application::{AuthorizationService, LedgerService, RegistryService};
use axum::http::HeaderName;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry_service: RegistryService,
    pub ledger_service: LedgerService,
    pub authorization_service: AuthorizationService,
    pub actor_header: HeaderName,
}
