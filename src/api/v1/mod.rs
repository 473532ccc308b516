//! Versioned API endpoints

pub mod keys;
pub mod otp;
pub mod usage;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use super::middleware::{require_credential, require_tenant};
use super::state::AppState;

/// Create v1 API router with its credential gates
pub fn create_v1_router(state: AppState) -> Router<AppState> {
    let credential_routes = Router::new()
        .route(
            "/projects/{project_id}/keys",
            post(keys::issue_key).get(keys::list_keys),
        )
        .route(
            "/projects/{project_id}/keys/{key_id}",
            delete(keys::revoke_key),
        )
        .route("/otp/send", post(otp::send_otp))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_credential,
        ));

    let tenant_routes = Router::new()
        .route("/usage", get(usage::get_usage))
        .route_layer(middleware::from_fn_with_state(state, require_tenant));

    credential_routes.merge(tenant_routes)
}
