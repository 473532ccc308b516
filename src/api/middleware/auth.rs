//! Credential gate middleware and the typed context extractor

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::auth::{AccessScope, AuthContext};
use crate::infrastructure::auth::CredentialGate;

const API_KEY_HEADER: &str = "x-api-key";

/// Paths served without credentials
pub const PUBLIC_PATHS: [&str; 3] = ["/health", "/live", "/ready"];

pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

/// Gate for routes that accept API keys and session tokens
pub async fn require_credential(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    authenticate(state, AccessScope::Any, request, next).await
}

/// Gate for routes that need a project-scoped API key
pub async fn require_tenant(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    authenticate(state, AccessScope::TenantRequired, request, next).await
}

async fn authenticate(
    state: AppState,
    scope: AccessScope,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    let context = match authorize(&state, scope, request.headers()).await {
        Ok(context) => context,
        Err(e) => return e.into_response(),
    };

    debug!(
        user_id = %context.user_id,
        project_id = ?context.project_id,
        key_prefix = ?context.key_prefix,
        kind = ?context.kind,
        "Request authorized"
    );

    request.extensions_mut().insert(context);
    next.run(request).await
}

async fn authorize(
    state: &AppState,
    scope: AccessScope,
    headers: &HeaderMap,
) -> Result<AuthContext, ApiError> {
    let api_key = header_str(headers, API_KEY_HEADER)?;
    let authorization = header_str(headers, header::AUTHORIZATION.as_str())?;

    let credential = CredentialGate::classify(api_key, authorization)?;
    Ok(state.gate.authorize(&credential, scope).await?)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::unauthorized(format!("Invalid {} header encoding", name)))
        })
        .transpose()
}

/// Extractor for the context attached by the gate
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthContext);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Authenticated)
            .ok_or_else(|| ApiError::unauthorized("Missing credentials"))
    }
}
