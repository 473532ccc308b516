//! Project API key management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::middleware::Authenticated;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::api_key::{ApiKey, ApiKeyStatus};
use crate::domain::auth::{AuthContext, CredentialKind};

#[derive(Debug, Deserialize)]
pub struct IssueKeyRequest {
    pub name: String,
}

/// Returned once, at creation; the only response carrying the full key
#[derive(Debug, Serialize)]
pub struct IssueKeyResponse {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub key: String,
    pub key_prefix: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct KeySummary {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub key_prefix: String,
    pub status: ApiKeyStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<&ApiKey> for KeySummary {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id().as_str().to_string(),
            project_id: key.project_id().to_string(),
            name: key.name().to_string(),
            key_prefix: key.key_prefix().to_string(),
            status: key.status(),
            created_at: key.created_at(),
            revoked_at: key.revoked_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct KeyListResponse {
    pub data: Vec<KeySummary>,
}

/// Key management is an account action and needs a session token
fn session_user(context: &AuthContext) -> Result<&str, ApiError> {
    match context.kind {
        CredentialKind::Session => Ok(&context.user_id),
        CredentialKind::ApiKey => Err(ApiError::forbidden(
            "Key management requires a session token",
        )),
    }
}

/// POST /v1/projects/{project_id}/keys
pub async fn issue_key(
    State(state): State<AppState>,
    Authenticated(context): Authenticated,
    Path(project_id): Path<String>,
    Json(request): Json<IssueKeyRequest>,
) -> Result<(StatusCode, Json<IssueKeyResponse>), ApiError> {
    let owner_id = session_user(&context)?;

    let issued = state
        .api_key_service
        .issue(owner_id, &project_id, &request.name)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IssueKeyResponse {
            id: issued.api_key.id().as_str().to_string(),
            project_id,
            name: issued.api_key.name().to_string(),
            key: issued.plaintext,
            key_prefix: issued.key_prefix,
            created_at: issued.api_key.created_at(),
        }),
    ))
}

/// GET /v1/projects/{project_id}/keys
pub async fn list_keys(
    State(state): State<AppState>,
    Authenticated(context): Authenticated,
    Path(project_id): Path<String>,
) -> Result<Json<KeyListResponse>, ApiError> {
    let owner_id = session_user(&context)?;
    debug!(project_id = %project_id, "Listing API keys");

    let keys = state.api_key_service.list(owner_id, &project_id).await?;

    Ok(Json(KeyListResponse {
        data: keys.iter().map(KeySummary::from).collect(),
    }))
}

/// DELETE /v1/projects/{project_id}/keys/{key_id}
pub async fn revoke_key(
    State(state): State<AppState>,
    Authenticated(context): Authenticated,
    Path((project_id, key_id)): Path<(String, String)>,
) -> Result<Json<KeySummary>, ApiError> {
    let owner_id = session_user(&context)?;

    let key = state
        .api_key_service
        .revoke(owner_id, &project_id, &key_id)
        .await?;

    Ok(Json(KeySummary::from(&key)))
}
