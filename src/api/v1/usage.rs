//! Project usage read endpoint

use axum::extract::State;
use chrono::Utc;
use serde::Serialize;

use crate::api::middleware::Authenticated;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::usage::{month_key, LedgerKey, UsageKind};

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub project_id: String,
    pub month: String,
    pub kind: UsageKind,
    pub month_count: u64,
    pub total: u64,
}

/// GET /v1/usage
pub async fn get_usage(
    State(state): State<AppState>,
    Authenticated(context): Authenticated,
) -> Result<Json<UsageResponse>, ApiError> {
    let project_id = context.require_project()?.to_string();
    let month = month_key(Utc::now());

    let counter = state
        .meter
        .ledger()
        .get(&LedgerKey::project(&context.user_id, &project_id))
        .await?
        .unwrap_or_default();

    Ok(Json(UsageResponse {
        month_count: counter.month_count(UsageKind::OtpSend, &month),
        total: counter.total(UsageKind::OtpSend),
        project_id,
        month,
        kind: UsageKind::OtpSend,
    }))
}
