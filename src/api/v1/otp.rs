//! Metered OTP send endpoint

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::middleware::Authenticated;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::auth::{AuthContext, CredentialKind};
use crate::domain::otp::{OtpChannel, OtpReceipt, OtpRequest};
use crate::domain::quota::QuotaDecision;
use crate::domain::usage::{LedgerKey, UsageKind};
use crate::infrastructure::usage::{MeterRequest, MeteringError};

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    /// Required with a session token; must match the key's project otherwise
    #[serde(default)]
    pub project_id: Option<String>,
    pub channel: OtpChannel,
    pub recipient: String,
}

#[derive(Debug, Serialize)]
pub struct SendOtpResponse {
    pub message_id: String,
    pub channel: OtpChannel,
    pub sent_at: DateTime<Utc>,
    /// Requests left in the current quota window; absent when unlimited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_remaining: Option<u64>,
}

/// Project the send is billed to
async fn resolve_project(
    state: &AppState,
    context: &AuthContext,
    requested: Option<&str>,
) -> Result<String, ApiError> {
    match context.kind {
        CredentialKind::ApiKey => {
            let project_id = context.require_project()?;
            if requested.is_some_and(|p| p != project_id) {
                return Err(ApiError::forbidden("API key is scoped to a different project"));
            }
            Ok(project_id.to_string())
        }
        CredentialKind::Session => {
            let project_id =
                requested.ok_or_else(|| ApiError::bad_request("project_id is required"))?;
            let project = state
                .projects
                .get(project_id)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("Project '{}' not found", project_id)))?;

            if project.owner_id != context.user_id {
                return Err(ApiError::forbidden("Caller does not own this project"));
            }
            if !project.is_active() {
                return Err(ApiError::forbidden("Project is suspended"));
            }
            Ok(project.id)
        }
    }
}

/// Counts the send against the presenting key. Never fails the request.
async fn track_key_usage(
    state: &AppState,
    context: &AuthContext,
    project_id: &str,
    receipt: &OtpReceipt,
) {
    let Some(key_id) = &context.key_id else {
        return;
    };

    let tracked = MeterRequest::new(
        LedgerKey::api_key(&context.user_id, project_id, key_id),
        UsageKind::OtpSend,
    );
    let produced = receipt.clone();

    if let Err(e) = state
        .meter
        .record_completion(tracked, || async move { Ok(produced) })
        .await
    {
        warn!(key_prefix = ?context.key_prefix, error = %e, "Per-key usage not recorded");
    }
}

/// POST /v1/otp/send
pub async fn send_otp(
    State(state): State<AppState>,
    Authenticated(context): Authenticated,
    Json(request): Json<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>, ApiError> {
    let project_id = resolve_project(&state, &context, request.project_id.as_deref()).await?;

    let decision = state
        .quota
        .check_and_increment(&context.quota_identity(), context.requests_per_minute())
        .await?;

    let otp_request = OtpRequest {
        project_id: project_id.clone(),
        channel: request.channel,
        recipient: request.recipient,
    };

    let billed = MeterRequest::new(
        LedgerKey::project(&context.user_id, &project_id),
        UsageKind::OtpSend,
    )
    .with_billing(
        context.billing_customer_id.clone(),
        state.usage_policy.free_allowance,
    );

    let otp = state.otp.clone();
    let receipt = match state
        .meter
        .record_completion(billed, || async move { otp.send(&otp_request).await })
        .await
    {
        Ok(receipt) => receipt,
        Err(MeteringError::Operation(e)) => return Err(e.into()),
        Err(MeteringError::Ledger(e)) => {
            warn!(error = %e, "Usage ledger unavailable, OTP not sent");
            return Err(ApiError::internal("Usage accounting unavailable"));
        }
        Err(MeteringError::Accounting { output, .. }) => {
            warn!(message_id = %output.message_id, "OTP sent but usage accounting failed");
            track_key_usage(&state, &context, &project_id, &output).await;
            return Err(ApiError::internal("Usage accounting failed"));
        }
    };

    track_key_usage(&state, &context, &project_id, &receipt).await;

    info!(
        project_id = %project_id,
        message_id = %receipt.message_id,
        key_prefix = ?context.key_prefix,
        "OTP send completed"
    );

    Ok(Json(SendOtpResponse {
        message_id: receipt.message_id,
        channel: receipt.channel,
        sent_at: receipt.sent_at,
        quota_remaining: match decision {
            QuotaDecision::Allowed { remaining, .. } => Some(remaining),
            QuotaDecision::Unlimited => None,
        },
    }))
}
