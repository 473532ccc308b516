//! OTP delivery collaborator
//!
//! Code generation and delivery live outside this service. The gateway only
//! gates and meters calls into an [`OtpDispatcher`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpChannel {
    Sms,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpRequest {
    pub project_id: String,
    pub channel: OtpChannel,
    pub recipient: String,
}

/// Result of a dispatched OTP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpReceipt {
    pub message_id: String,
    pub channel: OtpChannel,
    pub sent_at: DateTime<Utc>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait OtpDispatcher: Send + Sync {
    async fn send(&self, request: &OtpRequest) -> Result<OtpReceipt, DomainError>;
}
