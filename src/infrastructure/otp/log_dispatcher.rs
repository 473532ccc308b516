//! In-process dispatcher that records sends in the log instead of delivering

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::otp::{OtpDispatcher, OtpReceipt, OtpRequest};
use crate::domain::DomainError;

/// Accepts every well-formed request and logs it with a masked recipient.
/// Stands in for the delivery service in development and tests.
#[derive(Debug, Clone, Default)]
pub struct LogOtpDispatcher;

impl LogOtpDispatcher {
    pub fn new() -> Self {
        Self
    }
}

/// Keeps the last three characters, e.g. `*********321`
fn mask(recipient: &str) -> String {
    let len = recipient.chars().count();
    recipient
        .chars()
        .enumerate()
        .map(|(i, c)| if i + 3 < len { '*' } else { c })
        .collect()
}

#[async_trait]
impl OtpDispatcher for LogOtpDispatcher {
    async fn send(&self, request: &OtpRequest) -> Result<OtpReceipt, DomainError> {
        if request.recipient.trim().is_empty() {
            return Err(DomainError::validation("Recipient must not be empty"));
        }

        let receipt = OtpReceipt {
            message_id: format!("otp_{}", Uuid::new_v4().simple()),
            channel: request.channel,
            sent_at: Utc::now(),
        };

        info!(
            project_id = %request.project_id,
            channel = ?request.channel,
            recipient = %mask(&request.recipient),
            message_id = %receipt.message_id,
            "OTP dispatched"
        );

        Ok(receipt)
    }
}
