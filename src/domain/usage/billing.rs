//! Metered billing events

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPayload {
    pub value: String,
    pub billing_customer_id: String,
}

/// One billable unit reported to the metered-billing provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingEvent {
    pub event_name: String,
    pub payload: BillingPayload,
}

impl BillingEvent {
    pub fn single_unit(event_name: impl Into<String>, billing_customer_id: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            payload: BillingPayload {
                value: "1".to_string(),
                billing_customer_id: billing_customer_id.into(),
            },
        }
    }
}

/// Sink for metered billing events
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn emit(&self, event: &BillingEvent) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_event_wire_shape() {
        let event = BillingEvent::single_unit("otp_send", "cus_123");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "event_name": "otp_send",
                "payload": { "value": "1", "billing_customer_id": "cus_123" }
            })
        );
    }

    #[tokio::test]
    async fn test_mock_billing_provider() {
        let mut mock = MockBillingProvider::new();
        mock.expect_emit()
            .withf(|e| e.payload.billing_customer_id == "cus_1")
            .times(1)
            .returning(|_| Ok(()));

        let result = mock.emit(&BillingEvent::single_unit("otp_send", "cus_1")).await;
        assert!(result.is_ok());
    }
}
