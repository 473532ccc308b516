//! Metered-billing providers

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::domain::usage::{BillingEvent, BillingProvider};
use crate::domain::DomainError;

#[derive(Debug, Clone)]
pub struct HttpBillingConfig {
    /// Event ingestion URL
    pub endpoint: String,
    /// Bearer token sent with every event
    pub api_token: String,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further retry
    pub retry_backoff: Duration,
}

impl HttpBillingConfig {
    pub fn new(endpoint: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_token: api_token.into(),
            timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_backoff: Duration::from_millis(200),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }
}

/// Posts billing events as JSON to an HTTP ingestion endpoint
#[derive(Debug, Clone)]
pub struct HttpBillingProvider {
    client: Client,
    config: HttpBillingConfig,
}

enum Attempt {
    Retry(DomainError),
    Fatal(DomainError),
}

impl HttpBillingProvider {
    pub fn new(config: HttpBillingConfig) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn send_once(&self, event: &BillingEvent) -> Result<(), Attempt> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_token)
            .json(event)
            .send()
            .await
            .map_err(|e| Attempt::Retry(DomainError::billing(format!("Request failed: {}", e))))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(500)
            .collect();
        let error = DomainError::billing(format!("Provider returned {}: {}", status, body));

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(Attempt::Retry(error))
        } else {
            Err(Attempt::Fatal(error))
        }
    }
}

#[async_trait]
impl BillingProvider for HttpBillingProvider {
    async fn emit(&self, event: &BillingEvent) -> Result<(), DomainError> {
        let mut backoff = self.config.retry_backoff;
        let mut attempt = 0;

        loop {
            match self.send_once(event).await {
                Ok(()) => {
                    debug!(event_name = %event.event_name, attempt, "Billing event accepted");
                    return Ok(());
                }
                Err(Attempt::Retry(e)) if attempt < self.config.max_retries => {
                    warn!(event_name = %event.event_name, attempt, error = %e, "Billing event failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(Attempt::Retry(e)) | Err(Attempt::Fatal(e)) => return Err(e),
            }
        }
    }
}

/// Drops every event; used when billing is disabled
#[derive(Debug, Clone, Default)]
pub struct NoopBillingProvider;

#[async_trait]
impl BillingProvider for NoopBillingProvider {
    async fn emit(&self, event: &BillingEvent) -> Result<(), DomainError> {
        debug!(event_name = %event.event_name, "Billing disabled, event dropped");
        Ok(())
    }
}
