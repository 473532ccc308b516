//! Usage metering around a completed operation
//!
//! The subject's ledger row stays locked from before the operation runs
//! until its new count is committed, so concurrent completions on one subject
//! are counted and billed one at a time.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::domain::usage::{
    month_key, BillingEvent, BillingProvider, LedgerKey, LedgerTransaction, UsageKind, UsageLedger,
};
use crate::domain::DomainError;

use super::analytics::{AnalyticsDispatcher, AnalyticsUpdate};

#[derive(Debug, Clone)]
pub struct MeterConfig {
    /// Billing event name sent to the provider
    pub event_name: String,
    /// Attempts at opening or re-committing a ledger transaction
    pub transaction_attempts: u32,
    /// Delay between ledger attempts
    pub retry_backoff: Duration,
    /// Upper bound on one billing emission, provider retries included
    pub billing_timeout: Duration,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            event_name: "otp_send".to_string(),
            transaction_attempts: 3,
            retry_backoff: Duration::from_millis(25),
            billing_timeout: Duration::from_secs(10),
        }
    }
}

/// What to count and whom to bill
#[derive(Debug, Clone)]
pub struct MeterRequest {
    pub subject: LedgerKey,
    pub kind: UsageKind,
    /// Absent for tracking-only subjects
    pub billing_customer_id: Option<String>,
    /// Free completions per month before billing starts; absent means never bill
    pub free_allowance: Option<u64>,
}

impl MeterRequest {
    pub fn new(subject: LedgerKey, kind: UsageKind) -> Self {
        Self {
            subject,
            kind,
            billing_customer_id: None,
            free_allowance: None,
        }
    }

    pub fn with_billing(mut self, customer_id: Option<String>, free_allowance: Option<u64>) -> Self {
        self.billing_customer_id = customer_id;
        self.free_allowance = free_allowance;
        self
    }
}

#[derive(Debug, Error)]
pub enum MeteringError<T: Debug> {
    /// The ledger could not be opened; the operation did not run
    #[error("Usage ledger unavailable: {0}")]
    Ledger(DomainError),

    /// The operation itself failed; nothing was counted or billed
    #[error("Operation failed: {0}")]
    Operation(DomainError),

    /// The operation completed but billing or counting did not
    #[error("Usage accounting failed: {source}")]
    Accounting { output: T, source: DomainError },
}

pub struct UsageMeter {
    ledger: Arc<dyn UsageLedger>,
    billing: Arc<dyn BillingProvider>,
    analytics: AnalyticsDispatcher,
    config: MeterConfig,
}

impl std::fmt::Debug for UsageMeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageMeter")
            .field("ledger", &self.ledger)
            .field("analytics", &self.analytics)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl UsageMeter {
    pub fn new(
        ledger: Arc<dyn UsageLedger>,
        billing: Arc<dyn BillingProvider>,
        analytics: AnalyticsDispatcher,
        config: MeterConfig,
    ) -> Self {
        Self {
            ledger,
            billing,
            analytics,
            config,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn UsageLedger> {
        &self.ledger
    }

    /// Runs `do_work` under the subject's ledger lock and records one
    /// completion if it succeeds, billing it when the subject is past its
    /// monthly free allowance.
    pub async fn record_completion<T, F, Fut>(
        &self,
        request: MeterRequest,
        do_work: F,
    ) -> Result<T, MeteringError<T>>
    where
        T: Debug,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let tx = self
            .begin(&request.subject)
            .await
            .map_err(MeteringError::Ledger)?;

        let month = month_key(Utc::now());
        let current = tx.counter().month_count(request.kind, &month);
        let charge_to = match (&request.billing_customer_id, request.free_allowance) {
            (Some(customer), Some(allowance)) if current >= allowance => Some(customer.clone()),
            _ => None,
        };
        if request.billing_customer_id.is_none() {
            debug!(subject = %request.subject, "No billing subject, tracking only");
        }

        let output = match do_work().await {
            Ok(output) => output,
            Err(e) => {
                drop(tx);
                return Err(MeteringError::Operation(e));
            }
        };

        let billing_error = match &charge_to {
            Some(customer) => self.emit(customer).await.err(),
            None => None,
        };

        let mut counter = tx.counter().clone();
        counter.record(request.kind, &month);
        let commit_error = match tx.commit(counter).await {
            Ok(()) => None,
            Err(e) => {
                warn!(subject = %request.subject, error = %e, "Usage commit failed, re-applying");
                self.reapply(&request.subject, request.kind, &month).await.err()
            }
        };

        if commit_error.is_none() {
            self.analytics.dispatch(AnalyticsUpdate {
                namespace: request.subject.namespace,
                kind: request.kind,
                month: month.clone(),
            });
        }

        match (commit_error, billing_error) {
            (None, None) => {
                debug!(subject = %request.subject, month = %month, charged = charge_to.is_some(), "Usage recorded");
                Ok(output)
            }
            (Some(source), _) => {
                if charge_to.is_some() {
                    error!(subject = %request.subject, error = %source, "Usage billed but not counted");
                } else {
                    error!(subject = %request.subject, error = %source, "Usage not counted");
                }
                Err(MeteringError::Accounting { output, source })
            }
            (None, Some(source)) => {
                error!(subject = %request.subject, error = %source, "Usage counted but not billed");
                Err(MeteringError::Accounting { output, source })
            }
        }
    }

    async fn begin(&self, subject: &LedgerKey) -> Result<Box<dyn LedgerTransaction>, DomainError> {
        let attempts = self.config.transaction_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.ledger.begin(subject).await {
                Ok(tx) => return Ok(tx),
                Err(e) if attempt < attempts => {
                    warn!(subject = %subject, attempt, error = %e, "Failed to open usage transaction, retrying");
                    tokio::time::sleep(self.config.retry_backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Adds one completion in fresh transactions until one commits
    async fn reapply(&self, subject: &LedgerKey, kind: UsageKind, month: &str) -> Result<(), DomainError> {
        let attempts = self.config.transaction_attempts.max(1);
        let mut last_error = DomainError::internal("Usage commit was not attempted");

        for attempt in 1..=attempts {
            tokio::time::sleep(self.config.retry_backoff).await;

            let result = match self.ledger.begin(subject).await {
                Ok(tx) => {
                    let mut counter = tx.counter().clone();
                    counter.record(kind, month);
                    tx.commit(counter).await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    info!(subject = %subject, attempt, "Usage re-applied");
                    return Ok(());
                }
                Err(e) => {
                    warn!(subject = %subject, attempt, error = %e, "Usage re-apply failed");
                    last_error = e;
                }
            }
        }

        Err(DomainError::internal(format!(
            "Usage commit failed after {} attempts: {}",
            attempts, last_error
        )))
    }

    async fn emit(&self, customer_id: &str) -> Result<(), DomainError> {
        let event = BillingEvent::single_unit(&self.config.event_name, customer_id);

        tokio::time::timeout(self.config.billing_timeout, self.billing.emit(&event))
            .await
            .map_err(|_| DomainError::billing("Billing emission timed out"))?
    }
}
