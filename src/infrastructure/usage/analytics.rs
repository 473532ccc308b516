//! Background worker for aggregate usage analytics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::usage::{LedgerNamespace, UsageKind, UsageLedger};

/// One completion to fold into the `(namespace, kind, month)` aggregate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsUpdate {
    pub namespace: LedgerNamespace,
    pub kind: UsageKind,
    pub month: String,
}

#[derive(Debug, Default)]
struct Counters {
    applied: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Handle to a bounded analytics queue drained by one worker task.
///
/// Updates are best effort: a full queue drops the update and a failed write
/// is logged and counted. Neither reaches the request that caused it.
#[derive(Debug, Clone)]
pub struct AnalyticsDispatcher {
    sender: mpsc::Sender<AnalyticsUpdate>,
    counters: Arc<Counters>,
}

impl AnalyticsDispatcher {
    /// Starts the worker on the current runtime
    pub fn spawn(ledger: Arc<dyn UsageLedger>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<AnalyticsUpdate>(capacity.max(1));
        let counters = Arc::new(Counters::default());

        let worker_counters = counters.clone();
        tokio::spawn(async move {
            while let Some(update) = receiver.recv().await {
                match ledger
                    .bump_aggregate(update.namespace, update.kind, &update.month)
                    .await
                {
                    Ok(()) => {
                        worker_counters.applied.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        worker_counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            namespace = %update.namespace,
                            kind = %update.kind,
                            month = %update.month,
                            error = %e,
                            "Failed to update usage aggregate"
                        );
                    }
                }
            }
            debug!("Analytics worker stopped");
        });

        Self { sender, counters }
    }

    pub fn dispatch(&self, update: AnalyticsUpdate) {
        if let Err(e) = self.sender.try_send(update) {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Analytics queue full, update dropped");
        }
    }

    pub fn applied(&self) -> u64 {
        self.counters.applied.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}
