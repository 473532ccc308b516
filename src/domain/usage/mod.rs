//! Usage metering domain
//!
//! Per-subject completion counters, the transactional ledger they live in,
//! and the billing events emitted past a free allowance.

mod billing;
mod counter;
mod ledger;

pub use billing::{BillingEvent, BillingPayload, BillingProvider};
pub use counter::{month_key, LedgerKey, LedgerNamespace, UsageCounter, UsageKind};
pub use ledger::{LedgerTransaction, UsageLedger};

#[cfg(test)]
pub use billing::MockBillingProvider;
