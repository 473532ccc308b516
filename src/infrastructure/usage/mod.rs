//! Usage ledger backends, billing providers and the metering bridge

mod analytics;
mod billing;
mod in_memory;
mod meter;
mod postgres;

pub use analytics::{AnalyticsDispatcher, AnalyticsUpdate};
pub use billing::{HttpBillingConfig, HttpBillingProvider, NoopBillingProvider};
pub use in_memory::InMemoryUsageLedger;
pub use meter::{MeterConfig, MeterRequest, MeteringError, UsageMeter};
pub use postgres::PostgresUsageLedger;
