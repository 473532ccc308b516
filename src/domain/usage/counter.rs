//! Per-subject completion counters

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of completed operation being metered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    OtpSend,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OtpSend => "otp_send",
        }
    }
}

impl fmt::Display for UsageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger namespace a counter lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerNamespace {
    /// Counted per (user, project); drives billing
    Project,
    /// Counted per (user, project, key); tracking only
    ApiKey,
}

impl LedgerNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::ApiKey => "api_key",
        }
    }
}

impl fmt::Display for LedgerNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one usage counter row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub namespace: LedgerNamespace,
    pub subject_id: String,
}

impl LedgerKey {
    pub fn project(user_id: &str, project_id: &str) -> Self {
        Self {
            namespace: LedgerNamespace::Project,
            subject_id: format!("{}:{}", user_id, project_id),
        }
    }

    pub fn api_key(user_id: &str, project_id: &str, key_id: &str) -> Self {
        Self {
            namespace: LedgerNamespace::ApiKey,
            subject_id: format!("{}:{}:{}", user_id, project_id, key_id),
        }
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.subject_id)
    }
}

/// UTC month bucket, `YYYY-MM`
pub fn month_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Completed-operation counts for one subject
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    pub subject_id: String,
    #[serde(default)]
    pub completed_by_kind: BTreeMap<String, u64>,
    #[serde(default)]
    pub completed_by_kind_by_month: BTreeMap<String, BTreeMap<String, u64>>,
}

impl UsageCounter {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            ..Default::default()
        }
    }

    pub fn total(&self, kind: UsageKind) -> u64 {
        self.completed_by_kind
            .get(kind.as_str())
            .copied()
            .unwrap_or(0)
    }

    pub fn month_count(&self, kind: UsageKind, month: &str) -> u64 {
        self.completed_by_kind_by_month
            .get(kind.as_str())
            .and_then(|months| months.get(month))
            .copied()
            .unwrap_or(0)
    }

    /// Adds one completion of `kind` to the total and to `month`.
    /// Counts of other kinds and months are left as they are.
    pub fn record(&mut self, kind: UsageKind, month: &str) {
        *self
            .completed_by_kind
            .entry(kind.as_str().to_string())
            .or_insert(0) += 1;
        *self
            .completed_by_kind_by_month
            .entry(kind.as_str().to_string())
            .or_default()
            .entry(month.to_string())
            .or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_month_key_is_utc_bucket() {
        let at = Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap();
        assert_eq!(month_key(at), "2026-03");
    }

    #[test]
    fn test_record_keeps_sibling_counts() {
        let mut counter = UsageCounter::new("u1:p1");
        counter
            .completed_by_kind
            .insert("otp_verify".to_string(), 7);
        counter
            .completed_by_kind_by_month
            .entry("otp_send".to_string())
            .or_default()
            .insert("2026-02".to_string(), 4);

        counter.record(UsageKind::OtpSend, "2026-03");
        counter.record(UsageKind::OtpSend, "2026-03");

        assert_eq!(counter.total(UsageKind::OtpSend), 2);
        assert_eq!(counter.month_count(UsageKind::OtpSend, "2026-03"), 2);
        assert_eq!(counter.month_count(UsageKind::OtpSend, "2026-02"), 4);
        assert_eq!(counter.completed_by_kind.get("otp_verify"), Some(&7));
    }

    #[test]
    fn test_ledger_key_subjects() {
        assert_eq!(LedgerKey::project("u1", "p1").subject_id, "u1:p1");
        assert_eq!(LedgerKey::api_key("u1", "p1", "k1").to_string(), "api_key/u1:p1:k1");
    }
}
