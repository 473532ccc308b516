//! Ungated liveness and readiness probes

use std::future::Future;
use std::time::Instant;

use axum::{extract::State, http::StatusCode};
use serde::Serialize;
use tracing::warn;

use crate::api::types::Json;
use crate::domain::DomainError;

use super::state::AppState;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<DependencyCheck>>,
}

/// Outcome of probing one backend the gate depends on
#[derive(Debug, Serialize)]
pub struct DependencyCheck {
    pub name: &'static str,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION"),
        checks: None,
    })
}

/// GET /live
pub async fn live_check() -> StatusCode {
    StatusCode::OK
}

/// GET /ready: 503 unless the credential store, the shared cache and the
/// usage ledger all answer
pub async fn ready_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let checks = vec![
        probe("credential_store", state.probes.stores.ping()).await,
        probe("shared_cache", state.probes.shared_cache.ping()).await,
        probe("usage_ledger", state.meter.ledger().ping()).await,
    ];

    let ready = checks.iter().all(|c| c.status == HealthStatus::Healthy);
    let (code, status) = if ready {
        (StatusCode::OK, HealthStatus::Healthy)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::Unhealthy)
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            checks: Some(checks),
        }),
    )
}

async fn probe(
    name: &'static str,
    check: impl Future<Output = Result<(), DomainError>>,
) -> DependencyCheck {
    let started = Instant::now();
    let result = check.await;
    let latency_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(()) => DependencyCheck {
            name,
            status: HealthStatus::Healthy,
            error: None,
            latency_ms,
        },
        Err(e) => {
            warn!(dependency = name, error = %e, "Readiness probe failed");
            DependencyCheck {
                name,
                status: HealthStatus::Unhealthy,
                error: Some(e.to_string()),
                latency_ms,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_reports_failure() {
        let check = probe("shared_cache", async {
            Err(DomainError::cache("connection refused"))
        })
        .await;

        assert_eq!(check.status, HealthStatus::Unhealthy);
        assert!(check.error.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_probe_reports_success() {
        let check = probe("usage_ledger", async { Ok(()) }).await;

        assert_eq!(check.status, HealthStatus::Healthy);
        assert!(check.error.is_none());
    }
}
