//! In-memory application wiring for router tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use crate::domain::api_key::ApiKey;
use crate::domain::otp::OtpDispatcher;
use crate::domain::storage::mock::FlakyStore;
use crate::domain::tenant::{Plan, Project, ProjectStatus, User};
use crate::domain::usage::{BillingEvent, BillingProvider, LedgerKey, UsageKind, UsageLedger};
use crate::domain::DomainError;
use crate::infrastructure::api_key::{ApiKeyService, Argon2Settings, IssuedKey, KeyHasher};
use crate::infrastructure::auth::{
    CredentialGate, GateConfig, JwtConfig, JwtGenerator, JwtService,
};
use crate::infrastructure::cache::{InMemoryCache, IntrospectionCache, IntrospectionCacheConfig};
use crate::infrastructure::otp::LogOtpDispatcher;
use crate::infrastructure::quota::QuotaEnforcer;
use crate::infrastructure::storage::{CredentialStores, InMemoryDocumentStore};
use crate::infrastructure::usage::{
    AnalyticsDispatcher, InMemoryUsageLedger, MeterConfig, UsageMeter,
};

use super::router::create_router_with_state;
use super::state::{AppState, Probes, UsagePolicy};

/// Billing provider that keeps every event, or rejects them while offline
#[derive(Debug, Default)]
pub struct RecordingBilling {
    events: Mutex<Vec<BillingEvent>>,
    offline: AtomicBool,
}

#[async_trait]
impl BillingProvider for RecordingBilling {
    async fn emit(&self, event: &BillingEvent) -> Result<(), DomainError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DomainError::billing("billing provider offline"));
        }
        self.events
            .lock()
            .map_err(|e| DomainError::internal(e.to_string()))?
            .push(event.clone());
        Ok(())
    }
}

#[derive(Clone)]
pub struct TestOptions {
    pub free_allowance: Option<u64>,
    /// Limit on the plan of project `p1`
    pub requests_per_minute: u32,
    /// Replaces the logging dispatcher
    pub otp: Option<Arc<dyn OtpDispatcher>>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            free_allowance: None,
            requests_per_minute: 1_000,
            otp: None,
        }
    }
}

pub struct TestApp {
    router: Router,
    sessions: Arc<JwtService>,
    keys: Arc<ApiKeyService>,
    stores: CredentialStores,
    key_store: Arc<FlakyStore<ApiKey>>,
    ledger: Arc<InMemoryUsageLedger>,
    billing: Arc<RecordingBilling>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_options(TestOptions::default())
    }

    pub fn with_options(options: TestOptions) -> Self {
        let key_store = Arc::new(FlakyStore::<ApiKey>::new(Arc::new(
            InMemoryDocumentStore::<ApiKey>::new(),
        )));
        let stores = CredentialStores {
            keys: key_store.clone(),
            projects: Arc::new(InMemoryDocumentStore::with_documents(vec![
                Project::new("p1", "alice", "Alice app").with_plan("pro"),
                Project::new("p2", "bob", "Bob app"),
            ])),
            plans: Arc::new(InMemoryDocumentStore::with_documents(vec![
                Plan::new("pro").with_requests_per_minute(options.requests_per_minute),
            ])),
            users: Arc::new(InMemoryDocumentStore::with_documents(vec![
                User::new("alice").with_billing_customer("cus_alice"),
                User::new("bob"),
            ])),
        };

        let hasher = KeyHasher::new("test-pepper", Argon2Settings::fast())
            .map(Arc::new)
            .ok();
        let sessions = Arc::new(JwtService::new(JwtConfig::new("test-secret", "ezk-test")));
        let shared_cache = Arc::new(InMemoryCache::new());
        let introspection = IntrospectionCache::new(
            shared_cache.clone(),
            IntrospectionCacheConfig {
                local_ttl: Duration::from_millis(50),
                shared_ttl: Duration::from_millis(250),
                ..Default::default()
            },
        );

        let gate = CredentialGate::new(
            stores.clone(),
            Arc::new(introspection),
            hasher.clone(),
            sessions.clone(),
            GateConfig::default(),
        );
        let keys = Arc::new(ApiKeyService::new(
            stores.keys.clone(),
            stores.projects.clone(),
            hasher,
        ));

        let ledger = Arc::new(InMemoryUsageLedger::new());
        let billing = Arc::new(RecordingBilling::default());
        let meter = UsageMeter::new(
            ledger.clone(),
            billing.clone(),
            AnalyticsDispatcher::spawn(ledger.clone(), 64),
            MeterConfig::default(),
        );

        let state = AppState::new(
            Arc::new(gate),
            keys.clone(),
            Arc::new(QuotaEnforcer::new(shared_cache.clone())),
            Arc::new(meter),
            options
                .otp
                .unwrap_or_else(|| Arc::new(LogOtpDispatcher::new())),
            stores.projects.clone(),
            UsagePolicy {
                free_allowance: options.free_allowance,
            },
            Probes {
                stores: stores.clone(),
                shared_cache,
            },
        );

        Self {
            router: create_router_with_state(state),
            sessions,
            keys,
            stores,
            key_store,
            ledger,
            billing,
        }
    }

    /// `Authorization` header value for a session of `user_id`
    pub fn session(&self, user_id: &str) -> String {
        format!("Bearer {}", self.sessions.generate(user_id).unwrap())
    }

    pub async fn issue_key(&self, owner_id: &str, project_id: &str, name: &str) -> IssuedKey {
        self.keys.issue(owner_id, project_id, name).await.unwrap()
    }

    pub async fn set_project_status(&self, project_id: &str, status: ProjectStatus) {
        let project = self.stores.projects.get(project_id).await.unwrap().unwrap();
        self.stores
            .projects
            .replace(project.with_status(status))
            .await
            .unwrap();
    }

    pub fn set_key_store_offline(&self, offline: bool) {
        self.key_store.set_offline(offline);
    }

    pub fn set_billing_offline(&self, offline: bool) {
        self.billing.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn key_usage(&self, user_id: &str, project_id: &str, key_id: &str) -> u64 {
        self.ledger
            .get(&LedgerKey::api_key(user_id, project_id, key_id))
            .await
            .unwrap()
            .map(|c| c.total(UsageKind::OtpSend))
            .unwrap_or(0)
    }

    pub fn billed_events(&self) -> Vec<BillingEvent> {
        self.billing.events.lock().unwrap().clone()
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        header: Option<(&str, &str)>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, HeaderMap, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        (status, headers, json)
    }
}
