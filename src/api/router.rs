use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::health;
use super::middleware::logging_middleware;
use super::state::AppState;
use super::v1;

/// Create the full router with application state. Health endpoints sit
/// outside the credential gate.
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .nest("/v1", v1::create_v1_router(state.clone()))
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::{header, Method, StatusCode};

    use crate::api::test_support::{TestApp, TestOptions};
    use crate::domain::otp::MockOtpDispatcher;
    use crate::domain::tenant::ProjectStatus;
    use crate::domain::DomainError;

    #[tokio::test]
    async fn test_health_routes_bypass_gate() {
        let app = TestApp::new();

        let (status, _, body) = app.call(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, _, _) = app.call(Method::GET, "/live", None, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, body) = app.call(Method::GET, "/ready", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_credentials_are_rejected() {
        let app = TestApp::new();

        let (status, _, body) = app.call(Method::GET, "/v1/usage", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");

        let (status, _, _) = app
            .call(Method::GET, "/v1/usage", Some(("x-api-key", "ezk_garbage")), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_issue_list_and_key_scoping() {
        let app = TestApp::new();
        let session = app.session("alice");

        let (status, _, body) = app
            .call(
                Method::POST,
                "/v1/projects/p1/keys",
                Some((header::AUTHORIZATION.as_str(), &session)),
                Some(serde_json::json!({ "name": "ci" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let key = body["key"].as_str().unwrap().to_string();
        assert!(key.starts_with(body["key_prefix"].as_str().unwrap()));

        let (status, _, body) = app
            .call(
                Method::GET,
                "/v1/projects/p1/keys",
                Some((header::AUTHORIZATION.as_str(), &session)),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let listed = body["data"].as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].get("key").is_none());
        assert!(!body.to_string().contains(&key));

        // Keys cannot manage keys
        let (status, _, body) = app
            .call(Method::GET, "/v1/projects/p1/keys", Some(("x-api-key", &key)), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "forbidden");

        // Other users' projects
        let (status, _, _) = app
            .call(
                Method::POST,
                "/v1/projects/p2/keys",
                Some((header::AUTHORIZATION.as_str(), &session)),
                Some(serde_json::json!({ "name": "ci" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_otp_send_is_metered_per_project_and_key() {
        let app = TestApp::with_options(TestOptions {
            free_allowance: Some(1),
            ..Default::default()
        });
        let key = app.issue_key("alice", "p1", "ci").await;

        for _ in 0..3 {
            let (status, _, body) = app
                .call(
                    Method::POST,
                    "/v1/otp/send",
                    Some(("x-api-key", &key.plaintext)),
                    Some(serde_json::json!({ "channel": "sms", "recipient": "+15550004321" })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            assert!(body["message_id"].as_str().unwrap().starts_with("otp_"));
        }

        let (status, _, body) = app
            .call(Method::GET, "/v1/usage", Some(("x-api-key", &key.plaintext)), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["project_id"], "p1");
        assert_eq!(body["month_count"], 3);

        assert_eq!(app.key_usage("alice", "p1", key.api_key.id().as_str()).await, 3);
        assert_eq!(app.billed_events().len(), 2);
    }

    #[tokio::test]
    async fn test_session_send_requires_owned_project() {
        let app = TestApp::new();
        let session = app.session("alice");
        let auth = Some((header::AUTHORIZATION.as_str(), session.as_str()));
        let body = |project: &str| {
            Some(serde_json::json!({
                "project_id": project, "channel": "email", "recipient": "a@example.com"
            }))
        };

        let (status, _, _) = app.call(Method::POST, "/v1/otp/send", auth, body("p1")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = app.call(Method::POST, "/v1/otp/send", auth, body("p2")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = app.call(Method::POST, "/v1/otp/send", auth, body("nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Usage is tenant scoped
        let (status, _, _) = app.call(Method::GET, "/v1/usage", auth, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_quota_rejects_request_past_limit() {
        let app = TestApp::with_options(TestOptions {
            requests_per_minute: 2,
            ..Default::default()
        });
        let key = app.issue_key("alice", "p1", "ci").await;
        let send = || {
            app.call(
                Method::POST,
                "/v1/otp/send",
                Some(("x-api-key", key.plaintext.as_str())),
                Some(serde_json::json!({ "channel": "sms", "recipient": "+15550004321" })),
            )
        };

        assert_eq!(send().await.0, StatusCode::OK);
        let (status, _, body) = send().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quota_remaining"], 0);

        let (status, headers, body) = send().await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "rate_limited");
        let retry_after: u64 = headers
            .get(header::RETRY_AFTER)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));

        // Rejected requests are not metered
        let (_, _, usage) = app
            .call(Method::GET, "/v1/usage", Some(("x-api-key", &key.plaintext)), None)
            .await;
        assert_eq!(usage["month_count"], 2);
    }

    #[tokio::test]
    async fn test_failed_dispatch_is_not_metered() {
        let mut dispatcher = MockOtpDispatcher::new();
        dispatcher
            .expect_send()
            .returning(|_| Err(DomainError::internal("provider down")));

        let app = TestApp::with_options(TestOptions {
            free_allowance: Some(0),
            otp: Some(Arc::new(dispatcher)),
            ..Default::default()
        });
        let key = app.issue_key("alice", "p1", "ci").await;

        let (status, _, body) = app
            .call(
                Method::POST,
                "/v1/otp/send",
                Some(("x-api-key", &key.plaintext)),
                Some(serde_json::json!({ "channel": "sms", "recipient": "+15550004321" })),
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "internal_error");

        let (_, _, usage) = app
            .call(Method::GET, "/v1/usage", Some(("x-api-key", &key.plaintext)), None)
            .await;
        assert_eq!(usage["month_count"], 0);
        assert!(app.billed_events().is_empty());
        assert_eq!(app.key_usage("alice", "p1", key.api_key.id().as_str()).await, 0);
    }

    #[tokio::test]
    async fn test_unbilled_send_still_counts_against_key() {
        let app = TestApp::with_options(TestOptions {
            free_allowance: Some(0),
            ..Default::default()
        });
        let key = app.issue_key("alice", "p1", "ci").await;
        app.set_billing_offline(true);

        let (status, _, body) = app
            .call(
                Method::POST,
                "/v1/otp/send",
                Some(("x-api-key", &key.plaintext)),
                Some(serde_json::json!({ "channel": "sms", "recipient": "+15550004321" })),
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "internal_error");

        // The OTP went out, so both the project and the key count it
        let (_, _, usage) = app
            .call(Method::GET, "/v1/usage", Some(("x-api-key", &key.plaintext)), None)
            .await;
        assert_eq!(usage["month_count"], 1);
        assert!(app.billed_events().is_empty());
        assert_eq!(app.key_usage("alice", "p1", key.api_key.id().as_str()).await, 1);
    }

    #[tokio::test]
    async fn test_suspended_project_is_forbidden() {
        let app = TestApp::new();
        let key = app.issue_key("alice", "p1", "ci").await;
        app.set_project_status("p1", ProjectStatus::Suspended).await;

        let (status, _, body) = app
            .call(Method::GET, "/v1/usage", Some(("x-api-key", &key.plaintext)), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "forbidden");
    }

    #[tokio::test]
    async fn test_revoked_key_lifecycle() {
        let app = TestApp::new();
        let session = app.session("alice");
        let key = app.issue_key("alice", "p1", "ci").await;
        let with_key = Some(("x-api-key", key.plaintext.as_str()));

        let (status, _, _) = app.call(Method::GET, "/v1/usage", with_key, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, body) = app
            .call(
                Method::DELETE,
                &format!("/v1/projects/p1/keys/{}", key.api_key.id()),
                Some((header::AUTHORIZATION.as_str(), &session)),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "revoked");

        // Cached authorization still holds
        let (status, _, _) = app.call(Method::GET, "/v1/usage", with_key, None).await;
        assert_eq!(status, StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(400)).await;

        let (status, _, body) = app.call(Method::GET, "/v1/usage", with_key, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");
    }

    #[tokio::test]
    async fn test_store_outage_is_auth_unavailable() {
        let app = TestApp::new();
        let key = app.issue_key("alice", "p1", "ci").await;
        app.set_key_store_offline(true);

        let (status, _, body) = app
            .call(Method::GET, "/v1/usage", Some(("x-api-key", &key.plaintext)), None)
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "auth_unavailable");
    }
}
