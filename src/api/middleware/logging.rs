//! Request logging with credentials reduced to a displayable prefix

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::infrastructure::api_key::ApiKeyGenerator;

/// Logs each request and its outcome. Spans come from `TraceLayer`.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let credential = describe_credential(&request);

    info!(
        method = %method,
        path = %path,
        request_id = %request_id,
        credential = %credential,
        "Incoming request"
    );

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        request_id = %request_id,
        "Request completed"
    );

    response
}

/// `key:<prefix>`, `bearer` or `none`; never the secret itself
fn describe_credential(request: &Request<Body>) -> String {
    if let Some(key) = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
    {
        return format!("key:{}", ApiKeyGenerator::prefix_of(key.trim()));
    }

    if request.headers().contains_key(header::AUTHORIZATION) {
        return "bearer".to_string();
    }

    "none".to_string()
}
