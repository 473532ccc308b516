//! JSON error responses

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::domain::DomainError;

/// Machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorCode {
    InvalidRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    RateLimited,
    InternalError,
    AuthUnavailable,
}

impl std::fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "invalid_request"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::InternalError => write!(f, "internal_error"),
            Self::AuthUnavailable => write!(f, "auth_unavailable"),
        }
    }
}

/// `{ "error": { "code": ..., "message": ... } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: ApiErrorCode,
    pub message: String,
}

/// API error with status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
    /// Sent as `Retry-After` when present
    pub retry_after: Option<Duration>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                error: ApiErrorDetail {
                    code,
                    message: message.into(),
                },
            },
            retry_after: None,
        }
    }

    pub fn code(&self) -> ApiErrorCode {
        self.response.error.code
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ApiErrorCode::InvalidRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ApiErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, ApiErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ApiErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, ApiErrorCode::Conflict, message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let mut error = Self::new(StatusCode::TOO_MANY_REQUESTS, ApiErrorCode::RateLimited, message);
        error.retry_after = retry_after;
        error
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorCode::InternalError,
            message,
        )
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::AuthUnavailable,
            message,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.response)).into_response();

        if let Some(retry_after) = self.retry_after {
            // Whole seconds, rounded up
            let secs = retry_after.as_millis().div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Unauthorized { message } => Self::unauthorized(message),
            DomainError::Forbidden { message } => Self::forbidden(message),
            DomainError::RateLimited {
                message,
                retry_after,
            } => Self::rate_limited(message, retry_after),
            DomainError::NotFound { message } => Self::not_found(message),
            DomainError::Validation { message } => Self::bad_request(message),
            DomainError::Conflict { message } => Self::conflict(message),
            DomainError::Unavailable { message } => Self::unavailable(message),
            err @ (DomainError::Storage { .. } | DomainError::Cache { .. }) => {
                error!(error = %err, "Backend failure");
                Self::unavailable("Backend temporarily unavailable")
            }
            err @ (DomainError::Configuration { .. }
            | DomainError::Internal { .. }
            | DomainError::Billing { .. }) => {
                error!(error = %err, "Internal error");
                Self::internal("Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::unauthorized("Invalid API key").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json = body_json(response).await;
        assert_eq!(
            json,
            serde_json::json!({ "error": { "code": "unauthorized", "message": "Invalid API key" } })
        );
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let error: ApiError =
            DomainError::rate_limited("slow down", Some(Duration::from_millis(12_300))).into();
        assert_eq!(error.code(), ApiErrorCode::RateLimited);

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "13");
    }

    #[test]
    fn test_domain_error_mapping() {
        let cases = [
            (DomainError::forbidden("x"), StatusCode::FORBIDDEN, ApiErrorCode::Forbidden),
            (
                DomainError::unavailable("x"),
                StatusCode::SERVICE_UNAVAILABLE,
                ApiErrorCode::AuthUnavailable,
            ),
            (
                DomainError::storage("x"),
                StatusCode::SERVICE_UNAVAILABLE,
                ApiErrorCode::AuthUnavailable,
            ),
            (
                DomainError::internal("x"),
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorCode::InternalError,
            ),
            (DomainError::not_found("x"), StatusCode::NOT_FOUND, ApiErrorCode::NotFound),
            (DomainError::conflict("x"), StatusCode::CONFLICT, ApiErrorCode::Conflict),
            (
                DomainError::validation("x"),
                StatusCode::BAD_REQUEST,
                ApiErrorCode::InvalidRequest,
            ),
        ];

        for (domain, status, code) in cases {
            let error = ApiError::from(domain);
            assert_eq!(error.status, status);
            assert_eq!(error.code(), code);
        }
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let error = ApiError::from(DomainError::internal("pepper missing"));
        assert_eq!(error.response.error.message, "Internal server error");
    }
}
