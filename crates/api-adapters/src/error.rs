//! # ApiError
//!
//! The single place where failure kinds become HTTP responses. Each kind maps
//! to exactly one status and envelope:
//! `{"error": "<message>"}`, or `{"error": {"<field>": "<message>"}}` for
//! validation failures.

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use domains::DomainError;
use serde_json::{json, Value};
use thiserror::Error;

use crate::dto::validation_json;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Undecodable body or a malformed header value.
    #[error("{0}")]
    BadRequest(String),

    #[error("body must not be larger than {} bytes", crate::router::MAX_BODY_BYTES)]
    PayloadTooLarge,

    #[error("the requested resource could not be found")]
    RouteNotFound,

    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(Method),
}

fn envelope(status: StatusCode, error: impl Into<Value>) -> Response {
    (status, Json(json!({ "error": error.into() }))).into_response()
}

fn unauthorized(message: &str) -> Response {
    let mut response = envelope(StatusCode::UNAUTHORIZED, message);
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

/// Maps domain errors into HTTP responses.
///
/// # Returns
/// - 401 Unauthorized - bad credentials, bad token, or no identity
/// - 403 Forbidden - inactive account or missing permission
/// - 404 Not Found - unknown record or route
/// - 405 Method Not Allowed - known route, wrong method
/// - 409 Conflict - stale version on a conditional write
/// - 413 Payload Too Large - body over the configured limit
/// - 422 Unprocessable Entity - field validation
/// - 429 Too Many Requests - client budget exhausted
/// - 500 Internal Server Error - storage or internal failures, logged in full
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => envelope(StatusCode::BAD_REQUEST, message),
            Self::PayloadTooLarge => envelope(
                StatusCode::PAYLOAD_TOO_LARGE,
                Self::PayloadTooLarge.to_string(),
            ),
            Self::RouteNotFound => envelope(
                StatusCode::NOT_FOUND,
                "the requested resource could not be found",
            ),
            Self::MethodNotAllowed(method) => envelope(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("the {method} method is not supported for this resource"),
            ),
            Self::Domain(err) => match err {
                DomainError::Validation(errors) => {
                    envelope(StatusCode::UNPROCESSABLE_ENTITY, validation_json(&errors))
                }
                DomainError::NotFound => envelope(
                    StatusCode::NOT_FOUND,
                    "the requested resource could not be found",
                ),
                DomainError::EditConflict => envelope(
                    StatusCode::CONFLICT,
                    "unable to update the record due to an edit conflict, please try again",
                ),
                DomainError::InvalidCredentials => envelope(
                    StatusCode::UNAUTHORIZED,
                    "invalid authentication credentials",
                ),
                DomainError::InvalidAuthenticationToken => {
                    unauthorized("invalid or missing authentication token")
                }
                DomainError::AuthenticationRequired => {
                    unauthorized("you must be authenticated to access this resource")
                }
                DomainError::InactiveAccount => envelope(
                    StatusCode::FORBIDDEN,
                    "your user account must be activated to access this resource",
                ),
                DomainError::NotPermitted(code) => {
                    tracing::debug!(permission = %code, "permission denied");
                    envelope(
                        StatusCode::FORBIDDEN,
                        "your user account doesn't have the necessary permissions to access this resource",
                    )
                }
                DomainError::RateLimited => {
                    let mut response =
                        envelope(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded");
                    response
                        .headers_mut()
                        .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
                    response
                }
                DomainError::Storage(detail) | DomainError::Internal(detail) => {
                    tracing::error!(error = %detail, "request failed");
                    server_error()
                }
            },
        }
    }
}

/// The generic 500 envelope; details stay in the logs.
pub fn server_error() -> Response {
    envelope(
        StatusCode::INTERNAL_SERVER_ERROR,
        "the server encountered a problem and could not process your request",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use domains::ValidationErrors;

    async fn body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_envelope_is_field_map() {
        let response =
            ApiError::from(DomainError::from(ValidationErrors::single("topic", "must be provided")))
                .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body(response).await,
            json!({"error": {"topic": "must be provided"}})
        );
    }

    #[tokio::test]
    async fn unauthenticated_responses_challenge_for_bearer() {
        let response = ApiError::from(DomainError::AuthenticationRequired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let response = ApiError::from(DomainError::RateLimited).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }

    #[tokio::test]
    async fn storage_details_are_not_leaked() {
        let response =
            ApiError::from(DomainError::Storage("relation \"forums\" does not exist".into()))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = body(response).await.to_string();
        assert!(!text.contains("relation"));
    }

    #[tokio::test]
    async fn each_kind_has_its_status() {
        let cases = [
            (DomainError::NotFound, StatusCode::NOT_FOUND),
            (DomainError::EditConflict, StatusCode::CONFLICT),
            (DomainError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (DomainError::InvalidAuthenticationToken, StatusCode::UNAUTHORIZED),
            (DomainError::InactiveAccount, StatusCode::FORBIDDEN),
            (DomainError::NotPermitted("forums:write".into()), StatusCode::FORBIDDEN),
            (DomainError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
        assert_eq!(
            ApiError::MethodNotAllowed(Method::PUT).into_response().status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ApiError::PayloadTooLarge.into_response().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
