//! # Handlers
//!
//! Each handler decodes its input, calls exactly one service operation and
//! wraps the result in a named top-level key.

pub mod forums;
pub mod healthcheck;
pub mod tokens;
pub mod users;

use axum::{extract::OriginalUri, http::Method};

use crate::error::ApiError;

pub async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    tracing::debug!(path = %uri.path(), "no route matched");
    ApiError::RouteNotFound
}

pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}
