use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::dto::{token_json, LoginRequest};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

/// `POST /v1/tokens/authentication`
pub async fn create_authentication_token(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let issued = state
        .auth
        .create_authentication_token(&input.email, &input.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token_json(&issued) })),
    )
        .into_response())
}
