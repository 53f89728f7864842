use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domains::Registration;
use serde_json::json;

use crate::dto::{user_json, ActivateRequest, ChangePasswordRequest, RegisterRequest};
use crate::error::ApiError;
use crate::extract::{ApiJson, CurrentUser};
use crate::state::AppState;

/// `POST /v1/users`
///
/// The account starts inactive; the activation token travels by mail only.
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RegisterRequest>,
) -> Result<Response, ApiError> {
    let user = state
        .users
        .register(Registration {
            username: input.username,
            email: input.email,
            password: input.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "user": user_json(&user) }))).into_response())
}

/// `PUT /v1/users/activated`
pub async fn activate_user(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ActivateRequest>,
) -> Result<Response, ApiError> {
    let user = state.users.activate(&input.token).await?;
    Ok(Json(json!({ "user": user_json(&user) })).into_response())
}

/// `PUT /v1/users/password`
///
/// Every authentication token of the user is revoked, the current one included.
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<ChangePasswordRequest>,
) -> Result<Response, ApiError> {
    state
        .users
        .change_password(&user, &input.current_password, &input.new_password)
        .await?;
    Ok(Json(json!({ "message": "your password was successfully updated" })).into_response())
}
