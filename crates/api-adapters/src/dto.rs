//! Wire mapping.
//!
//! Responses are built field by field so every wire name is spelled out here
//! and nowhere else. Requests default missing fields to empty so that absent
//! input reaches validation ("must be provided") instead of failing decode.

use chrono::SecondsFormat;
use domains::{Forum, IssuedToken, Metadata, User, ValidationErrors};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn forum_json(forum: &Forum) -> Value {
    json!({
        "id": forum.id,
        "user_id": forum.user_id,
        "created_at": forum.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        "topic": forum.topic,
        "discussion": forum.discussion,
        "comments": forum.comments,
        "version": forum.version,
    })
}

/// The password hash and version never leave the server.
pub fn user_json(user: &User) -> Value {
    json!({
        "id": user.id,
        "created_at": user.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        "username": user.username,
        "email": user.email,
        "activated": user.activated,
    })
}

/// `{}` when the result set is empty.
pub fn metadata_json(metadata: &Metadata) -> Value {
    if metadata.is_empty() {
        return json!({});
    }
    json!({
        "current_page": metadata.current_page,
        "page_size": metadata.page_size,
        "first_page": metadata.first_page,
        "last_page": metadata.last_page,
        "total_records": metadata.total_records,
    })
}

pub fn token_json(issued: &IssuedToken) -> Value {
    json!({
        "token": issued.plaintext,
        "expiry": issued.token.expiry.to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

pub fn validation_json(errors: &ValidationErrors) -> Value {
    Value::Object(
        errors
            .iter()
            .map(|(field, message)| (field.to_string(), Value::from(message)))
            .collect(),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreateForumRequest {
    pub topic: String,
    pub discussion: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateForumRequest {
    pub topic: Option<String>,
    pub discussion: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AddCommentRequest {
    pub comment: String,
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivateRequest {
    pub token: String,
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Raw list query. Integers stay strings until the handler can report a
/// non-integer as a field error.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListForumsQuery {
    pub topic: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
}
