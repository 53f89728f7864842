use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use domains::{Filters, ForumPatch, NewForum, ValidationErrors};
use serde_json::json;

use crate::dto::{
    forum_json, metadata_json, AddCommentRequest, CreateForumRequest, ListForumsQuery,
    UpdateForumRequest,
};
use crate::error::ApiError;
use crate::extract::{expected_version, parse_id, ApiJson, CurrentUser};
use crate::state::AppState;

/// `POST /v1/forums`
pub async fn create_forum(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<CreateForumRequest>,
) -> Result<Response, ApiError> {
    let forum = state
        .forums
        .insert(
            &user,
            NewForum {
                topic: input.topic,
                discussion: input.discussion,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/v1/forums/{}", forum.id))],
        Json(json!({ "forum": forum_json(&forum) })),
    )
        .into_response())
}

/// `GET /v1/forums/{id}`
pub async fn show_forum(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let forum = state.forums.get(parse_id(&id)?).await?;
    Ok(Json(json!({ "forum": forum_json(&forum) })).into_response())
}

/// `PATCH /v1/forums/{id}`
///
/// Absent fields keep their stored values.
pub async fn update_forum(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<UpdateForumRequest>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let expected = expected_version(&headers)?;

    let forum = state
        .forums
        .edit(
            id,
            ForumPatch {
                topic: input.topic,
                discussion: input.discussion,
            },
            expected,
        )
        .await?;
    Ok(Json(json!({ "forum": forum_json(&forum) })).into_response())
}

/// `DELETE /v1/forums/{id}`
pub async fn delete_forum(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    state.forums.delete(parse_id(&id)?).await?;
    Ok(Json(json!({ "message": "forum successfully deleted" })).into_response())
}

/// `PATCH /v1/addComment/{id}`
pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<AddCommentRequest>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let expected = expected_version(&headers)?;

    let forum = state
        .forums
        .add_comment(id, input.comment, expected)
        .await?;
    Ok(Json(json!({ "forum": forum_json(&forum) })).into_response())
}

/// `GET /v1/forums?topic=&page=&page_size=&sort=`
pub async fn list_forums(
    State(state): State<AppState>,
    Query(query): Query<ListForumsQuery>,
) -> Result<Response, ApiError> {
    let defaults = Filters::default();
    let mut v = ValidationErrors::new();
    let page = read_int(&mut v, "page", query.page.as_deref(), defaults.page);
    let page_size = read_int(
        &mut v,
        "page_size",
        query.page_size.as_deref(),
        defaults.page_size,
    );
    v.into_result()?;

    let filters = Filters::new(page, page_size, query.sort.unwrap_or(defaults.sort));
    let search = query.topic.unwrap_or_default();

    let (forums, metadata) = state.forums.list(&search, &filters).await?;
    let forums: Vec<_> = forums.iter().map(forum_json).collect();

    Ok(Json(json!({
        "forums": forums,
        "metadata": metadata_json(&metadata),
    }))
    .into_response())
}

/// Missing or empty means `default`; anything else must be an integer.
fn read_int(v: &mut ValidationErrors, key: &str, raw: Option<&str>, default: i64) -> i64 {
    match raw {
        None | Some("") => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            v.add(key, "must be an integer value");
            default
        }),
    }
}
