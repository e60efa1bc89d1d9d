use crate::api::parse_object_id;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResponse};
use crate::models::{CommentListResponse, CommentPayload};
use crate::services::comment_service;
use crate::services::pagination::PageParams;
use crate::AppState;
use rocket::serde::json::Json;
use rocket::{delete, get, patch, post, State};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub comment: Option<String>,
}

#[get("/<video_id>?<page>&<limit>")]
pub async fn list_comments(
    _user: AuthUser,
    video_id: &str,
    page: Option<u32>,
    limit: Option<u32>,
    state: &State<AppState>,
) -> Result<ApiResponse<CommentListResponse>, ApiError> {
    let video_id = parse_object_id(video_id, "video")?;
    let params = PageParams::new(page, limit, comment_service::DEFAULT_PAGE_SIZE);

    let page = comment_service::list_for_video(&state.db, video_id, &params).await?;
    let response = CommentListResponse {
        total_comments: page.total,
        page: page.page,
        limit: page.limit,
        total_pages: page.total_pages(),
        comments: page.items,
    };
    Ok(ApiResponse::ok(
        response,
        "All comments retrieved successfully",
    ))
}

#[post("/<video_id>", data = "<body>")]
pub async fn add_comment(
    user: AuthUser,
    video_id: &str,
    body: Json<AddCommentRequest>,
    state: &State<AppState>,
) -> Result<ApiResponse<CommentPayload>, ApiError> {
    let video_id = parse_object_id(video_id, "video")?;
    let created = comment_service::add(
        &state.db,
        video_id,
        user.id,
        body.content.as_deref().unwrap_or_default(),
    )
    .await?;
    Ok(ApiResponse::created(created, "Comment added successfully"))
}

#[patch("/c/<comment_id>", data = "<body>")]
pub async fn update_comment(
    user: AuthUser,
    comment_id: &str,
    body: Json<UpdateCommentRequest>,
    state: &State<AppState>,
) -> Result<ApiResponse<CommentPayload>, ApiError> {
    let comment_id = parse_object_id(comment_id, "comment")?;
    let updated = comment_service::update(
        &state.db,
        comment_id,
        user.id,
        body.comment.as_deref().unwrap_or_default(),
    )
    .await?;
    Ok(ApiResponse::ok(updated, "Comment updated successfully"))
}

#[delete("/c/<comment_id>")]
pub async fn delete_comment(
    user: AuthUser,
    comment_id: &str,
    state: &State<AppState>,
) -> Result<ApiResponse<Value>, ApiError> {
    let comment_id = parse_object_id(comment_id, "comment")?;
    comment_service::delete(&state.db, comment_id, user.id).await?;
    Ok(ApiResponse::ok(json!({}), "Comment deleted successfully"))
}
