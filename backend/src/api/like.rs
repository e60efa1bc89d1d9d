use crate::api::parse_object_id;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResponse};
use crate::models::LikeToggled;
use crate::services::like_service;
use crate::AppState;
use rocket::{post, State};

#[post("/toggle/v/<video_id>")]
pub async fn toggle_video_like(
    user: AuthUser,
    video_id: &str,
    state: &State<AppState>,
) -> Result<ApiResponse<LikeToggled>, ApiError> {
    let video_id = parse_object_id(video_id, "video")?;
    let is_liked = like_service::toggle_video_like(&state.db, video_id, user.id).await?;
    let message = if is_liked { "Like added" } else { "Like removed" };
    Ok(ApiResponse::ok(LikeToggled { is_liked }, message))
}

#[post("/toggle/c/<comment_id>")]
pub async fn toggle_comment_like(
    user: AuthUser,
    comment_id: &str,
    state: &State<AppState>,
) -> Result<ApiResponse<LikeToggled>, ApiError> {
    let comment_id = parse_object_id(comment_id, "comment")?;
    let is_liked = like_service::toggle_comment_like(&state.db, comment_id, user.id).await?;
    let message = if is_liked { "Like added" } else { "Like removed" };
    Ok(ApiResponse::ok(LikeToggled { is_liked }, message))
}
