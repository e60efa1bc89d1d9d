use crate::api::{discard_staged, parse_object_id, stage_upload};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResponse};
use crate::models::{VideoDetail, VideoListResponse, VideoView};
use crate::services::pagination::PageParams;
use crate::services::video_service;
use crate::AppState;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::{delete, get, patch, post, FromForm, State};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(FromForm)]
pub struct VideoListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub query: Option<String>,
    #[field(name = "sortBy")]
    pub sort_by: Option<String>,
    #[field(name = "sortType")]
    pub sort_type: Option<String>,
    #[field(name = "userId")]
    pub user_id: Option<String>,
}

#[derive(FromForm)]
pub struct PublishVideoForm<'r> {
    pub title: Option<String>,
    pub description: Option<String>,
    #[field(name = "videoFile")]
    pub video_file: Option<TempFile<'r>>,
    pub thumbnail: Option<TempFile<'r>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[get("/?<q..>")]
pub async fn list_videos(
    _user: AuthUser,
    q: VideoListQuery,
    state: &State<AppState>,
) -> Result<ApiResponse<VideoListResponse>, ApiError> {
    let owner = match q.user_id.as_deref() {
        Some(raw) => Some(parse_object_id(raw, "user")?),
        None => None,
    };
    let ascending = q.sort_type.as_deref() == Some("asc");
    let params = PageParams::new(q.page, q.limit, video_service::DEFAULT_PAGE_SIZE);

    let page = video_service::list_videos(
        &state.db,
        q.query.as_deref().unwrap_or(""),
        owner,
        q.sort_by.as_deref(),
        ascending,
        &params,
    )
    .await?;

    let message = if page.total == 0 {
        "No video found"
    } else {
        "Videos fetched successfully"
    };
    let response = VideoListResponse {
        total_videos: page.total,
        page: page.page,
        limit: page.limit,
        total_pages: page.total_pages(),
        videos: page.items,
    };
    Ok(ApiResponse::ok(response, message))
}

#[post("/", data = "<form>")]
pub async fn publish_video(
    user: AuthUser,
    form: Form<PublishVideoForm<'_>>,
    state: &State<AppState>,
) -> Result<ApiResponse<VideoView>, ApiError> {
    let mut form = form.into_inner();
    let (Some(video_file), Some(thumbnail)) = (form.video_file.as_mut(), form.thumbnail.as_mut())
    else {
        return Err(ApiError::validation("Video and thumbnail are required"));
    };

    let video_path = stage_upload(video_file, &state.config.upload_dir).await?;
    let thumbnail_path = stage_upload(thumbnail, &state.config.upload_dir).await?;

    let published = video_service::publish_video(
        &state.db,
        &state.media,
        user.id,
        form.title.as_deref().unwrap_or_default(),
        form.description.as_deref().unwrap_or_default(),
        &video_path,
        &thumbnail_path,
    )
    .await;

    discard_staged(&video_path).await;
    discard_staged(&thumbnail_path).await;

    Ok(ApiResponse::created(
        published?,
        "Video published successfully",
    ))
}

#[get("/<id>")]
pub async fn get_video(
    user: AuthUser,
    id: &str,
    state: &State<AppState>,
) -> Result<ApiResponse<VideoDetail>, ApiError> {
    let video_id = parse_object_id(id, "video")?;
    let detail = video_service::get_video(&state.db, video_id, Some(user.id)).await?;
    Ok(ApiResponse::ok(detail, "Video fetched successfully"))
}

#[patch("/<id>", data = "<body>")]
pub async fn update_video(
    user: AuthUser,
    id: &str,
    body: Json<UpdateVideoRequest>,
    state: &State<AppState>,
) -> Result<ApiResponse<VideoView>, ApiError> {
    let video_id = parse_object_id(id, "video")?;
    let updated = video_service::update_video(
        &state.db,
        video_id,
        user.id,
        body.title.as_deref(),
        body.description.as_deref(),
    )
    .await?;
    Ok(ApiResponse::ok(updated, "Video updated successfully"))
}

#[delete("/<id>")]
pub async fn delete_video(
    user: AuthUser,
    id: &str,
    state: &State<AppState>,
) -> Result<ApiResponse<Value>, ApiError> {
    let video_id = parse_object_id(id, "video")?;
    video_service::delete_video(&state.db, &state.media, video_id, user.id).await?;
    Ok(ApiResponse::ok(json!({}), "Video deleted successfully"))
}
