use crate::api::parse_object_id;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResponse};
use crate::models::PlaylistPayload;
use crate::services::playlist_service;
use crate::AppState;
use rocket::serde::json::Json;
use rocket::{delete, get, patch, post, State};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[post("/", data = "<body>")]
pub async fn create_playlist(
    user: AuthUser,
    body: Json<CreatePlaylistRequest>,
    state: &State<AppState>,
) -> Result<ApiResponse<PlaylistPayload>, ApiError> {
    let created = playlist_service::create(
        &state.db,
        user.id,
        body.name.as_deref().unwrap_or_default(),
        body.description.as_deref().unwrap_or_default(),
    )
    .await?;
    Ok(ApiResponse::created(created, "Playlist created"))
}

#[get("/<playlist_id>")]
pub async fn get_playlist(
    _user: AuthUser,
    playlist_id: &str,
    state: &State<AppState>,
) -> Result<ApiResponse<PlaylistPayload>, ApiError> {
    let playlist_id = parse_object_id(playlist_id, "playlist")?;
    let playlist = playlist_service::get(&state.db, playlist_id).await?;
    Ok(ApiResponse::ok(playlist, "Playlist fetched successfully"))
}

#[get("/user/<user_id>")]
pub async fn get_user_playlists(
    _user: AuthUser,
    user_id: &str,
    state: &State<AppState>,
) -> Result<ApiResponse<Vec<PlaylistPayload>>, ApiError> {
    let owner = parse_object_id(user_id, "user")?;
    let playlists = playlist_service::list_for_user(&state.db, owner).await?;
    Ok(ApiResponse::ok(playlists, "Playlists fetched successfully"))
}

#[patch("/add/<video_id>/<playlist_id>")]
pub async fn add_video_to_playlist(
    user: AuthUser,
    video_id: &str,
    playlist_id: &str,
    state: &State<AppState>,
) -> Result<ApiResponse<PlaylistPayload>, ApiError> {
    let video_id = parse_object_id(video_id, "video")?;
    let playlist_id = parse_object_id(playlist_id, "playlist")?;
    let updated = playlist_service::add_video(&state.db, playlist_id, video_id, user.id).await?;
    Ok(ApiResponse::ok(updated, "Video added to the playlist"))
}

#[patch("/remove/<video_id>/<playlist_id>")]
pub async fn remove_video_from_playlist(
    user: AuthUser,
    video_id: &str,
    playlist_id: &str,
    state: &State<AppState>,
) -> Result<ApiResponse<PlaylistPayload>, ApiError> {
    let video_id = parse_object_id(video_id, "video")?;
    let playlist_id = parse_object_id(playlist_id, "playlist")?;
    let updated = playlist_service::remove_video(&state.db, playlist_id, video_id, user.id).await?;
    Ok(ApiResponse::ok(updated, "Video removed from the playlist"))
}

#[delete("/<playlist_id>")]
pub async fn delete_playlist(
    user: AuthUser,
    playlist_id: &str,
    state: &State<AppState>,
) -> Result<ApiResponse<Value>, ApiError> {
    let playlist_id = parse_object_id(playlist_id, "playlist")?;
    playlist_service::delete(&state.db, playlist_id, user.id).await?;
    Ok(ApiResponse::ok(json!({}), "Playlist deleted successfully"))
}
