use crate::api::{discard_staged, stage_upload};
use crate::auth::{AuthUser, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::error::{ApiError, ApiResponse};
use crate::models::{
    ChannelProfile, LoginData, RefreshedTokens, UserView, VideoListItem,
};
use crate::services::user_service::{self, RegisterInput};
use crate::AppState;
use log::info;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::serde::json::Json;
use rocket::{get, patch, post, FromForm, State};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(FromForm)]
pub struct RegisterForm<'r> {
    #[field(name = "fullName")]
    pub full_name: Option<String>,
    #[field(name = "userName")]
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<TempFile<'r>>,
    #[field(name = "coverImage")]
    pub cover_image: Option<TempFile<'r>>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(FromForm)]
pub struct AvatarForm<'r> {
    pub avatar: Option<TempFile<'r>>,
}

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie
}

fn set_session_cookies(jar: &CookieJar<'_>, access: &str, refresh: &str) {
    jar.add(session_cookie(ACCESS_TOKEN_COOKIE, access.to_string()));
    jar.add(session_cookie(REFRESH_TOKEN_COOKIE, refresh.to_string()));
}

fn clear_session_cookies(jar: &CookieJar<'_>) {
    jar.remove(Cookie::from(ACCESS_TOKEN_COOKIE));
    jar.remove(Cookie::from(REFRESH_TOKEN_COOKIE));
}

#[post("/register", data = "<form>")]
pub async fn register(
    form: Form<RegisterForm<'_>>,
    state: &State<AppState>,
) -> Result<ApiResponse<UserView>, ApiError> {
    let mut form = form.into_inner();

    let Some(avatar) = form.avatar.as_mut() else {
        return Err(ApiError::validation("Avatar is required"));
    };
    let avatar_path = stage_upload(avatar, &state.config.upload_dir).await?;
    let cover_image_path = match form.cover_image.as_mut() {
        Some(file) => Some(stage_upload(file, &state.config.upload_dir).await?),
        None => None,
    };

    let input = RegisterInput {
        full_name: form.full_name.clone().unwrap_or_default(),
        user_name: form.user_name.clone().unwrap_or_default(),
        email: form.email.clone().unwrap_or_default(),
        password: form.password.clone().unwrap_or_default(),
        avatar_path: avatar_path.clone(),
        cover_image_path: cover_image_path.clone(),
    };
    let created = user_service::register(&state.db, &state.media, input).await;

    discard_staged(&avatar_path).await;
    if let Some(path) = &cover_image_path {
        discard_staged(path).await;
    }

    Ok(ApiResponse::created(
        created?,
        "User registered successfully",
    ))
}

#[post("/login", data = "<body>")]
pub async fn login(
    body: Json<LoginRequest>,
    jar: &CookieJar<'_>,
    state: &State<AppState>,
) -> Result<ApiResponse<LoginData>, ApiError> {
    let email = body.email.as_deref().unwrap_or_default();
    let password = body.password.as_deref().unwrap_or_default();

    let (user, access, refresh) = user_service::login(&state.db, &state.tokens, email, password).await?;
    set_session_cookies(jar, &access, &refresh);

    Ok(ApiResponse::ok(
        LoginData {
            user,
            access_token: access,
            refresh_token: refresh,
        },
        "Login successful",
    ))
}

#[post("/logout")]
pub async fn logout(
    user: AuthUser,
    jar: &CookieJar<'_>,
    state: &State<AppState>,
) -> Result<ApiResponse<Value>, ApiError> {
    user_service::logout(&state.db, user.id).await?;
    clear_session_cookies(jar);
    info!("User {} logged out", user.user_name);
    Ok(ApiResponse::ok(json!({}), "User logged out successfully"))
}

#[post("/refresh-token", data = "<body>")]
pub async fn refresh_token(
    body: Option<Json<RefreshTokenRequest>>,
    jar: &CookieJar<'_>,
    state: &State<AppState>,
) -> Result<ApiResponse<RefreshedTokens>, ApiError> {
    let incoming = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| body.and_then(|body| body.refresh_token.clone()))
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let (access, refresh) =
        user_service::refresh_session(&state.db, &state.tokens, &incoming).await?;
    set_session_cookies(jar, &access, &refresh);

    Ok(ApiResponse::ok(
        RefreshedTokens {
            access_token: access,
            refresh_token: refresh,
        },
        "Access token refreshed",
    ))
}

#[post("/change-password", data = "<body>")]
pub async fn change_password(
    user: AuthUser,
    body: Json<ChangePasswordRequest>,
    state: &State<AppState>,
) -> Result<ApiResponse<Value>, ApiError> {
    let old_password = body.old_password.as_deref().unwrap_or_default();
    let new_password = body.new_password.as_deref().unwrap_or_default();
    user_service::change_password(&state.db, user.id, old_password, new_password).await?;
    Ok(ApiResponse::ok(json!({}), "Password changed successfully"))
}

#[get("/get-user")]
pub async fn get_user(
    user: AuthUser,
    state: &State<AppState>,
) -> Result<ApiResponse<UserView>, ApiError> {
    let current = user_service::find_by_id(&state.db, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::ok(current.into(), "User fetched successfully"))
}

#[patch("/update-account", data = "<body>")]
pub async fn update_account(
    user: AuthUser,
    body: Json<UpdateAccountRequest>,
    state: &State<AppState>,
) -> Result<ApiResponse<UserView>, ApiError> {
    let updated = user_service::update_account(
        &state.db,
        user.id,
        body.full_name.as_deref(),
        body.email.as_deref(),
    )
    .await?;
    Ok(ApiResponse::ok(updated, "Account updated successfully"))
}

#[patch("/avatar", data = "<form>")]
pub async fn update_avatar(
    user: AuthUser,
    form: Form<AvatarForm<'_>>,
    state: &State<AppState>,
) -> Result<ApiResponse<UserView>, ApiError> {
    let mut form = form.into_inner();
    let Some(avatar) = form.avatar.as_mut() else {
        return Err(ApiError::validation("Avatar file is required"));
    };

    let staged = stage_upload(avatar, &state.config.upload_dir).await?;
    let updated = user_service::update_avatar(&state.db, &state.media, user.id, &staged).await;
    discard_staged(&staged).await;

    Ok(ApiResponse::ok(updated?, "Avatar updated successfully"))
}

#[get("/channel-profile/<user_name>")]
pub async fn channel_profile(
    user: AuthUser,
    user_name: &str,
    state: &State<AppState>,
) -> Result<ApiResponse<ChannelProfile>, ApiError> {
    if user_name.trim().is_empty() {
        return Err(ApiError::validation("userName is required"));
    }
    let profile = user_service::channel_profile(&state.db, user_name, Some(user.id)).await?;
    Ok(ApiResponse::ok(
        profile,
        "Channel profile fetched successfully",
    ))
}

#[get("/watch-history")]
pub async fn watch_history(
    user: AuthUser,
    state: &State<AppState>,
) -> Result<ApiResponse<Vec<VideoListItem>>, ApiError> {
    let history = user_service::watch_history(&state.db, user.id).await?;
    Ok(ApiResponse::ok(
        history,
        "Watch history fetched successfully",
    ))
}
