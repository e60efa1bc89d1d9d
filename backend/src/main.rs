#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod config;
mod error;
mod models;
mod services;

use config::AppConfig;
use mongodb::Database;
use services::media_service::MediaService;
use services::token_service::TokenService;

pub struct AppState {
    pub db: Database,
    pub media: MediaService,
    pub tokens: TokenService,
    pub config: AppConfig,
}

#[launch]
async fn rocket() -> _ {
    config::load_environment();
    config::init_logger();

    let state = config::create_app_state()
        .await
        .expect("Application state setup failed.");
    let cors = config::create_cors(&state.config).expect("CORS setup failed.");

    rocket::build()
        .manage(state)
        .attach(cors)
        .mount(
            "/users",
            routes![
                api::user::register,
                api::user::login,
                api::user::logout,
                api::user::refresh_token,
                api::user::change_password,
                api::user::get_user,
                api::user::update_account,
                api::user::update_avatar,
                api::user::channel_profile,
                api::user::watch_history,
            ],
        )
        .mount(
            "/videos",
            routes![
                api::video::list_videos,
                api::video::publish_video,
                api::video::get_video,
                api::video::update_video,
                api::video::delete_video,
            ],
        )
        .mount(
            "/comments",
            routes![
                api::comment::list_comments,
                api::comment::add_comment,
                api::comment::update_comment,
                api::comment::delete_comment,
            ],
        )
        .mount(
            "/likes",
            routes![api::like::toggle_video_like, api::like::toggle_comment_like],
        )
        .mount(
            "/playlists",
            routes![
                api::playlist::create_playlist,
                api::playlist::get_playlist,
                api::playlist::get_user_playlists,
                api::playlist::add_video_to_playlist,
                api::playlist::remove_video_from_playlist,
                api::playlist::delete_playlist,
            ],
        )
        .mount(
            "/subscriptions",
            routes![
                api::subscription::toggle_subscription,
                api::subscription::list_subscribers,
            ],
        )
        .register(
            "/",
            catchers![
                api::bad_request,
                api::unauthorized,
                api::forbidden,
                api::not_found,
                api::unprocessable,
                api::internal_error,
            ],
        )
}
