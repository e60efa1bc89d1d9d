use crate::api::parse_object_id;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResponse};
use crate::models::{SubscriberListResponse, SubscriptionToggled};
use crate::services::subscription_service;
use crate::AppState;
use rocket::{get, post, State};

#[post("/c/<channel_id>")]
pub async fn toggle_subscription(
    user: AuthUser,
    channel_id: &str,
    state: &State<AppState>,
) -> Result<ApiResponse<SubscriptionToggled>, ApiError> {
    let channel_id = parse_object_id(channel_id, "channel")?;
    let subscribed = subscription_service::toggle(&state.db, channel_id, user.id).await?;
    let message = if subscribed {
        "Subscribed to the channel"
    } else {
        "Unsubscribed from the channel"
    };
    Ok(ApiResponse::ok(SubscriptionToggled { subscribed }, message))
}

#[get("/c/<channel_id>")]
pub async fn list_subscribers(
    _user: AuthUser,
    channel_id: &str,
    state: &State<AppState>,
) -> Result<ApiResponse<SubscriberListResponse>, ApiError> {
    let channel_id = parse_object_id(channel_id, "channel")?;
    let subscribers = subscription_service::list_subscribers(&state.db, channel_id).await?;
    let response = SubscriberListResponse {
        total_subscribers: subscribers.len() as u64,
        subscribers,
    };
    Ok(ApiResponse::ok(response, "Subscribers fetched successfully"))
}
