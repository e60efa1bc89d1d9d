use crate::services::user_service;
use crate::AppState;
use mongodb::bson::oid::ObjectId;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::Request;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// The authenticated requester, resolved from the access token in the
/// `accessToken` cookie or an `Authorization: Bearer` header. Resolution
/// re-reads the user so a deleted account stops authenticating at once.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: ObjectId,
    pub user_name: String,
}

fn token_from_request(request: &Request<'_>) -> Option<String> {
    if let Some(cookie) = request.cookies().get(ACCESS_TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }
    request
        .headers()
        .get_one("Authorization")
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::to_string)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = &'static str;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(state) = request.rocket().state::<AppState>() else {
            return Outcome::Error((Status::InternalServerError, "application state missing"));
        };

        let Some(token) = token_from_request(request) else {
            return Outcome::Error((Status::Unauthorized, "missing access token"));
        };

        let claims = match state.tokens.verify_access(&token) {
            Ok(claims) => claims,
            Err(_) => {
                return Outcome::Error((Status::Unauthorized, "invalid or expired access token"))
            }
        };
        let Ok(id) = ObjectId::parse_str(&claims.sub) else {
            return Outcome::Error((Status::Unauthorized, "invalid access token"));
        };

        match user_service::find_by_id(&state.db, id).await {
            Ok(Some(user)) => Outcome::Success(AuthUser {
                id,
                user_name: user.user_name,
            }),
            Ok(None) => Outcome::Error((Status::Unauthorized, "user no longer exists")),
            Err(_) => Outcome::Error((Status::InternalServerError, "database error")),
        }
    }
}
