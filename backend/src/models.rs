use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize, Serializer};

/// Serialize an ObjectId as its 24-char hex form instead of extended JSON.
pub fn oid_as_hex<S: Serializer>(oid: &ObjectId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&oid.to_hex())
}

// ---------------------------------------------------------------------------
// Persisted documents
// ---------------------------------------------------------------------------

/// A remote media asset: the serving URL plus the provider-side id needed to
/// delete it later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub url: String,
    pub public_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_name: String,
    pub full_name: String,
    pub email: String,
    pub avatar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    /// bcrypt hash, never the plaintext.
    pub password: String,
    /// Single active refresh token; replaced on every issue, unset on logout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Watched video ids, insertion-ordered, deduplicated via $addToSet.
    #[serde(default)]
    pub watch_history: Vec<ObjectId>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub video_file: MediaRef,
    pub thumbnail: MediaRef,
    pub title: String,
    pub description: String,
    /// Seconds, as reported by the media provider after transcoding.
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub owner: ObjectId,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub content: String,
    pub video: ObjectId,
    pub owner: ObjectId,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Exactly one of `video`/`comment` is the primary target. A comment like
/// also records the comment's parent video.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<ObjectId>,
    pub liked_by: ObjectId,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub description: String,
    pub owner: ObjectId,
    #[serde(default)]
    pub videos: Vec<ObjectId>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub subscriber: ObjectId,
    pub channel: ObjectId,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Response payloads built from persisted documents
// ---------------------------------------------------------------------------

/// The user as it is safe to return to clients: everything except the
/// credential hash and the refresh token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_name: String,
    pub full_name: String,
    pub email: String,
    pub avatar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub watch_history: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            user_name: user.user_name,
            full_name: user.full_name,
            email: user.email,
            avatar: user.avatar,
            cover_image: user.cover_image,
            watch_history: user.watch_history.iter().map(|id| id.to_hex()).collect(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoView {
    #[serde(rename = "_id")]
    pub id: String,
    pub video_file: MediaRef,
    pub thumbnail: MediaRef,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Video> for VideoView {
    fn from(video: Video) -> Self {
        Self {
            id: video.id.map(|id| id.to_hex()).unwrap_or_default(),
            video_file: video.video_file,
            thumbnail: video.thumbnail,
            title: video.title,
            description: video.description,
            duration: video.duration,
            views: video.views,
            is_published: video.is_published,
            owner: video.owner.to_hex(),
            created_at: video.created_at,
            updated_at: video.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPayload {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    pub video: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentPayload {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id.map(|id| id.to_hex()).unwrap_or_default(),
            content: comment.content,
            video: comment.video.to_hex(),
            owner: comment.owner.to_hex(),
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistPayload {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner: String,
    pub videos: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Playlist> for PlaylistPayload {
    fn from(playlist: Playlist) -> Self {
        Self {
            id: playlist.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: playlist.name,
            description: playlist.description,
            owner: playlist.owner.to_hex(),
            videos: playlist.videos.iter().map(|id| id.to_hex()).collect(),
            created_at: playlist.created_at,
            updated_at: playlist.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregated read models
// ---------------------------------------------------------------------------

/// The public subset of a user joined into other documents. The lookup
/// pipelines project the credential fields away before this is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerProfile {
    #[serde(rename = "_id", serialize_with = "oid_as_hex")]
    pub id: ObjectId,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListItem {
    #[serde(rename = "_id", serialize_with = "oid_as_hex")]
    pub id: ObjectId,
    pub video_file: MediaRef,
    pub thumbnail: MediaRef,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerProfile>,
    #[serde(
        deserialize_with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime::deserialize"
    )]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    #[serde(rename = "_id", serialize_with = "oid_as_hex")]
    pub id: ObjectId,
    pub video_file: MediaRef,
    pub thumbnail: MediaRef,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerProfile>,
    pub likes_count: i64,
    pub is_liked: bool,
    #[serde(
        deserialize_with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime::deserialize"
    )]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(rename = "_id", serialize_with = "oid_as_hex")]
    pub id: ObjectId,
    pub content: String,
    #[serde(serialize_with = "oid_as_hex")]
    pub video: ObjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerProfile>,
    #[serde(
        deserialize_with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime::deserialize"
    )]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    #[serde(rename = "_id", serialize_with = "oid_as_hex")]
    pub id: ObjectId,
    pub user_name: String,
    pub full_name: String,
    pub email: String,
    pub avatar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
    #[serde(
        deserialize_with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime::deserialize"
    )]
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Endpoint response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub user: UserView,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggled {
    pub is_liked: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionToggled {
    pub subscribed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListResponse {
    pub total_videos: u64,
    pub videos: Vec<VideoListItem>,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListResponse {
    pub total_comments: u64,
    pub comments: Vec<CommentView>,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberListResponse {
    pub total_subscribers: u64,
    pub subscribers: Vec<OwnerProfile>,
}
