use crate::error::ApiError;
use crate::models::{ChannelProfile, User, UserView, VideoListItem};
use crate::services::media_service::MediaService;
use crate::services::token_service::TokenService;
use chrono::Utc;
use futures::TryStreamExt;
use log::info;
use mongodb::bson::{doc, from_document, oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Collection, Database};
use std::path::PathBuf;

pub struct RegisterInput {
    pub full_name: String,
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub avatar_path: PathBuf,
    pub cover_image_path: Option<PathBuf>,
}

fn users(db: &Database) -> Collection<User> {
    db.collection::<User>("users")
}

pub async fn find_by_id(db: &Database, id: ObjectId) -> Result<Option<User>, ApiError> {
    Ok(users(db).find_one(doc! { "_id": id }, None).await?)
}

pub fn validate_registration(input: &RegisterInput) -> Result<(), ApiError> {
    let required = [
        &input.full_name,
        &input.user_name,
        &input.email,
        &input.password,
    ];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(ApiError::validation("All fields are required"));
    }
    Ok(())
}

pub async fn register(
    db: &Database,
    media: &MediaService,
    input: RegisterInput,
) -> Result<UserView, ApiError> {
    validate_registration(&input)?;

    let user_name = input.user_name.trim().to_lowercase();
    let email = input.email.trim().to_lowercase();

    let existing = users(db)
        .find_one(
            doc! { "$or": [ { "userName": user_name.as_str() }, { "email": email.as_str() } ] },
            None,
        )
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "User with this userName or email is already registered",
        ));
    }

    let avatar = media.upload(&input.avatar_path).await?;
    let cover_image = match &input.cover_image_path {
        Some(path) => Some(media.upload(path).await?),
        None => None,
    };

    let now = Utc::now();
    let user = User {
        id: None,
        user_name,
        full_name: input.full_name.trim().to_string(),
        email,
        avatar: avatar.url,
        cover_image: cover_image.map(|asset| asset.url),
        password: bcrypt::hash(&input.password, bcrypt::DEFAULT_COST)?,
        refresh_token: None,
        watch_history: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    let inserted = users(db).insert_one(&user, None).await?;
    let id = inserted
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal("insert did not return an ObjectId"))?;

    let created = find_by_id(db, id)
        .await?
        .ok_or_else(|| ApiError::internal("created user is missing"))?;
    info!("Registered user {}", created.user_name);
    Ok(created.into())
}

pub async fn login(
    db: &Database,
    tokens: &TokenService,
    email: &str,
    password: &str,
) -> Result<(UserView, String, String), ApiError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }

    let user = users(db)
        .find_one(doc! { "email": email.trim().to_lowercase() }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    if !bcrypt::verify(password, &user.password)? {
        return Err(ApiError::unauthorized("Invalid user credentials"));
    }

    let (access, refresh) = issue_session(db, tokens, &user).await?;
    Ok((user.into(), access, refresh))
}

/// Issue a fresh access/refresh pair and persist the refresh token on the
/// user record. The previous refresh token stops matching and is dead.
async fn issue_session(
    db: &Database,
    tokens: &TokenService,
    user: &User,
) -> Result<(String, String), ApiError> {
    let id = user
        .id
        .ok_or_else(|| ApiError::internal("user document is missing _id"))?;

    let access = tokens.issue_access(id, &user.user_name, &user.email, &user.full_name)?;
    let refresh = tokens.issue_refresh(id)?;

    users(db)
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "refreshToken": refresh.as_str(), "updatedAt": BsonDateTime::now() } },
            None,
        )
        .await?;

    Ok((access, refresh))
}

pub async fn logout(db: &Database, user_id: ObjectId) -> Result<(), ApiError> {
    users(db)
        .update_one(
            doc! { "_id": user_id },
            doc! { "$unset": { "refreshToken": 1 } },
            None,
        )
        .await?;
    Ok(())
}

/// Refresh exchange. The presented token must verify and byte-equal the
/// stored one. A verified token that no longer matches means it was
/// already rotated or replaced; the session is terminated so the stale
/// token cannot be retried.
pub async fn refresh_session(
    db: &Database,
    tokens: &TokenService,
    incoming: &str,
) -> Result<(String, String), ApiError> {
    let claims = tokens.verify_refresh(incoming)?;
    let id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    let user = find_by_id(db, id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    if user.refresh_token.as_deref() != Some(incoming) {
        logout(db, id).await?;
        return Err(ApiError::unauthorized("Refresh token is expired or used"));
    }

    issue_session(db, tokens, &user).await
}

pub async fn change_password(
    db: &Database,
    user_id: ObjectId,
    old_password: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    if old_password.is_empty() || new_password.is_empty() {
        return Err(ApiError::validation("Both passwords are required"));
    }

    let user = find_by_id(db, user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    if !bcrypt::verify(old_password, &user.password)? {
        return Err(ApiError::unauthorized("Invalid user credentials"));
    }

    let hashed = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)?;
    users(db)
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { "password": hashed, "updatedAt": BsonDateTime::now() } },
            None,
        )
        .await?;
    Ok(())
}

pub async fn update_account(
    db: &Database,
    user_id: ObjectId,
    full_name: Option<&str>,
    email: Option<&str>,
) -> Result<UserView, ApiError> {
    let mut changes = Document::new();
    if let Some(full_name) = full_name {
        if full_name.trim().is_empty() {
            return Err(ApiError::validation("fullName must not be empty"));
        }
        changes.insert("fullName", full_name.trim());
    }
    if let Some(email) = email {
        if email.trim().is_empty() {
            return Err(ApiError::validation("email must not be empty"));
        }
        changes.insert("email", email.trim().to_lowercase());
    }
    if changes.is_empty() {
        return Err(ApiError::validation("Nothing to update"));
    }
    changes.insert("updatedAt", BsonDateTime::now());

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let updated = users(db)
        .find_one_and_update(doc! { "_id": user_id }, doc! { "$set": changes }, options)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(updated.into())
}

pub async fn update_avatar(
    db: &Database,
    media: &MediaService,
    user_id: ObjectId,
    avatar_path: &PathBuf,
) -> Result<UserView, ApiError> {
    let asset = media.upload(avatar_path).await?;

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let updated = users(db)
        .find_one_and_update(
            doc! { "_id": user_id },
            doc! { "$set": { "avatar": asset.url, "updatedAt": BsonDateTime::now() } },
            options,
        )
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(updated.into())
}

/// Channel profile read model: subscriber/subscribed-to counts from the
/// cardinality of the joined subscription sets, `isSubscribed` from the
/// viewer's membership in the subscriber set. Only public fields survive
/// the final projection.
pub fn channel_profile_pipeline(user_name: &str, viewer: Option<ObjectId>) -> Vec<Document> {
    let is_subscribed: Bson = match viewer {
        Some(viewer) => Bson::from(doc! { "$in": [viewer, "$subscribers.subscriber"] }),
        None => Bson::Boolean(false),
    };

    vec![
        doc! { "$match": { "userName": user_name.to_lowercase() } },
        doc! { "$lookup": {
            "from": "subscriptions",
            "localField": "_id",
            "foreignField": "channel",
            "as": "subscribers",
        } },
        doc! { "$lookup": {
            "from": "subscriptions",
            "localField": "_id",
            "foreignField": "subscriber",
            "as": "subscribedTo",
        } },
        doc! { "$addFields": {
            "subscribersCount": { "$size": "$subscribers" },
            "channelsSubscribedToCount": { "$size": "$subscribedTo" },
            "isSubscribed": is_subscribed,
        } },
        doc! { "$project": {
            "userName": 1,
            "fullName": 1,
            "email": 1,
            "avatar": 1,
            "coverImage": 1,
            "subscribersCount": 1,
            "channelsSubscribedToCount": 1,
            "isSubscribed": 1,
            "createdAt": 1,
        } },
    ]
}

pub async fn channel_profile(
    db: &Database,
    user_name: &str,
    viewer: Option<ObjectId>,
) -> Result<ChannelProfile, ApiError> {
    let mut cursor = users(db)
        .aggregate(channel_profile_pipeline(user_name, viewer), None)
        .await?;
    let profile = cursor
        .try_next()
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;
    Ok(from_document(profile)?)
}

/// Watch history read model: the stored id set expanded into video
/// documents, each with its owner's public profile joined in.
pub fn watch_history_pipeline(user_id: ObjectId) -> Vec<Document> {
    vec![
        doc! { "$match": { "_id": user_id } },
        doc! { "$lookup": {
            "from": "videos",
            "localField": "watchHistory",
            "foreignField": "_id",
            "as": "watchHistory",
            "pipeline": [
                { "$lookup": {
                    "from": "users",
                    "localField": "owner",
                    "foreignField": "_id",
                    "as": "owner",
                    "pipeline": [
                        { "$project": { "userName": 1, "fullName": 1, "avatar": 1 } },
                    ],
                } },
                { "$addFields": { "owner": { "$first": "$owner" } } },
            ],
        } },
        doc! { "$project": { "watchHistory": 1 } },
    ]
}

pub async fn watch_history(
    db: &Database,
    user_id: ObjectId,
) -> Result<Vec<VideoListItem>, ApiError> {
    let mut cursor = users(db)
        .aggregate(watch_history_pipeline(user_id), None)
        .await?;
    let document = cursor
        .try_next()
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let mut history = Vec::new();
    if let Ok(entries) = document.get_array("watchHistory") {
        for entry in entries {
            if let Bson::Document(video) = entry {
                history.push(from_document::<VideoListItem>(video.clone())?);
            }
        }
    }
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_input(full_name: &str) -> RegisterInput {
        RegisterInput {
            full_name: full_name.to_string(),
            user_name: "Alice".to_string(),
            email: "Alice@Example.com".to_string(),
            password: "hunter2!".to_string(),
            avatar_path: PathBuf::from("/tmp/avatar.png"),
            cover_image_path: None,
        }
    }

    #[test]
    fn blank_full_name_is_a_validation_error() {
        let err = validate_registration(&register_input("   ")).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn complete_registration_passes_validation() {
        assert!(validate_registration(&register_input("Alice A.")).is_ok());
    }

    #[test]
    fn stored_credential_is_never_the_plaintext() {
        let hashed = bcrypt::hash("hunter2!", bcrypt::DEFAULT_COST).unwrap();
        assert_ne!(hashed, "hunter2!");
        assert!(bcrypt::verify("hunter2!", &hashed).unwrap());
        assert!(!bcrypt::verify("wrong", &hashed).unwrap());
    }

    #[test]
    fn channel_profile_projects_public_fields_only() {
        let pipeline = channel_profile_pipeline("Chai", Some(ObjectId::new()));
        let projection = pipeline
            .last()
            .unwrap()
            .get_document("$project")
            .unwrap();
        assert!(!projection.contains_key("password"));
        assert!(!projection.contains_key("refreshToken"));
        assert!(!projection.contains_key("watchHistory"));
        assert!(projection.contains_key("subscribersCount"));
    }

    #[test]
    fn channel_profile_matches_lowercased_name() {
        let pipeline = channel_profile_pipeline("Chai", None);
        let matcher = pipeline[0].get_document("$match").unwrap();
        assert_eq!(matcher.get_str("userName").unwrap(), "chai");
    }

    #[test]
    fn anonymous_viewer_is_never_subscribed() {
        let pipeline = channel_profile_pipeline("chai", None);
        let fields = pipeline[3].get_document("$addFields").unwrap();
        assert_eq!(fields.get_bool("isSubscribed").unwrap(), false);
    }

    #[test]
    fn watch_history_owner_join_is_projected() {
        let pipeline = watch_history_pipeline(ObjectId::new());
        let lookup = pipeline[1].get_document("$lookup").unwrap();
        let inner = lookup.get_array("pipeline").unwrap();
        let owner_lookup = inner[0]
            .as_document()
            .unwrap()
            .get_document("$lookup")
            .unwrap();
        let owner_projection = owner_lookup.get_array("pipeline").unwrap()[0]
            .as_document()
            .unwrap()
            .get_document("$project")
            .unwrap();
        assert!(!owner_projection.contains_key("password"));
        assert!(!owner_projection.contains_key("refreshToken"));
        assert!(owner_projection.contains_key("userName"));
    }
}
