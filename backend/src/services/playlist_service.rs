use crate::error::ApiError;
use crate::models::{Playlist, PlaylistPayload};
use crate::services::video_service;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{Collection, Database};

fn playlists(db: &Database) -> Collection<Playlist> {
    db.collection::<Playlist>("playlists")
}

pub async fn create(
    db: &Database,
    owner: ObjectId,
    name: &str,
    description: &str,
) -> Result<PlaylistPayload, ApiError> {
    if name.trim().is_empty() || description.trim().is_empty() {
        return Err(ApiError::validation("Name and description are required"));
    }

    let now = Utc::now();
    let mut playlist = Playlist {
        id: None,
        name: name.trim().to_string(),
        description: description.trim().to_string(),
        owner,
        videos: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    let inserted = playlists(db).insert_one(&playlist, None).await?;
    playlist.id = inserted.inserted_id.as_object_id();
    Ok(playlist.into())
}

pub async fn get(db: &Database, playlist_id: ObjectId) -> Result<PlaylistPayload, ApiError> {
    let playlist = playlists(db)
        .find_one(doc! { "_id": playlist_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))?;
    Ok(playlist.into())
}

pub async fn list_for_user(
    db: &Database,
    owner: ObjectId,
) -> Result<Vec<PlaylistPayload>, ApiError> {
    let options = FindOptions::builder()
        .sort(doc! { "createdAt": -1 })
        .build();
    let cursor = playlists(db).find(doc! { "owner": owner }, options).await?;
    let found: Vec<Playlist> = cursor.try_collect().await?;
    Ok(found.into_iter().map(PlaylistPayload::from).collect())
}

/// Only the video's owner may place it in a playlist; that is how the
/// original behaves, quirky as it reads.
async fn authorize_video(
    db: &Database,
    video_id: ObjectId,
    actor: ObjectId,
) -> Result<(), ApiError> {
    let video = video_service::find_by_id(db, video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    if video.owner != actor {
        return Err(ApiError::forbidden(
            "Only the video owner may change its playlist membership",
        ));
    }
    Ok(())
}

pub async fn add_video(
    db: &Database,
    playlist_id: ObjectId,
    video_id: ObjectId,
    actor: ObjectId,
) -> Result<PlaylistPayload, ApiError> {
    authorize_video(db, video_id, actor).await?;

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let updated = playlists(db)
        .find_one_and_update(
            doc! { "_id": playlist_id },
            doc! {
                "$addToSet": { "videos": video_id },
                "$set": { "updatedAt": BsonDateTime::now() },
            },
            options,
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))?;
    Ok(updated.into())
}

pub async fn remove_video(
    db: &Database,
    playlist_id: ObjectId,
    video_id: ObjectId,
    actor: ObjectId,
) -> Result<PlaylistPayload, ApiError> {
    authorize_video(db, video_id, actor).await?;

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let updated = playlists(db)
        .find_one_and_update(
            doc! { "_id": playlist_id },
            doc! {
                "$pull": { "videos": video_id },
                "$set": { "updatedAt": BsonDateTime::now() },
            },
            options,
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))?;
    Ok(updated.into())
}

pub async fn delete(db: &Database, playlist_id: ObjectId, actor: ObjectId) -> Result<(), ApiError> {
    let playlist = playlists(db)
        .find_one(doc! { "_id": playlist_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))?;
    if playlist.owner != actor {
        return Err(ApiError::forbidden(
            "You are not allowed to delete this playlist",
        ));
    }

    playlists(db)
        .delete_one(doc! { "_id": playlist_id }, None)
        .await?;
    Ok(())
}
