use crate::error::ApiError;
use crate::models::{MediaRef, Video, VideoDetail, VideoListItem, VideoView};
use crate::services::media_service::MediaService;
use crate::services::pagination::{run_paged, Page, PageParams};
use chrono::Utc;
use futures::TryStreamExt;
use log::info;
use mongodb::bson::{doc, from_document, oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Collection, Database};
use std::path::PathBuf;

pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// Fields the listing may sort on; anything else falls back to creation
/// time so arbitrary input never reaches the sort stage.
const SORTABLE_FIELDS: &[&str] = &["createdAt", "views", "duration", "title"];

fn videos(db: &Database) -> Collection<Video> {
    db.collection::<Video>("videos")
}

pub async fn find_by_id(db: &Database, id: ObjectId) -> Result<Option<Video>, ApiError> {
    Ok(videos(db).find_one(doc! { "_id": id }, None).await?)
}

pub fn sort_field(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|field| SORTABLE_FIELDS.iter().find(|known| **known == field))
        .copied()
        .unwrap_or("createdAt")
}

/// Listing pipeline: free-text match over title/description, optional
/// owner narrowing (published only), owner join restricted to the public
/// subset, then the caller's sort. Default order is newest first.
pub fn list_pipeline(
    query: &str,
    owner: Option<ObjectId>,
    sort_by: Option<&str>,
    ascending: bool,
) -> Vec<Document> {
    let mut matcher = doc! {
        "$or": [
            { "title": { "$regex": query, "$options": "i" } },
            { "description": { "$regex": query, "$options": "i" } },
        ]
    };
    if let Some(owner) = owner {
        matcher.insert("owner", owner);
        matcher.insert("isPublished", true);
    }

    let mut sort = Document::new();
    sort.insert(sort_field(sort_by), if ascending { 1 } else { -1 });

    vec![
        doc! { "$match": matcher },
        doc! { "$lookup": {
            "from": "users",
            "localField": "owner",
            "foreignField": "_id",
            "as": "owner",
            "pipeline": [
                { "$project": { "userName": 1, "avatar": 1 } },
            ],
        } },
        doc! { "$addFields": { "owner": { "$first": "$owner" } } },
        doc! { "$sort": sort },
    ]
}

pub async fn list_videos(
    db: &Database,
    query: &str,
    owner: Option<ObjectId>,
    sort_by: Option<&str>,
    ascending: bool,
    params: &PageParams,
) -> Result<Page<VideoListItem>, ApiError> {
    let collection = db.collection::<Document>("videos");
    run_paged(
        &collection,
        list_pipeline(query, owner, sort_by, ascending),
        params,
    )
    .await
}

/// Detail pipeline: owner public profile, like count from the cardinality
/// of the joined likes set, `isLiked` from viewer membership.
pub fn detail_pipeline(video_id: ObjectId, viewer: Option<ObjectId>) -> Vec<Document> {
    let is_liked: Bson = match viewer {
        Some(viewer) => Bson::from(doc! { "$in": [viewer, "$likes.likedBy"] }),
        None => Bson::Boolean(false),
    };

    vec![
        doc! { "$match": { "_id": video_id } },
        doc! { "$lookup": {
            "from": "likes",
            "localField": "_id",
            "foreignField": "video",
            "as": "likes",
        } },
        doc! { "$lookup": {
            "from": "users",
            "localField": "owner",
            "foreignField": "_id",
            "as": "owner",
            "pipeline": [
                { "$project": { "userName": 1, "fullName": 1, "avatar": 1 } },
            ],
        } },
        doc! { "$addFields": {
            "owner": { "$first": "$owner" },
            "likesCount": { "$size": "$likes" },
            "isLiked": is_liked,
        } },
        doc! { "$project": { "likes": 0 } },
    ]
}

/// Fetch a video for display: bumps the view counter, records the video in
/// the viewer's watch history, then reads the denormalized view.
pub async fn get_video(
    db: &Database,
    video_id: ObjectId,
    viewer: Option<ObjectId>,
) -> Result<VideoDetail, ApiError> {
    let seen = videos(db)
        .find_one_and_update(
            doc! { "_id": video_id },
            doc! { "$inc": { "views": 1_i64 } },
            None,
        )
        .await?;
    if seen.is_none() {
        return Err(ApiError::not_found("Video not found"));
    }

    if let Some(viewer) = viewer {
        db.collection::<Document>("users")
            .update_one(
                doc! { "_id": viewer },
                doc! { "$addToSet": { "watchHistory": video_id } },
                None,
            )
            .await?;
    }

    let mut cursor = videos(db)
        .aggregate(detail_pipeline(video_id, viewer), None)
        .await?;
    let detail = cursor
        .try_next()
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    Ok(from_document(detail)?)
}

pub async fn publish_video(
    db: &Database,
    media: &MediaService,
    owner: ObjectId,
    title: &str,
    description: &str,
    video_path: &PathBuf,
    thumbnail_path: &PathBuf,
) -> Result<VideoView, ApiError> {
    if title.trim().is_empty() || description.trim().is_empty() {
        return Err(ApiError::validation("Title and description are required"));
    }

    let video_asset = media.upload(video_path).await?;
    let thumbnail_asset = media.upload(thumbnail_path).await?;

    let now = Utc::now();
    let mut video = Video {
        id: None,
        video_file: MediaRef {
            url: video_asset.url,
            public_id: video_asset.public_id,
        },
        thumbnail: MediaRef {
            url: thumbnail_asset.url,
            public_id: thumbnail_asset.public_id,
        },
        title: title.trim().to_string(),
        description: description.trim().to_string(),
        duration: video_asset.duration.unwrap_or(0.0),
        views: 0,
        is_published: true,
        owner,
        created_at: now,
        updated_at: now,
    };

    let inserted = videos(db).insert_one(&video, None).await?;
    video.id = inserted.inserted_id.as_object_id();
    info!("Published video {:?}", video.id);
    Ok(video.into())
}

pub async fn update_video(
    db: &Database,
    video_id: ObjectId,
    actor: ObjectId,
    title: Option<&str>,
    description: Option<&str>,
) -> Result<VideoView, ApiError> {
    let video = find_by_id(db, video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    if video.owner != actor {
        return Err(ApiError::forbidden(
            "You are not allowed to update this video",
        ));
    }

    let mut changes = Document::new();
    if let Some(title) = title {
        if title.trim().is_empty() {
            return Err(ApiError::validation("title must not be empty"));
        }
        changes.insert("title", title.trim());
    }
    if let Some(description) = description {
        if description.trim().is_empty() {
            return Err(ApiError::validation("description must not be empty"));
        }
        changes.insert("description", description.trim());
    }
    if changes.is_empty() {
        return Err(ApiError::validation("Nothing to update"));
    }
    changes.insert("updatedAt", BsonDateTime::now());

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let updated = videos(db)
        .find_one_and_update(doc! { "_id": video_id }, doc! { "$set": changes }, options)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    Ok(updated.into())
}

/// Remote assets go first; the record is only removed once both destroys
/// succeeded, so a failed destroy can never leave a record pointing at
/// deleted media.
pub async fn delete_video(
    db: &Database,
    media: &MediaService,
    video_id: ObjectId,
    actor: ObjectId,
) -> Result<(), ApiError> {
    let video = find_by_id(db, video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    if video.owner != actor {
        return Err(ApiError::forbidden(
            "You are not allowed to delete this video",
        ));
    }

    media.destroy(&video.video_file.public_id, "video").await?;
    media.destroy(&video.thumbnail.public_id, "image").await?;

    let result = videos(db).delete_one(doc! { "_id": video_id }, None).await?;
    if result.deleted_count == 0 {
        return Err(ApiError::not_found("Video not found"));
    }
    info!("Deleted video {video_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_field_allows_known_fields_only() {
        assert_eq!(sort_field(Some("views")), "views");
        assert_eq!(sort_field(Some("title")), "title");
        assert_eq!(sort_field(Some("$where")), "createdAt");
        assert_eq!(sort_field(Some("password")), "createdAt");
        assert_eq!(sort_field(None), "createdAt");
    }

    #[test]
    fn list_defaults_to_newest_first() {
        let pipeline = list_pipeline("", None, None, false);
        let sort = pipeline.last().unwrap().get_document("$sort").unwrap();
        assert_eq!(sort.get_i32("createdAt").unwrap(), -1);
    }

    #[test]
    fn list_owner_filter_restricts_to_published() {
        let owner = ObjectId::new();
        let pipeline = list_pipeline("cats", Some(owner), None, false);
        let matcher = pipeline[0].get_document("$match").unwrap();
        assert_eq!(matcher.get_object_id("owner").unwrap(), owner);
        assert_eq!(matcher.get_bool("isPublished").unwrap(), true);
    }

    #[test]
    fn list_without_owner_has_no_publish_filter() {
        let pipeline = list_pipeline("cats", None, None, false);
        let matcher = pipeline[0].get_document("$match").unwrap();
        assert!(!matcher.contains_key("owner"));
        assert!(!matcher.contains_key("isPublished"));
    }

    #[test]
    fn list_owner_join_projects_public_subset() {
        let pipeline = list_pipeline("", None, None, false);
        let lookup = pipeline[1].get_document("$lookup").unwrap();
        let projection = lookup.get_array("pipeline").unwrap()[0]
            .as_document()
            .unwrap()
            .get_document("$project")
            .unwrap();
        assert!(projection.contains_key("userName"));
        assert!(!projection.contains_key("password"));
        assert!(!projection.contains_key("refreshToken"));
        assert!(!projection.contains_key("email"));
    }

    #[test]
    fn detail_counts_likes_and_tests_membership() {
        let viewer = ObjectId::new();
        let pipeline = detail_pipeline(ObjectId::new(), Some(viewer));
        let fields = pipeline[3].get_document("$addFields").unwrap();
        let likes_count = fields.get_document("likesCount").unwrap();
        assert_eq!(likes_count.get_str("$size").unwrap(), "$likes");
        let is_liked = fields.get_document("isLiked").unwrap();
        let membership = is_liked.get_array("$in").unwrap();
        assert_eq!(membership[0].as_object_id().unwrap(), viewer);

        // The raw likes array is dropped before the view is returned.
        let last = pipeline.last().unwrap().get_document("$project").unwrap();
        assert_eq!(last.get_i32("likes").unwrap(), 0);
    }

    #[test]
    fn detail_without_viewer_is_never_liked() {
        let pipeline = detail_pipeline(ObjectId::new(), None);
        let fields = pipeline[3].get_document("$addFields").unwrap();
        assert_eq!(fields.get_bool("isLiked").unwrap(), false);
    }
}
