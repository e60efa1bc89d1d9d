use crate::error::ApiError;
use crate::models::Like;
use crate::services::{comment_service, video_service};
use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::{Collection, Database};

fn likes(db: &Database) -> Collection<Like> {
    db.collection::<Like>("likes")
}

pub fn video_like_filter(video_id: ObjectId, liker: ObjectId) -> Document {
    doc! { "video": video_id, "likedBy": liker }
}

pub fn comment_like_filter(comment_id: ObjectId, liker: ObjectId) -> Document {
    doc! { "comment": comment_id, "likedBy": liker }
}

/// Existence-check-then-flip. Returns the resulting state: true when the
/// like now exists. Concurrent double-toggles race on the existence check
/// (last write wins); no stronger guarantee is made.
pub async fn toggle_video_like(
    db: &Database,
    video_id: ObjectId,
    liker: ObjectId,
) -> Result<bool, ApiError> {
    video_service::find_by_id(db, video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    let filter = video_like_filter(video_id, liker);
    if let Some(existing) = likes(db).find_one(filter, None).await? {
        likes(db)
            .delete_one(doc! { "_id": existing.id }, None)
            .await?;
        return Ok(false);
    }

    likes(db)
        .insert_one(
            &Like {
                id: None,
                video: Some(video_id),
                comment: None,
                liked_by: liker,
                created_at: Utc::now(),
            },
            None,
        )
        .await?;
    Ok(true)
}

/// Same flip for comments; a created comment-like also records the
/// comment's parent video.
pub async fn toggle_comment_like(
    db: &Database,
    comment_id: ObjectId,
    liker: ObjectId,
) -> Result<bool, ApiError> {
    let comment = comment_service::find_by_id(db, comment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    let filter = comment_like_filter(comment_id, liker);
    if let Some(existing) = likes(db).find_one(filter, None).await? {
        likes(db)
            .delete_one(doc! { "_id": existing.id }, None)
            .await?;
        return Ok(false);
    }

    likes(db)
        .insert_one(
            &Like {
                id: None,
                video: Some(comment.video),
                comment: Some(comment_id),
                liked_by: liker,
                created_at: Utc::now(),
            },
            None,
        )
        .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_key_on_actor_and_target() {
        let video = ObjectId::new();
        let comment = ObjectId::new();
        let liker = ObjectId::new();

        let filter = video_like_filter(video, liker);
        assert_eq!(filter.get_object_id("video").unwrap(), video);
        assert_eq!(filter.get_object_id("likedBy").unwrap(), liker);
        assert!(!filter.contains_key("comment"));

        let filter = comment_like_filter(comment, liker);
        assert_eq!(filter.get_object_id("comment").unwrap(), comment);
        assert_eq!(filter.get_object_id("likedBy").unwrap(), liker);
        assert!(!filter.contains_key("video"));
    }

    #[test]
    fn repeated_toggles_use_the_identical_filter() {
        // The double-toggle property rests on both calls resolving the same
        // relationship row: same inputs must build the same filter.
        let video = ObjectId::new();
        let liker = ObjectId::new();
        assert_eq!(
            video_like_filter(video, liker),
            video_like_filter(video, liker)
        );
    }
}
