use crate::error::ApiError;
use crate::models::{Comment, CommentPayload, CommentView};
use crate::services::pagination::{run_paged, Page, PageParams};
use crate::services::video_service;
use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Collection, Database};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

fn comments(db: &Database) -> Collection<Comment> {
    db.collection::<Comment>("comments")
}

pub async fn find_by_id(db: &Database, id: ObjectId) -> Result<Option<Comment>, ApiError> {
    Ok(comments(db).find_one(doc! { "_id": id }, None).await?)
}

/// Comment listing for one video, newest first, with the owner's public
/// profile joined in.
pub fn comments_pipeline(video_id: ObjectId) -> Vec<Document> {
    vec![
        doc! { "$match": { "video": video_id } },
        doc! { "$lookup": {
            "from": "users",
            "localField": "owner",
            "foreignField": "_id",
            "as": "owner",
            "pipeline": [
                { "$project": { "userName": 1, "fullName": 1, "avatar": 1 } },
            ],
        } },
        doc! { "$addFields": { "owner": { "$first": "$owner" } } },
        doc! { "$project": { "content": 1, "video": 1, "owner": 1, "createdAt": 1 } },
        doc! { "$sort": { "createdAt": -1 } },
    ]
}

pub async fn list_for_video(
    db: &Database,
    video_id: ObjectId,
    params: &PageParams,
) -> Result<Page<CommentView>, ApiError> {
    video_service::find_by_id(db, video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    let collection = db.collection::<Document>("comments");
    run_paged(&collection, comments_pipeline(video_id), params).await
}

pub async fn add(
    db: &Database,
    video_id: ObjectId,
    owner: ObjectId,
    content: &str,
) -> Result<CommentPayload, ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::validation("Content is required"));
    }
    video_service::find_by_id(db, video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    let now = Utc::now();
    let mut comment = Comment {
        id: None,
        content: content.trim().to_string(),
        video: video_id,
        owner,
        created_at: now,
        updated_at: now,
    };
    let inserted = comments(db).insert_one(&comment, None).await?;
    comment.id = inserted.inserted_id.as_object_id();
    Ok(comment.into())
}

pub async fn update(
    db: &Database,
    comment_id: ObjectId,
    actor: ObjectId,
    content: &str,
) -> Result<CommentPayload, ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::validation("Content is required"));
    }

    let comment = find_by_id(db, comment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    if comment.owner != actor {
        return Err(ApiError::forbidden(
            "You are not allowed to update this comment",
        ));
    }

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let updated = comments(db)
        .find_one_and_update(
            doc! { "_id": comment_id },
            doc! { "$set": { "content": content.trim(), "updatedAt": BsonDateTime::now() } },
            options,
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    Ok(updated.into())
}

pub async fn delete(db: &Database, comment_id: ObjectId, actor: ObjectId) -> Result<(), ApiError> {
    let comment = find_by_id(db, comment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    if comment.owner != actor {
        return Err(ApiError::forbidden(
            "You are not allowed to delete this comment",
        ));
    }

    comments(db)
        .delete_one(doc! { "_id": comment_id }, None)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_matches_the_video_and_sorts_newest_first() {
        let video_id = ObjectId::new();
        let pipeline = comments_pipeline(video_id);
        let matcher = pipeline[0].get_document("$match").unwrap();
        assert_eq!(matcher.get_object_id("video").unwrap(), video_id);

        let sort = pipeline.last().unwrap().get_document("$sort").unwrap();
        assert_eq!(sort.get_i32("createdAt").unwrap(), -1);
    }

    #[test]
    fn listing_owner_join_projects_public_subset() {
        let pipeline = comments_pipeline(ObjectId::new());
        let lookup = pipeline[1].get_document("$lookup").unwrap();
        let projection = lookup.get_array("pipeline").unwrap()[0]
            .as_document()
            .unwrap()
            .get_document("$project")
            .unwrap();
        assert!(!projection.contains_key("password"));
        assert!(!projection.contains_key("refreshToken"));
        assert!(projection.contains_key("fullName"));
    }
}
