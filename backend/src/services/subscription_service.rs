use crate::error::ApiError;
use crate::models::{OwnerProfile, Subscription};
use crate::services::user_service;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, from_document, oid::ObjectId, Bson, Document};
use mongodb::{Collection, Database};

fn subscriptions(db: &Database) -> Collection<Subscription> {
    db.collection::<Subscription>("subscriptions")
}

pub fn subscription_filter(channel: ObjectId, subscriber: ObjectId) -> Document {
    doc! { "channel": channel, "subscriber": subscriber }
}

/// Toggle the (subscriber, channel) relationship, keyed off the channel id
/// with the requesting user as subscriber. A channel can never subscribe
/// to itself. Returns the resulting state.
pub async fn toggle(
    db: &Database,
    channel_id: ObjectId,
    subscriber: ObjectId,
) -> Result<bool, ApiError> {
    if channel_id == subscriber {
        return Err(ApiError::validation("You cannot subscribe to yourself"));
    }
    user_service::find_by_id(db, channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    let filter = subscription_filter(channel_id, subscriber);
    if let Some(existing) = subscriptions(db).find_one(filter, None).await? {
        subscriptions(db)
            .delete_one(doc! { "_id": existing.id }, None)
            .await?;
        return Ok(false);
    }

    subscriptions(db)
        .insert_one(
            &Subscription {
                id: None,
                subscriber,
                channel: channel_id,
                created_at: Utc::now(),
            },
            None,
        )
        .await?;
    Ok(true)
}

/// Subscriber listing for a channel: each subscription expanded into the
/// subscriber's public profile. Rows whose subscriber no longer exists
/// are dropped.
pub fn subscribers_pipeline(channel_id: ObjectId) -> Vec<Document> {
    vec![
        doc! { "$match": { "channel": channel_id } },
        doc! { "$lookup": {
            "from": "users",
            "localField": "subscriber",
            "foreignField": "_id",
            "as": "subscriber",
            "pipeline": [
                { "$project": { "userName": 1, "fullName": 1, "avatar": 1 } },
            ],
        } },
        doc! { "$addFields": { "subscriber": { "$first": "$subscriber" } } },
        doc! { "$match": { "subscriber": { "$ne": Bson::Null } } },
        doc! { "$replaceRoot": { "newRoot": "$subscriber" } },
    ]
}

pub async fn list_subscribers(
    db: &Database,
    channel_id: ObjectId,
) -> Result<Vec<OwnerProfile>, ApiError> {
    user_service::find_by_id(db, channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    let mut cursor = subscriptions(db)
        .aggregate(subscribers_pipeline(channel_id), None)
        .await?;

    let mut subscribers = Vec::new();
    while let Some(profile) = cursor.try_next().await? {
        subscribers.push(from_document::<OwnerProfile>(profile)?);
    }
    Ok(subscribers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_keys_on_channel_and_subscriber() {
        let channel = ObjectId::new();
        let subscriber = ObjectId::new();
        let filter = subscription_filter(channel, subscriber);
        assert_eq!(filter.get_object_id("channel").unwrap(), channel);
        assert_eq!(filter.get_object_id("subscriber").unwrap(), subscriber);
    }

    #[test]
    fn subscribers_join_projects_public_subset() {
        let pipeline = subscribers_pipeline(ObjectId::new());
        let lookup = pipeline[1].get_document("$lookup").unwrap();
        let projection = lookup.get_array("pipeline").unwrap()[0]
            .as_document()
            .unwrap()
            .get_document("$project")
            .unwrap();
        assert!(!projection.contains_key("password"));
        assert!(!projection.contains_key("refreshToken"));
        assert!(projection.contains_key("userName"));
    }

    #[test]
    fn dangling_subscriptions_are_filtered_out() {
        let pipeline = subscribers_pipeline(ObjectId::new());
        let guard = pipeline[3].get_document("$match").unwrap();
        let condition = guard.get_document("subscriber").unwrap();
        assert_eq!(condition.get("$ne"), Some(&Bson::Null));
    }
}
