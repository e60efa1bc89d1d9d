pub mod comment;
pub mod like;
pub mod playlist;
pub mod subscription;
pub mod user;
pub mod video;

use crate::error::ApiError;
use log::warn;
use mongodb::bson::oid::ObjectId;
use rocket::catch;
use rocket::fs::TempFile;
use std::path::{Path, PathBuf};

pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::validation(format!("Invalid {what} id")))
}

/// Copy a multipart temp file into the staging directory so it survives
/// until the upstream upload finishes. Callers discard it afterwards.
pub async fn stage_upload(file: &mut TempFile<'_>, dir: &Path) -> Result<PathBuf, ApiError> {
    let extension = file
        .content_type()
        .and_then(|content_type| content_type.extension())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    let name = file.name().unwrap_or("upload");
    let path = dir.join(format!("{}-{name}{extension}", ObjectId::new().to_hex()));
    file.copy_to(&path).await?;
    Ok(path)
}

pub async fn discard_staged(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to remove staged upload {}: {e}", path.display());
    }
}

#[catch(400)]
pub fn bad_request() -> ApiError {
    ApiError::validation("Bad request")
}

#[catch(401)]
pub fn unauthorized() -> ApiError {
    ApiError::unauthorized("Authentication required")
}

#[catch(403)]
pub fn forbidden() -> ApiError {
    ApiError::forbidden("Access denied")
}

#[catch(404)]
pub fn not_found() -> ApiError {
    ApiError::not_found("Resource not found")
}

#[catch(422)]
pub fn unprocessable() -> ApiError {
    ApiError::validation("Invalid or malformed request body")
}

#[catch(500)]
pub fn internal_error() -> ApiError {
    ApiError::internal("internal server error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_object_id_accepts_hex() {
        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex(), "video").unwrap(), id);
    }

    #[test]
    fn parse_object_id_rejects_garbage() {
        let err = parse_object_id("not-an-id", "video").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(err.to_string(), "Invalid video id");
    }
}
