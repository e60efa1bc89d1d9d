use crate::error::ApiError;
use chrono::Utc;
use log::info;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Client for the cloud storage/transcoding provider. Uploads go through
/// the auto-detect endpoint; deletion needs the concrete resource type.
#[derive(Clone)]
pub struct MediaService {
    http: reqwest::Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

/// What the provider reports back for a stored asset. `duration` is only
/// present for video uploads.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaAsset {
    #[serde(rename = "secure_url")]
    pub url: String,
    pub public_id: String,
    pub duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl MediaService {
    pub fn new(base_url: &str, cloud_name: &str, api_key: &str, api_secret: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            cloud_name: cloud_name.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        }
    }

    /// Upload a locally staged file. Blocks until the provider answers;
    /// there is no retry.
    pub async fn upload(&self, local_path: &Path) -> Result<MediaAsset, ApiError> {
        let bytes = tokio::fs::read(local_path).await?;
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_request(&[("timestamp", &timestamp)], &self.api_secret);

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            )
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let url = format!("{}/v1_1/{}/auto/upload", self.base_url, self.cloud_name);
        let response = self.http.post(&url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::internal(format!(
                "media upload failed with status {}",
                response.status()
            )));
        }

        let asset = response.json::<MediaAsset>().await?;
        info!("Uploaded media asset {}", asset.public_id);
        Ok(asset)
    }

    /// Delete a remote asset. "not found" counts as success: the asset is
    /// already gone and callers may proceed.
    pub async fn destroy(&self, public_id: &str, resource_type: &str) -> Result<(), ApiError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_request(
            &[("public_id", public_id), ("timestamp", &timestamp)],
            &self.api_secret,
        );

        let url = format!(
            "{}/v1_1/{}/{}/destroy",
            self.base_url, self.cloud_name, resource_type
        );
        let response = self
            .http
            .post(&url)
            .form(&[
                ("public_id", public_id),
                ("api_key", &self.api_key),
                ("timestamp", &timestamp),
                ("signature_algorithm", "sha256"),
                ("signature", &signature),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::internal(format!(
                "media destroy failed with status {}",
                response.status()
            )));
        }

        let outcome = response.json::<DestroyResponse>().await?;
        if !destroy_succeeded(&outcome.result) {
            return Err(ApiError::internal(format!(
                "media destroy of {public_id} reported {:?}",
                outcome.result
            )));
        }
        info!("Destroyed media asset {public_id}");
        Ok(())
    }
}

/// Provider request signature: parameters sorted by name, joined as
/// `k=v` pairs with `&`, secret appended, SHA-256 hex digest.
fn sign_request(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<(&str, &str)> = params.to_vec();
    sorted.sort_by_key(|(name, _)| *name);
    let joined = sorted
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn destroy_succeeded(result: &str) -> bool {
    result == "ok" || result == "not found"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_single_parameter() {
        let sig = sign_request(&[("timestamp", "1700000000")], "secret123");
        assert_eq!(
            sig,
            "921c808a8fa40c9961b5507f6c27f374fb472aec1efe6a0a19e9e1ca45d76d61"
        );
    }

    #[test]
    fn signs_parameters_in_name_order() {
        // Same digest regardless of argument order.
        let expected = "9d6b02fa4fed8a40871883c59cc0d2ca5a6e8c3a21a45199260f8c004c6ca973";
        let a = sign_request(
            &[("public_id", "folder/asset"), ("timestamp", "1700000000")],
            "secret123",
        );
        let b = sign_request(
            &[("timestamp", "1700000000"), ("public_id", "folder/asset")],
            "secret123",
        );
        assert_eq!(a, expected);
        assert_eq!(b, expected);
    }

    #[test]
    fn destroy_result_classification() {
        assert!(destroy_succeeded("ok"));
        assert!(destroy_succeeded("not found"));
        assert!(!destroy_succeeded("error"));
        assert!(!destroy_succeeded(""));
    }
}
