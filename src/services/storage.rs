//! Supabase Storage client.
//!
//! Talks to the Storage REST API with the service-role key: object upload,
//! signed-URL creation for private access, and object download for the
//! background OCR runner.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::error::ApiError;

#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

/// Error body from the Storage API.
#[derive(Debug, Deserialize)]
struct StorageErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl StorageErrorResponse {
    fn message(self) -> Option<String> {
        self.message.or(self.error)
    }
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl StorageClient {
    pub fn new(client: Client, supabase_url: &str, service_key: &str, bucket: &str) -> Self {
        Self {
            client,
            base_url: format!("{}/storage/v1", supabase_url.trim_end_matches('/')),
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
        }
    }

    /// Upload object bytes. Never overwrites an existing object.
    pub async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ApiError> {
        let url = format!("{}/object/{}/{}", self.base_url, self.bucket, path);
        debug!(path = path, size = bytes.len(), "Uploading object to storage");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .header("Cache-Control", "max-age=3600")
            .body(bytes)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Storage upload request failed");
                ApiError::upstream(format!("Storage unavailable: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<StorageErrorResponse>()
                .await
                .ok()
                .and_then(StorageErrorResponse::message)
                .unwrap_or_else(|| "Failed to upload file to storage".to_string());
            error!(status = %status, message = %message, "Storage upload rejected");
            return Err(ApiError::upstream(message));
        }

        Ok(())
    }

    /// Create a time-limited signed URL for private object access.
    pub async fn create_signed_url(
        &self,
        path: &str,
        expires_in_seconds: u64,
    ) -> Result<String, ApiError> {
        let url = format!("{}/object/sign/{}/{}", self.base_url, self.bucket, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&json!({ "expiresIn": expires_in_seconds }))
            .send()
            .await
            .map_err(|e| ApiError::upstream(format!("Storage unavailable: {}", e)))?;

        if !response.status().is_success() {
            let message = response
                .json::<StorageErrorResponse>()
                .await
                .ok()
                .and_then(StorageErrorResponse::message)
                .unwrap_or_else(|| "Failed to create file access URL".to_string());
            return Err(ApiError::upstream(message));
        }

        let signed: SignedUrlResponse = response
            .json()
            .await
            .map_err(|e| ApiError::upstream(format!("Invalid storage response: {}", e)))?;

        // The API returns a path relative to /storage/v1
        Ok(format!(
            "{}{}",
            self.base_url,
            if signed.signed_url.starts_with('/') {
                signed.signed_url
            } else {
                format!("/{}", signed.signed_url)
            }
        ))
    }

    /// Download a stored object (used by the OCR job runner).
    pub async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/object/{}/{}", self.base_url, self.bucket, path);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await
            .context("Storage download request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download file ({})", response.status());
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read downloaded object")?;

        Ok(bytes.to_vec())
    }
}
