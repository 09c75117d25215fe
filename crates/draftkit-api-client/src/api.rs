//! Domain methods for the draft API client.
//!
//! Drafts live under `{prefix}/drafts`, uploads under `{prefix}/uploads` and
//! asset processing status under `{prefix}/assets/{id}/status`.

use anyhow::{Context, Result};
use bytes::Bytes;
use draftkit_core::models::{
    AssetProcessingStatus, DraftId, DraftPatch, SaveReceipt, UploadTarget, UploadTargetRequest,
    WizardDraft,
};
use validator::Validate;

use crate::{status_error, ApiClient};

impl ApiClient {
    /// Fetch a full draft. GET {prefix}/drafts/{id}
    pub async fn get_draft(&self, id: &DraftId) -> Result<WizardDraft> {
        let path = format!(
            "{}/drafts/{}",
            self.api_prefix(),
            urlencoding::encode(id.as_str())
        );
        self.get(&path).await
    }

    /// Create a draft from its first patch. POST {prefix}/drafts
    pub async fn create_draft(&self, patch: &DraftPatch) -> Result<SaveReceipt> {
        let path = format!("{}/drafts", self.api_prefix());
        self.post_json(&path, patch).await
    }

    /// Merge a patch into an existing draft. PATCH {prefix}/drafts/{id}
    pub async fn update_draft(&self, id: &DraftId, patch: &DraftPatch) -> Result<SaveReceipt> {
        let path = format!(
            "{}/drafts/{}",
            self.api_prefix(),
            urlencoding::encode(id.as_str())
        );
        self.patch_json(&path, patch).await
    }

    /// Ask the upload service where to send a file. POST {prefix}/uploads
    pub async fn request_upload_target(
        &self,
        request: &UploadTargetRequest,
    ) -> Result<UploadTarget> {
        request
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid upload request: {}", e))?;

        let path = format!("{}/uploads", self.api_prefix());
        self.post_json(&path, request).await
    }

    /// Send one chunk to an upload URL with a `Content-Range` header.
    ///
    /// Upload URLs are presigned, so no API credentials are attached.
    pub async fn upload_chunk(
        &self,
        upload_url: &str,
        chunk: Bytes,
        offset: u64,
        total_size: u64,
    ) -> Result<()> {
        let len = chunk.len() as u64;
        if len == 0 {
            return Err(anyhow::anyhow!("Refusing to send an empty chunk"));
        }
        let end = offset + len - 1;

        let response = self
            .client()
            .put(upload_url)
            .header(
                "Content-Range",
                format!("bytes {}-{}/{}", offset, end, total_size),
            )
            .header("Content-Type", "application/octet-stream")
            .body(chunk)
            .send()
            .await
            .context("Failed to send chunk")?;

        let status = response.status();
        // 308 Resume Incomplete is how resumable upload endpoints acknowledge a partial chunk
        if status.is_success() || status.as_u16() == 308 {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(crate::ApiStatusError {
            status: status.as_u16(),
            body,
        }
        .into())
    }

    /// Tell the service every chunk was sent. POST {prefix}/uploads/{asset_id}/complete
    pub async fn complete_upload(&self, asset_id: &str) -> Result<AssetProcessingStatus> {
        let path = format!(
            "{}/uploads/{}/complete",
            self.api_prefix(),
            urlencoding::encode(asset_id)
        );
        self.post_json(&path, &serde_json::json!({})).await
    }

    /// Current processing state. 410 Gone maps to `AssetProcessingStatus::Gone`.
    pub async fn asset_status(&self, asset_id: &str) -> Result<AssetProcessingStatus> {
        let path = format!(
            "{}/assets/{}/status",
            self.api_prefix(),
            urlencoding::encode(asset_id)
        );
        match self.get::<AssetProcessingStatus>(&path).await {
            Ok(status) => Ok(status),
            Err(err) if status_error(&err).map(|e| e.is_gone()).unwrap_or(false) => {
                Ok(AssetProcessingStatus::Gone)
            }
            Err(err) => Err(err),
        }
    }
}
