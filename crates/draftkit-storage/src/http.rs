//! HTTP backends
//!
//! Thin adapters from the `draftkit-api-client` domain methods to the store
//! traits. Status codes are translated into `StoreError` variants here so the
//! engine never sees transport details.

use async_trait::async_trait;
use bytes::Bytes;
use draftkit_api_client::{status_error, ApiClient};
use draftkit_core::models::{
    AssetProcessingStatus, DraftId, DraftPatch, SaveReceipt, UploadTarget, UploadTargetRequest,
    WizardDraft,
};

use crate::{AssetService, DraftStore, StoreError, StoreResult};

/// Draft store backed by the remote draft API
#[derive(Clone)]
pub struct HttpDraftStore {
    client: ApiClient,
}

impl HttpDraftStore {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

fn map_draft_error(err: anyhow::Error, id: Option<&DraftId>) -> StoreError {
    match status_error(&err) {
        Some(status) if status.is_not_found() => StoreError::NotFound(
            id.map(|id| id.to_string())
                .unwrap_or_else(|| status.message()),
        ),
        Some(status) if status.status == 400 || status.status == 422 => StoreError::Rejected {
            message: status.message(),
            field_errors: status.field_errors(),
        },
        _ => StoreError::BackendError(format!("{:#}", err)),
    }
}

#[async_trait]
impl DraftStore for HttpDraftStore {
    #[tracing::instrument(skip(self), fields(draft_id = %id))]
    async fn load(&self, id: &DraftId) -> StoreResult<WizardDraft> {
        self.client
            .get_draft(id)
            .await
            .map_err(|e| map_draft_error(e, Some(id)))
    }

    #[tracing::instrument(skip(self, patch), fields(step = patch.step, sequence = patch.sequence))]
    async fn save(&self, id: Option<&DraftId>, patch: &DraftPatch) -> StoreResult<SaveReceipt> {
        let receipt = match id {
            Some(id) => self.client.update_draft(id, patch).await,
            None => self.client.create_draft(patch).await,
        }
        .map_err(|e| map_draft_error(e, id))?;

        if !receipt.success {
            return Err(StoreError::Rejected {
                message: "Draft store reported an unsuccessful save".to_string(),
                field_errors: Default::default(),
            });
        }

        Ok(receipt)
    }
}

/// Asset service backed by the remote upload API
#[derive(Clone)]
pub struct HttpAssetService {
    client: ApiClient,
}

impl HttpAssetService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

fn map_upload_error(err: anyhow::Error) -> StoreError {
    match status_error(&err) {
        Some(status) => StoreError::UploadFailed(status.message()),
        None => StoreError::UploadFailed(format!("{:#}", err)),
    }
}

#[async_trait]
impl AssetService for HttpAssetService {
    async fn request_target(&self, request: &UploadTargetRequest) -> StoreResult<UploadTarget> {
        self.client
            .request_upload_target(request)
            .await
            .map_err(map_upload_error)
    }

    async fn upload_chunk(
        &self,
        upload_url: &str,
        chunk: Bytes,
        offset: u64,
        total_size: u64,
    ) -> StoreResult<()> {
        self.client
            .upload_chunk(upload_url, chunk, offset, total_size)
            .await
            .map_err(map_upload_error)
    }

    async fn complete(&self, asset_id: &str) -> StoreResult<AssetProcessingStatus> {
        self.client
            .complete_upload(asset_id)
            .await
            .map_err(map_upload_error)
    }

    async fn status(&self, asset_id: &str) -> StoreResult<AssetProcessingStatus> {
        self.client
            .asset_status(asset_id)
            .await
            .map_err(|e| StoreError::BackendError(format!("{:#}", e)))
    }
}
