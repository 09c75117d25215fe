//! Collaborator traits
//!
//! `DraftStore` persists partial drafts; `AssetService` receives uploaded files
//! and reports their processing state.

use async_trait::async_trait;
use bytes::Bytes;
use draftkit_core::models::{
    AssetProcessingStatus, DraftId, DraftPatch, SaveReceipt, UploadTarget, UploadTargetRequest,
    WizardDraft,
};
use draftkit_core::{FieldErrors, WizardError};
use thiserror::Error;

/// Store operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Draft not found: {0}")]
    NotFound(String),

    /// The store refused the data, optionally naming the offending fields
    #[error("Save rejected: {message}")]
    Rejected {
        message: String,
        field_errors: FieldErrors,
    },

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Store backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for WizardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => WizardError::NotFound(id),
            StoreError::Rejected {
                message,
                field_errors,
            } => WizardError::SaveFailure {
                message,
                field_errors,
            },
            StoreError::UploadFailed(msg) => WizardError::UploadFailure(msg),
            StoreError::BackendError(msg) => WizardError::save_failure(msg),
            StoreError::ConfigError(msg) => WizardError::Configuration(msg),
        }
    }
}

/// Remote draft persistence
///
/// Consumed by the autosave scheduler and the step navigator. A session calls
/// `save(None, ..)` exactly once, for its first save, and reuses the returned
/// id for every later call.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Load a full draft, or `StoreError::NotFound`
    async fn load(&self, id: &DraftId) -> StoreResult<WizardDraft>;

    /// Merge `patch` into the draft `id`, creating a new draft when `id` is `None`
    async fn save(&self, id: Option<&DraftId>, patch: &DraftPatch) -> StoreResult<SaveReceipt>;
}

/// External asset-processing service
#[async_trait]
pub trait AssetService: Send + Sync {
    /// Reserve an upload URL for one file
    async fn request_target(&self, request: &UploadTargetRequest) -> StoreResult<UploadTarget>;

    /// Send `chunk` starting at byte `offset` of a file of `total_size` bytes
    async fn upload_chunk(
        &self,
        upload_url: &str,
        chunk: Bytes,
        offset: u64,
        total_size: u64,
    ) -> StoreResult<()>;

    /// Signal that every chunk was sent
    ///
    /// `Processing` means the file was accepted but is not usable yet; that is a
    /// valid terminal state for the upload itself.
    async fn complete(&self, asset_id: &str) -> StoreResult<AssetProcessingStatus>;

    /// Poll the processing state of an asset
    async fn status(&self, asset_id: &str) -> StoreResult<AssetProcessingStatus>;
}
