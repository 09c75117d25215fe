//! In-memory backends
//!
//! Used for local development and tests. Drafts and uploads live in process
//! memory and are lost when the store is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use draftkit_core::models::{
    AssetProcessingStatus, DraftId, DraftPatch, SaveReceipt, UploadTarget, UploadTargetRequest,
    WizardDraft,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{AssetService, DraftStore, StoreError, StoreResult};

const MEMORY_UPLOAD_HOST: &str = "https://uploads.draftkit.local";
const MEMORY_CDN_HOST: &str = "https://cdn.draftkit.local";

struct StoredDraft {
    draft: WizardDraft,
    /// Highest sequence applied per session
    applied: HashMap<Uuid, u64>,
}

/// Process-local draft store
#[derive(Default)]
pub struct MemoryDraftStore {
    drafts: RwLock<HashMap<DraftId, StoredDraft>>,
    saves: AtomicU64,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a draft, e.g. to resume a wizard in tests
    pub async fn insert(&self, draft: WizardDraft) {
        let mut drafts = self.drafts.write().await;
        drafts.insert(
            draft.id.clone(),
            StoredDraft {
                draft,
                applied: HashMap::new(),
            },
        );
    }

    /// Number of patches applied so far
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn load(&self, id: &DraftId) -> StoreResult<WizardDraft> {
        let drafts = self.drafts.read().await;
        drafts
            .get(id)
            .map(|stored| stored.draft.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn save(&self, id: Option<&DraftId>, patch: &DraftPatch) -> StoreResult<SaveReceipt> {
        let mut drafts = self.drafts.write().await;

        let id = match id {
            Some(id) => id.clone(),
            None => {
                let id = DraftId::generate();
                drafts.insert(
                    id.clone(),
                    StoredDraft {
                        draft: WizardDraft::new(id.clone()),
                        applied: HashMap::new(),
                    },
                );
                tracing::debug!(draft_id = %id, "Created draft");
                id
            }
        };

        let stored = drafts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(&last) = stored.applied.get(&patch.session_id) {
            if !patch.supersedes(patch.session_id, last) {
                tracing::debug!(
                    draft_id = %id,
                    sequence = patch.sequence,
                    last_applied = last,
                    "Ignoring stale draft patch"
                );
                return Ok(SaveReceipt { id, success: true });
            }
        }

        stored.draft.apply_patch(patch, Utc::now());
        stored.applied.insert(patch.session_id, patch.sequence);
        self.saves.fetch_add(1, Ordering::SeqCst);

        Ok(SaveReceipt { id, success: true })
    }
}

struct MemoryUpload {
    total_size: u64,
    received: u64,
}

/// Process-local asset service
///
/// With `processing_delay` enabled, completed uploads report `Processing` until
/// [`MemoryAssetService::finish_processing`] is called.
#[derive(Default)]
pub struct MemoryAssetService {
    uploads: RwLock<HashMap<String, MemoryUpload>>,
    processing: RwLock<HashMap<String, AssetProcessingStatus>>,
    processing_delay: bool,
}

impl MemoryAssetService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processing_delay() -> Self {
        Self {
            processing_delay: true,
            ..Self::default()
        }
    }

    pub fn asset_url(asset_id: &str) -> String {
        format!("{}/f/{}", MEMORY_CDN_HOST, asset_id)
    }

    /// Mark a processing asset as ready
    pub async fn finish_processing(&self, asset_id: &str) {
        let mut processing = self.processing.write().await;
        processing.insert(
            asset_id.to_string(),
            AssetProcessingStatus::Ready {
                url: Self::asset_url(asset_id),
            },
        );
    }

    /// Delete an asset on the service side
    pub async fn delete(&self, asset_id: &str) {
        let mut processing = self.processing.write().await;
        processing.insert(asset_id.to_string(), AssetProcessingStatus::Gone);
    }
}

#[async_trait]
impl AssetService for MemoryAssetService {
    async fn request_target(&self, request: &UploadTargetRequest) -> StoreResult<UploadTarget> {
        let asset_id = Uuid::new_v4().to_string();
        let mut uploads = self.uploads.write().await;
        uploads.insert(
            asset_id.clone(),
            MemoryUpload {
                total_size: request.file_size,
                received: 0,
            },
        );

        Ok(UploadTarget {
            upload_url: format!("{}/{}", MEMORY_UPLOAD_HOST, asset_id),
            asset_id,
        })
    }

    async fn upload_chunk(
        &self,
        upload_url: &str,
        chunk: Bytes,
        offset: u64,
        total_size: u64,
    ) -> StoreResult<()> {
        let asset_id = upload_url
            .strip_prefix(MEMORY_UPLOAD_HOST)
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| StoreError::UploadFailed(format!("Unknown upload URL: {}", upload_url)))?;

        let mut uploads = self.uploads.write().await;
        let upload = uploads
            .get_mut(asset_id)
            .ok_or_else(|| StoreError::UploadFailed(format!("Unknown upload: {}", asset_id)))?;

        if upload.total_size != total_size || offset != upload.received {
            return Err(StoreError::UploadFailed(format!(
                "Unexpected chunk at offset {} (received {} of {})",
                offset, upload.received, upload.total_size
            )));
        }

        upload.received += chunk.len() as u64;
        Ok(())
    }

    async fn complete(&self, asset_id: &str) -> StoreResult<AssetProcessingStatus> {
        let uploads = self.uploads.read().await;
        let upload = uploads
            .get(asset_id)
            .ok_or_else(|| StoreError::UploadFailed(format!("Unknown upload: {}", asset_id)))?;

        if upload.received != upload.total_size {
            return Err(StoreError::UploadFailed(format!(
                "Upload incomplete: received {} of {} bytes",
                upload.received, upload.total_size
            )));
        }

        let status = if self.processing_delay {
            AssetProcessingStatus::Processing
        } else {
            AssetProcessingStatus::Ready {
                url: Self::asset_url(asset_id),
            }
        };

        let mut processing = self.processing.write().await;
        processing.insert(asset_id.to_string(), status.clone());
        Ok(status)
    }

    async fn status(&self, asset_id: &str) -> StoreResult<AssetProcessingStatus> {
        let processing = self.processing.read().await;
        Ok(processing
            .get(asset_id)
            .cloned()
            .unwrap_or(AssetProcessingStatus::Gone))
    }
}
