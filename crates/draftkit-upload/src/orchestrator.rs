//! Upload orchestration
//!
//! Each accepted file gets its own task, cancellation token, and progress
//! channel. Tasks share nothing but a semaphore bounding concurrent transfers,
//! so one file failing or being cancelled never disturbs the others.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use draftkit_core::models::{
    AssetProcessingStatus, AssetStatus, DraftAsset, UploadTargetRequest,
};
use draftkit_core::{UploadConfig, UploadRejection};
use draftkit_storage::AssetService;
use tokio::sync::{broadcast, watch, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::deleted::DeletedAssetCache;
use crate::file::UploadFile;
use crate::sink::AssetSink;
use crate::types::{UploadEvent, UploadHandle, UploadId, UploadSnapshot, UploadState};
use crate::validator::UploadValidator;

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct UploadEntry {
    file_name: String,
    token: CancellationToken,
    progress_tx: watch::Sender<u8>,
    state_tx: watch::Sender<UploadState>,
}

impl UploadEntry {
    fn is_active(&self) -> bool {
        !self.state_tx.borrow().is_terminal()
    }
}

struct Inner {
    service: Arc<dyn AssetService>,
    sink: Arc<dyn AssetSink>,
    validator: UploadValidator,
    config: UploadConfig,
    entries: Mutex<HashMap<UploadId, UploadEntry>>,
    deleted: DeletedAssetCache,
    events: broadcast::Sender<UploadEvent>,
    permits: Arc<Semaphore>,
    root: CancellationToken,
}

/// Result of one processing poll
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub ready: usize,
    pub removed: usize,
    pub pending: usize,
}

/// Concurrent uploads for one wizard session
#[derive(Clone)]
pub struct UploadOrchestrator {
    inner: Arc<Inner>,
}

impl UploadOrchestrator {
    pub fn new(
        config: &UploadConfig,
        service: Arc<dyn AssetService>,
        sink: Arc<dyn AssetSink>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                service,
                sink,
                validator: UploadValidator::new(config),
                config: config.clone(),
                entries: Mutex::new(HashMap::new()),
                deleted: DeletedAssetCache::new(),
                events,
                permits: Arc::new(Semaphore::new(config.max_concurrent_uploads.max(1))),
                root: CancellationToken::new(),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.inner.events.subscribe()
    }

    /// Validate `file` and start uploading it.
    ///
    /// Rejections are returned synchronously and never touch the network.
    /// Must be called from within a Tokio runtime.
    pub fn enqueue(&self, file: UploadFile) -> Result<UploadHandle, UploadRejection> {
        let inner = &self.inner;
        inner.validator.validate_file(&file)?;

        let mut entries = inner.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let in_flight = entries.values().filter(|e| e.is_active()).count();
        inner
            .validator
            .validate_count(inner.sink.asset_count() + in_flight)?;

        let id = Uuid::new_v4();
        let step = inner.sink.current_step();
        let token = inner.root.child_token();
        let (progress_tx, progress_rx) = watch::channel(0u8);
        let (state_tx, state_rx) = watch::channel(UploadState::Queued);
        let file_name = file.file_name().to_string();

        entries.insert(
            id,
            UploadEntry {
                file_name: file_name.clone(),
                token: token.clone(),
                progress_tx,
                state_tx,
            },
        );
        drop(entries);

        tracing::info!(
            upload_id = %id,
            file_name = %file_name,
            file_size = file.size(),
            step,
            "Upload enqueued"
        );

        tokio::spawn(run_upload(self.inner.clone(), id, step, file, token));

        Ok(UploadHandle {
            id,
            file_name,
            progress: progress_rx,
            state: state_rx,
        })
    }

    /// Enqueue several files; each is accepted or rejected on its own.
    pub fn enqueue_all(
        &self,
        files: impl IntoIterator<Item = UploadFile>,
    ) -> Vec<Result<UploadHandle, UploadRejection>> {
        files.into_iter().map(|file| self.enqueue(file)).collect()
    }

    /// Abort one in-flight upload. Returns false if it already finished.
    pub fn cancel(&self, id: UploadId) -> bool {
        let entries = self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&id) {
            Some(entry) if entry.is_active() => {
                entry.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Abort every in-flight upload. New uploads may still be enqueued.
    pub fn abort_all(&self) {
        let entries = self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for entry in entries.values().filter(|e| e.is_active()) {
            entry.token.cancel();
        }
    }

    /// Abort everything and refuse further transfers
    pub fn shutdown(&self) {
        tracing::debug!("Upload orchestrator shutting down");
        self.inner.root.cancel();
        self.inner.permits.close();
    }

    pub fn uploads(&self) -> Vec<UploadSnapshot> {
        let entries = self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .map(|(id, entry)| UploadSnapshot {
                id: *id,
                file_name: entry.file_name.clone(),
                progress: *entry.progress_tx.borrow(),
                state: entry.state_tx.borrow().clone(),
            })
            .collect()
    }

    /// Forget uploads that reached a terminal state
    pub fn clear_finished(&self) {
        let mut entries = self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| entry.is_active());
    }

    pub fn deleted_assets(&self) -> &DeletedAssetCache {
        &self.inner.deleted
    }

    /// Detach a completed asset from the step and remember it as deleted.
    ///
    /// Unknown ids are left out of the deleted cache.
    pub fn remove_asset(&self, asset_id: &str) -> bool {
        if !self.inner.sink.remove_asset(asset_id) {
            tracing::debug!(asset_id = %asset_id, "No such asset to remove");
            return false;
        }
        self.inner.deleted.insert(asset_id);
        tracing::info!(asset_id = %asset_id, "Asset removed");
        self.inner.emit(UploadEvent::AssetRemoved {
            asset_id: asset_id.to_string(),
        });
        true
    }

    /// Poll the service for every asset still processing.
    ///
    /// Ready assets get their URL; gone assets are detached and cached so
    /// they are not polled again.
    pub async fn refresh_processing(&self) -> RefreshSummary {
        let inner = &self.inner;
        let mut summary = RefreshSummary::default();

        for asset in inner.sink.processing_assets() {
            if inner.deleted.contains(&asset.id) {
                inner.sink.remove_asset(&asset.id);
                summary.removed += 1;
                continue;
            }

            match inner.service.status(&asset.id).await {
                Ok(AssetProcessingStatus::Ready { url }) => {
                    if inner.sink.mark_asset_ready(&asset.id, &url) {
                        summary.ready += 1;
                        inner.emit(UploadEvent::AssetReady {
                            asset_id: asset.id.clone(),
                            url,
                        });
                    }
                }
                Ok(AssetProcessingStatus::Processing) => summary.pending += 1,
                Ok(AssetProcessingStatus::Gone) => {
                    tracing::info!(asset_id = %asset.id, "Asset deleted on the service side");
                    inner.deleted.insert(&asset.id);
                    if inner.sink.remove_asset(&asset.id) {
                        inner.emit(UploadEvent::AssetRemoved {
                            asset_id: asset.id.clone(),
                        });
                    }
                    summary.removed += 1;
                }
                Err(e) => {
                    tracing::warn!(asset_id = %asset.id, error = %e, "Failed to poll asset status");
                    summary.pending += 1;
                }
            }
        }

        summary
    }
}

async fn run_upload(
    inner: Arc<Inner>,
    id: UploadId,
    step: u32,
    file: UploadFile,
    token: CancellationToken,
) {
    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        result = inner.transfer(id, &file) => Some(result),
    };

    match outcome {
        None => {
            tracing::info!(upload_id = %id, "Upload cancelled");
            inner.set_state(id, UploadState::Cancelled);
            inner.emit(UploadEvent::Cancelled { upload_id: id });
        }
        Some(Ok(asset)) => {
            let state = match asset.status {
                AssetStatus::Processing => UploadState::Processing {
                    asset_id: asset.id.clone(),
                },
                AssetStatus::Ready => UploadState::Ready {
                    asset_id: asset.id.clone(),
                },
            };
            inner.sink.append_asset(step, asset.clone());
            tracing::info!(upload_id = %id, asset_id = %asset.id, step, "Upload completed");
            inner.set_state(id, state);
            inner.emit(UploadEvent::Completed {
                upload_id: id,
                asset,
            });
        }
        Some(Err(reason)) => {
            tracing::warn!(upload_id = %id, file_name = %file.file_name(), reason = %reason, "Upload failed");
            inner.set_state(id, UploadState::Failed {
                reason: reason.clone(),
            });
            inner.emit(UploadEvent::Failed {
                upload_id: id,
                file_name: file.file_name().to_string(),
                reason,
            });
        }
    }
}

impl Inner {
    fn emit(&self, event: UploadEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn set_state(&self, id: UploadId, state: UploadState) {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(&id) {
            entry.state_tx.send_replace(state);
        }
    }

    fn report_progress(&self, id: UploadId, percent: u8) {
        let changed = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            match entries.get(&id) {
                Some(entry) => {
                    let previous = entry.progress_tx.send_replace(percent);
                    entry
                        .state_tx
                        .send_replace(UploadState::Uploading { progress: percent });
                    previous != percent
                }
                None => false,
            }
        };
        if changed {
            self.emit(UploadEvent::Progress {
                upload_id: id,
                percent,
            });
        }
    }

    /// Request target, send chunks, finalize.
    async fn transfer(&self, id: UploadId, file: &UploadFile) -> Result<DraftAsset, String> {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| "Upload queue is closed".to_string())?;

        self.report_progress(id, 0);

        let request = UploadTargetRequest {
            file_name: file.sanitized_name(),
            content_type: file.content_type().into_owned(),
            file_size: file.size(),
        };

        let target =
            match tokio::time::timeout(self.config.start_timeout(), self.service.request_target(&request))
                .await
            {
                Ok(Ok(target)) => target,
                Ok(Err(e)) => return Err(format!("Could not start upload: {}", e)),
                Err(_) => {
                    return Err(format!(
                        "Upload did not start within {} seconds",
                        self.config.start_timeout_secs
                    ))
                }
            };

        if self.config.require_https && !target.upload_url.starts_with("https://") {
            return Err("Upload URL must use HTTPS".to_string());
        }

        let data = file.data();
        let total = file.size();
        let chunk_size = self.config.chunk_size_bytes.max(1);
        let mut offset = 0usize;
        while offset < data.len() {
            let end = (offset + chunk_size).min(data.len());
            self.send_chunk(&target.upload_url, data.slice(offset..end), offset as u64, total)
                .await?;
            offset = end;
            self.report_progress(id, ((end as u64 * 100) / total) as u8);
        }

        let status = self
            .service
            .complete(&target.asset_id)
            .await
            .map_err(|e| format!("Upload could not be finalized: {}", e))?;

        let (url, status) = match status {
            AssetProcessingStatus::Ready { url } => (url, AssetStatus::Ready),
            AssetProcessingStatus::Processing => (String::new(), AssetStatus::Processing),
            AssetProcessingStatus::Gone => {
                return Err("Asset was removed before processing finished".to_string())
            }
        };

        Ok(DraftAsset {
            id: target.asset_id,
            url,
            file_name: request.file_name,
            file_size: total,
            asset_type: file.asset_type(),
            temporary: true,
            status,
        })
    }

    async fn send_chunk(
        &self,
        upload_url: &str,
        chunk: bytes::Bytes,
        offset: u64,
        total: u64,
    ) -> Result<(), String> {
        let mut attempt = 1;
        loop {
            match self
                .service
                .upload_chunk(upload_url, chunk.clone(), offset, total)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.config.chunk_attempts => {
                    tracing::debug!(attempt, offset, error = %e, "Chunk upload failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_delay()).await;
                }
                Err(e) => {
                    return Err(format!(
                        "Chunk at byte {} failed after {} attempt(s): {}",
                        offset, attempt, e
                    ))
                }
            }
        }
    }
}
