#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use draftkit_core::models::{
    campaign_wizard_steps, AssetProcessingStatus, DraftId, DraftPatch, SaveReceipt, StepFields,
    UploadTarget, UploadTargetRequest, WizardDraft,
};
use draftkit_core::{DraftStoreBackend, WizardConfig};
use draftkit_engine::{AutosaveStatus, WizardSession};
use draftkit_storage::{
    AssetService, DraftStore, MemoryAssetService, MemoryDraftStore, StoreError, StoreResult,
};
use serde_json::{json, Value};
use tokio::sync::watch;

pub const QUIET_PERIOD: Duration = Duration::from_millis(2000);

pub fn test_config() -> WizardConfig {
    let mut config = WizardConfig {
        store_backend: DraftStoreBackend::Memory,
        ..WizardConfig::default()
    };
    config.autosave.quiet_period_ms = QUIET_PERIOD.as_millis() as u64;
    config.upload.max_file_size_bytes = 1024;
    config
}

pub fn fields(value: Value) -> StepFields {
    value.as_object().cloned().unwrap_or_default()
}

/// Values that pass the first campaign step
pub fn valid_overview() -> Vec<(&'static str, Value)> {
    vec![
        ("name", json!("Acme Launch")),
        ("businessGoal", json!("awareness")),
        ("startDate", json!("2026-11-01")),
        ("endDate", json!("2026-12-01")),
    ]
}

/// Draft whose steps before `step` are complete
pub fn draft_at(id: &str, step: u32) -> WizardDraft {
    let mut draft = WizardDraft::new(DraftId::from(id));
    draft.current_step = step;
    draft.step_completion = (1..step).collect();
    draft.fields.insert(
        1,
        fields(json!({
            "name": "Acme Launch",
            "businessGoal": "awareness",
            "startDate": "2026-11-01",
            "endDate": "2026-12-01",
        })),
    );
    draft
}

pub fn new_session(store: Arc<RecordingStore>) -> WizardSession {
    WizardSession::new(
        &test_config(),
        campaign_wizard_steps(),
        store,
        Arc::new(MemoryAssetService::new()),
    )
    .unwrap()
}

pub async fn resume_session(
    store: Arc<RecordingStore>,
    assets: Arc<dyn AssetService>,
    draft: WizardDraft,
) -> WizardSession {
    let id = draft.id.clone();
    store.insert(draft).await;
    WizardSession::resume(&test_config(), campaign_wizard_steps(), store, assets, &id)
        .await
        .unwrap()
}

pub async fn wait_for_status(rx: &mut watch::Receiver<AutosaveStatus>, status: AutosaveStatus) {
    rx.wait_for(|current| *current == status).await.unwrap();
}

/// Memory draft store that records every save and can be slowed down or
/// made to fail
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryDraftStore,
    patches: Mutex<Vec<DraftPatch>>,
    delay: Mutex<Option<Duration>>,
    failures: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: AtomicUsize,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn insert(&self, draft: WizardDraft) {
        self.inner.insert(draft).await;
    }

    /// Patches in the order the saves were started
    pub fn patches(&self) -> Vec<DraftPatch> {
        self.patches.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.patches.lock().unwrap().len()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub async fn stored(&self, id: &DraftId) -> WizardDraft {
        self.inner.load(id).await.unwrap()
    }
}

#[async_trait]
impl DraftStore for RecordingStore {
    async fn load(&self, id: &DraftId) -> StoreResult<WizardDraft> {
        self.inner.load(id).await
    }

    async fn save(&self, id: Option<&DraftId>, patch: &DraftPatch) -> StoreResult<SaveReceipt> {
        self.patches.lock().unwrap().push(patch.clone());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let result = if failing {
            Err(StoreError::BackendError("store unavailable".to_string()))
        } else {
            self.inner.save(id, patch).await
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

/// Asset service that never hands out an upload target
pub struct StalledAssetService;

#[async_trait]
impl AssetService for StalledAssetService {
    async fn request_target(&self, _request: &UploadTargetRequest) -> StoreResult<UploadTarget> {
        std::future::pending().await
    }

    async fn upload_chunk(
        &self,
        _upload_url: &str,
        _chunk: Bytes,
        _offset: u64,
        _total_size: u64,
    ) -> StoreResult<()> {
        Err(StoreError::UploadFailed("not accepting uploads".to_string()))
    }

    async fn complete(&self, _asset_id: &str) -> StoreResult<AssetProcessingStatus> {
        Err(StoreError::UploadFailed("not accepting uploads".to_string()))
    }

    async fn status(&self, _asset_id: &str) -> StoreResult<AssetProcessingStatus> {
        Ok(AssetProcessingStatus::Gone)
    }
}
