#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use draftkit_core::models::{
    AssetProcessingStatus, AssetStatus, DraftAsset, UploadTarget, UploadTargetRequest,
};
use draftkit_core::UploadConfig;
use draftkit_storage::{AssetService, StoreError, StoreResult};
use draftkit_upload::{AssetSink, UploadFile};
use tokio::sync::Semaphore;

pub fn test_config() -> UploadConfig {
    UploadConfig {
        max_file_size_bytes: 1024,
        max_video_size_bytes: 4096,
        max_files: 5,
        chunk_size_bytes: 4,
        ..UploadConfig::default()
    }
}

pub fn png(name: &str, size: usize) -> UploadFile {
    UploadFile::new(name, "image/png", Bytes::from(vec![7u8; size]))
}

/// Form stand-in that records attached assets
pub struct RecordingSink {
    step: u32,
    assets: Mutex<Vec<(u32, DraftAsset)>>,
}

impl RecordingSink {
    pub fn new(step: u32) -> Arc<Self> {
        Arc::new(Self {
            step,
            assets: Mutex::new(Vec::new()),
        })
    }

    pub fn assets(&self) -> Vec<DraftAsset> {
        self.assets
            .lock()
            .unwrap()
            .iter()
            .map(|(_, a)| a.clone())
            .collect()
    }

    pub fn steps(&self) -> Vec<u32> {
        self.assets.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }
}

impl AssetSink for RecordingSink {
    fn current_step(&self) -> u32 {
        self.step
    }

    fn asset_count(&self) -> usize {
        self.assets.lock().unwrap().len()
    }

    fn append_asset(&self, step: u32, asset: DraftAsset) {
        self.assets.lock().unwrap().push((step, asset));
    }

    fn mark_asset_ready(&self, asset_id: &str, url: &str) -> bool {
        let mut assets = self.assets.lock().unwrap();
        match assets.iter_mut().find(|(_, a)| a.id == asset_id) {
            Some((_, asset)) => {
                asset.url = url.to_string();
                asset.status = AssetStatus::Ready;
                true
            }
            None => false,
        }
    }

    fn remove_asset(&self, asset_id: &str) -> bool {
        let mut assets = self.assets.lock().unwrap();
        let before = assets.len();
        assets.retain(|(_, a)| a.id != asset_id);
        assets.len() != before
    }

    fn processing_assets(&self) -> Vec<DraftAsset> {
        self.assets()
            .into_iter()
            .filter(|a| a.status == AssetStatus::Processing)
            .collect()
    }
}

/// How the scripted service treats one file name
#[derive(Clone, Default)]
pub struct Behaviour {
    pub fail_target: bool,
    pub target_delay: Option<Duration>,
    pub chunk_failures: u32,
    pub insecure_url: bool,
    /// Chunks block until a permit is added
    pub gate: Option<Arc<Semaphore>>,
}

struct Upload {
    file_name: String,
    failures_left: u32,
}

/// Asset service whose behaviour is scripted per file name
#[derive(Default)]
pub struct ScriptedAssetService {
    behaviours: Mutex<HashMap<String, Behaviour>>,
    uploads: Mutex<HashMap<String, Upload>>,
    pub target_calls: AtomicUsize,
    pub chunk_calls: AtomicUsize,
}

impl ScriptedAssetService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, file_name: &str, behaviour: Behaviour) {
        self.behaviours
            .lock()
            .unwrap()
            .insert(file_name.to_string(), behaviour);
    }

    fn behaviour(&self, file_name: &str) -> Behaviour {
        self.behaviours
            .lock()
            .unwrap()
            .get(file_name)
            .cloned()
            .unwrap_or_default()
    }

    fn asset_id(upload_url: &str) -> String {
        upload_url.rsplit('/').next().unwrap_or_default().to_string()
    }
}

#[async_trait]
impl AssetService for ScriptedAssetService {
    async fn request_target(&self, request: &UploadTargetRequest) -> StoreResult<UploadTarget> {
        let n = self.target_calls.fetch_add(1, Ordering::SeqCst);
        let behaviour = self.behaviour(&request.file_name);

        if let Some(delay) = behaviour.target_delay {
            tokio::time::sleep(delay).await;
        }
        if behaviour.fail_target {
            return Err(StoreError::UploadFailed("service unavailable".to_string()));
        }

        let asset_id = format!("asset-{}", n);
        self.uploads.lock().unwrap().insert(
            asset_id.clone(),
            Upload {
                file_name: request.file_name.clone(),
                failures_left: behaviour.chunk_failures,
            },
        );
        let scheme = if behaviour.insecure_url { "http" } else { "https" };
        Ok(UploadTarget {
            upload_url: format!("{}://upload.test/{}", scheme, asset_id),
            asset_id,
        })
    }

    async fn upload_chunk(
        &self,
        upload_url: &str,
        _chunk: Bytes,
        _offset: u64,
        _total_size: u64,
    ) -> StoreResult<()> {
        self.chunk_calls.fetch_add(1, Ordering::SeqCst);
        let asset_id = Self::asset_id(upload_url);

        let file_name = {
            let mut uploads = self.uploads.lock().unwrap();
            let upload = uploads
                .get_mut(&asset_id)
                .ok_or_else(|| StoreError::UploadFailed("unknown upload".to_string()))?;
            if upload.failures_left > 0 {
                upload.failures_left -= 1;
                return Err(StoreError::UploadFailed("connection reset".to_string()));
            }
            upload.file_name.clone()
        };

        if let Some(gate) = self.behaviour(&file_name).gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| StoreError::UploadFailed("gate closed".to_string()))?;
            permit.forget();
        }
        Ok(())
    }

    async fn complete(&self, asset_id: &str) -> StoreResult<AssetProcessingStatus> {
        Ok(AssetProcessingStatus::Ready {
            url: format!("https://cdn.test/f/{}", asset_id),
        })
    }

    async fn status(&self, asset_id: &str) -> StoreResult<AssetProcessingStatus> {
        Ok(AssetProcessingStatus::Ready {
            url: format!("https://cdn.test/f/{}", asset_id),
        })
    }
}
