use draftkit_core::models::DraftAsset;
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

/// Identifies one enqueued file for the lifetime of its upload
pub type UploadId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadState {
    Queued,
    Uploading { progress: u8 },
    /// Accepted by the service, which finishes processing out-of-band
    Processing { asset_id: String },
    Ready { asset_id: String },
    Failed { reason: String },
    Cancelled,
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Processing { .. }
                | UploadState::Ready { .. }
                | UploadState::Failed { .. }
                | UploadState::Cancelled
        )
    }
}

/// Notifications published by the orchestrator
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadEvent {
    Progress {
        upload_id: UploadId,
        percent: u8,
    },
    Completed {
        upload_id: UploadId,
        asset: DraftAsset,
    },
    Failed {
        upload_id: UploadId,
        file_name: String,
        reason: String,
    },
    Cancelled {
        upload_id: UploadId,
    },
    AssetReady {
        asset_id: String,
        url: String,
    },
    AssetRemoved {
        asset_id: String,
    },
}

/// Caller-side view of one upload
#[derive(Debug, Clone)]
pub struct UploadHandle {
    pub id: UploadId,
    pub file_name: String,
    pub(crate) progress: watch::Receiver<u8>,
    pub(crate) state: watch::Receiver<UploadState>,
}

impl UploadHandle {
    /// Percentage of bytes sent, 0 to 100
    pub fn progress(&self) -> u8 {
        *self.progress.borrow()
    }

    pub fn state(&self) -> UploadState {
        self.state.borrow().clone()
    }

    /// Wait for the upload to reach a terminal state
    pub async fn wait(&mut self) -> UploadState {
        loop {
            let current = self.state.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if self.state.changed().await.is_err() {
                return self.state.borrow().clone();
            }
        }
    }
}

/// Point-in-time listing entry
#[derive(Debug, Clone, Serialize)]
pub struct UploadSnapshot {
    pub id: UploadId,
    pub file_name: String,
    pub progress: u8,
    pub state: UploadState,
}
