use draftkit_core::models::DraftId;
use draftkit_upload::UploadEvent;
use serde::Serialize;

use crate::navigator::NavigatorState;
use crate::scheduler::AutosaveStatus;

/// Notifications published by a wizard session
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WizardEvent {
    AutosaveStatusChanged {
        status: AutosaveStatus,
    },
    DraftSaved {
        draft_id: DraftId,
        step: u32,
        sequence: u64,
    },
    /// `blocking` is set for saves the user explicitly waits on
    SaveFailed {
        step: u32,
        error_code: &'static str,
        message: String,
        blocking: bool,
    },
    NavigatorStateChanged {
        state: NavigatorState,
    },
    StepChanged {
        from: u32,
        to: u32,
    },
    Upload {
        upload: UploadEvent,
    },
}
