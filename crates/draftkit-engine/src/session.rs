//! Wizard session
//!
//! Wires the form, autosave actor, navigator and upload orchestrator of one
//! wizard instance together. The draft id is the only state they share.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use draftkit_core::models::{DraftAsset, DraftId, StepDefinition, WizardDraft};
use draftkit_core::{FieldErrors, ValidationResult, WizardConfig, WizardError, WizardResult};
use draftkit_storage::{create_asset_service, create_draft_store, AssetService, DraftStore};
use draftkit_upload::{
    RefreshSummary, UploadEvent, UploadFile, UploadHandle, UploadId, UploadOrchestrator,
};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::events::WizardEvent;
use crate::form::FormState;
use crate::navigator::{NavigatorState, StepNavigator};
use crate::scheduler::{AutosaveHandle, AutosaveStatus, SaveOutcome};

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct WizardSession {
    session_id: Uuid,
    form: FormState,
    autosave: AutosaveHandle,
    navigator: StepNavigator,
    uploads: UploadOrchestrator,
    events: broadcast::Sender<WizardEvent>,
    forwarder: JoinHandle<()>,
    closed: AtomicBool,
}

impl WizardSession {
    /// Start a new draft on the first step. Nothing is stored until the
    /// first save.
    pub fn new(
        config: &WizardConfig,
        steps: Vec<StepDefinition>,
        store: Arc<dyn DraftStore>,
        assets: Arc<dyn AssetService>,
    ) -> WizardResult<Self> {
        Self::build(config, steps, store, assets, None)
    }

    /// Continue a stored draft at its current step.
    ///
    /// A draft that no longer exists yields `WizardError::NotFound`, which is
    /// fatal for the wizard.
    pub async fn resume(
        config: &WizardConfig,
        steps: Vec<StepDefinition>,
        store: Arc<dyn DraftStore>,
        assets: Arc<dyn AssetService>,
        draft_id: &DraftId,
    ) -> WizardResult<Self> {
        let draft = store.load(draft_id).await.map_err(|e| {
            tracing::warn!(draft_id = %draft_id, error = %e, "Failed to load draft");
            WizardError::from(e)
        })?;
        Self::build(config, steps, store, assets, Some(draft))
    }

    /// Start a new draft against the backends selected by `config`
    pub fn from_config(config: &WizardConfig, steps: Vec<StepDefinition>) -> WizardResult<Self> {
        let store = create_draft_store(config)?;
        let assets = create_asset_service(config)?;
        Self::new(config, steps, store, assets)
    }

    fn build(
        config: &WizardConfig,
        steps: Vec<StepDefinition>,
        store: Arc<dyn DraftStore>,
        assets: Arc<dyn AssetService>,
        draft: Option<WizardDraft>,
    ) -> WizardResult<Self> {
        config
            .validate()
            .map_err(|e| WizardError::Configuration(format!("{:#}", e)))?;
        if steps.is_empty() {
            return Err(WizardError::Configuration(
                "A wizard needs at least one step".to_string(),
            ));
        }

        let steps: Arc<[StepDefinition]> = steps.into();
        let total = steps.len() as u32;
        let session_id = Uuid::new_v4();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let step = draft
            .as_ref()
            .map_or(1, |draft| draft.current_step.clamp(1, total));
        let form = FormState::new(steps.clone(), step);
        if let Some(draft) = &draft {
            form.reset(step, draft.step_fields(step));
        }
        let draft_id = draft.as_ref().map(|draft| draft.id.clone());

        let autosave = AutosaveHandle::spawn(
            &config.autosave,
            form.clone(),
            store,
            session_id,
            draft,
            events.clone(),
        );
        let navigator =
            StepNavigator::new(steps, form.clone(), autosave.clone(), events.clone());
        let uploads = UploadOrchestrator::new(&config.upload, assets, Arc::new(form.clone()));
        let forwarder = tokio::spawn(forward_upload_events(uploads.subscribe(), events.clone()));

        tracing::info!(
            session_id = %session_id,
            draft_id = draft_id.as_ref().map_or("new", DraftId::as_str),
            step,
            total_steps = total,
            "Wizard session started"
        );

        Ok(Self {
            session_id,
            form,
            autosave,
            navigator,
            uploads,
            events,
            forwarder,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> WizardResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(WizardError::SessionClosed);
        }
        Ok(())
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Assigned by the first successful save
    pub fn draft_id(&self) -> Option<DraftId> {
        self.autosave.draft_id()
    }

    pub fn draft(&self) -> Option<WizardDraft> {
        self.autosave.draft()
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn navigator(&self) -> &StepNavigator {
        &self.navigator
    }

    pub fn uploads(&self) -> &UploadOrchestrator {
        &self.uploads
    }

    pub fn current_step(&self) -> u32 {
        self.form.step()
    }

    pub fn is_dirty(&self) -> bool {
        self.form.is_dirty()
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.form.value(name)
    }

    pub fn errors(&self) -> FieldErrors {
        self.form.errors()
    }

    pub fn assets(&self) -> Vec<DraftAsset> {
        self.form.assets()
    }

    pub fn autosave_status(&self) -> AutosaveStatus {
        self.autosave.status()
    }

    pub fn subscribe_autosave_status(&self) -> watch::Receiver<AutosaveStatus> {
        self.autosave.subscribe_status()
    }

    pub fn navigator_state(&self) -> NavigatorState {
        self.navigator.state()
    }

    pub fn set_field(&self, name: &str, value: impl Into<Value>) {
        self.form.set_field(name, value.into());
    }

    pub fn validate(&self) -> ValidationResult {
        self.form.validate()
    }

    pub async fn forward(&self) -> WizardResult<u32> {
        self.ensure_open()?;
        self.navigator.forward().await
    }

    pub async fn back(&self) -> WizardResult<u32> {
        self.ensure_open()?;
        self.navigator.back().await
    }

    pub async fn jump(&self, target: u32) -> WizardResult<u32> {
        self.ensure_open()?;
        self.navigator.jump(target).await
    }

    /// Save the current step now without leaving it
    pub async fn save_now(&self) -> WizardResult<SaveOutcome> {
        self.ensure_open()?;
        self.autosave.save_now(self.form.step()).await
    }

    pub fn set_autosave_enabled(&self, enabled: bool) {
        self.autosave.set_enabled(enabled);
    }

    pub fn enqueue_upload(&self, file: UploadFile) -> WizardResult<UploadHandle> {
        self.ensure_open()?;
        Ok(self.uploads.enqueue(file)?)
    }

    pub fn cancel_upload(&self, id: UploadId) -> bool {
        self.uploads.cancel(id)
    }

    pub fn remove_asset(&self, asset_id: &str) -> bool {
        self.uploads.remove_asset(asset_id)
    }

    pub async fn refresh_processing(&self) -> RefreshSummary {
        self.uploads.refresh_processing().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
        self.events.subscribe()
    }

    /// Leave the wizard.
    ///
    /// Cancels the autosave timer and aborts in-flight uploads. A save already
    /// sent to the store is allowed to finish. Safe to call more than once.
    pub fn teardown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.autosave.shutdown();
        self.uploads.shutdown();
        self.forwarder.abort();
        tracing::info!(
            session_id = %self.session_id,
            dirty = self.form.is_dirty(),
            "Wizard session closed"
        );
    }
}

impl Drop for WizardSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn forward_upload_events(
    mut uploads: broadcast::Receiver<UploadEvent>,
    events: broadcast::Sender<WizardEvent>,
) {
    loop {
        match uploads.recv().await {
            Ok(upload) => {
                let _ = events.send(WizardEvent::Upload { upload });
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Upload events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
