//! Form state container
//!
//! Holds the displayed step's values, its asset list and the last validation
//! errors. Every mutation bumps a revision counter that is published on a
//! watch channel; the autosave scheduler observes that channel, so no edit
//! goes unnoticed.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use draftkit_core::models::{AssetStatus, DraftAsset, StepDefinition, StepFields, ASSETS_FIELD};
use draftkit_core::{FieldErrors, ValidationResult};
use draftkit_upload::AssetSink;
use serde_json::Value;
use tokio::sync::watch;

/// In-memory mirror of one step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormSnapshot {
    pub step: u32,
    /// Field values other than the asset list
    pub values: StepFields,
    /// `None` while the step has never held an asset list
    pub assets: Option<Vec<DraftAsset>>,
    pub errors: FieldErrors,
    pub is_dirty: bool,
    pub revision: u64,
    /// Revision at which `validate` last passed
    pub validated_revision: Option<u64>,
}

impl FormSnapshot {
    /// All fields of the step, assets included, as the schema sees them
    pub fn field_map(&self) -> StepFields {
        let mut fields = self.values.clone();
        if let Some(assets) = &self.assets {
            fields.insert(ASSETS_FIELD.to_string(), assets_value(assets));
        }
        fields
    }

    /// Whether the last passing validation still describes the current values
    pub fn is_validated(&self) -> bool {
        self.validated_revision == Some(self.revision)
    }
}

pub(crate) fn assets_value(assets: &[DraftAsset]) -> Value {
    serde_json::to_value(assets).unwrap_or_else(|_| Value::Array(Vec::new()))
}

/// Pull the typed asset list out of stored step fields
fn split_assets(step: u32, mut fields: StepFields) -> (StepFields, Option<Vec<DraftAsset>>) {
    let assets = match fields.remove(ASSETS_FIELD) {
        Some(value) => match serde_json::from_value::<Vec<DraftAsset>>(value.clone()) {
            Ok(assets) => Some(assets),
            Err(e) => {
                tracing::warn!(step, error = %e, "Stored asset list could not be read");
                fields.insert(ASSETS_FIELD.to_string(), value);
                None
            }
        },
        None => None,
    };
    (fields, assets)
}

struct FormInner {
    snapshot: FormSnapshot,
    /// Uploads that finished after the user left their step
    detached: BTreeMap<u32, Vec<DraftAsset>>,
}

/// Shared handle to the form of one wizard session
#[derive(Clone)]
pub struct FormState {
    steps: Arc<[StepDefinition]>,
    inner: Arc<Mutex<FormInner>>,
    changes: Arc<watch::Sender<u64>>,
}

impl FormState {
    pub fn new(steps: Arc<[StepDefinition]>, step: u32) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            steps,
            inner: Arc::new(Mutex::new(FormInner {
                snapshot: FormSnapshot {
                    step,
                    ..FormSnapshot::default()
                },
                detached: BTreeMap::new(),
            })),
            changes: Arc::new(changes),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FormInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the form dirty and wake observers
    fn touch(&self, inner: &mut FormInner) {
        inner.snapshot.revision += 1;
        inner.snapshot.is_dirty = true;
        self.changes.send_replace(inner.snapshot.revision);
    }

    /// Receives the revision after every mutation
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn snapshot(&self) -> FormSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn step(&self) -> u32 {
        self.lock().snapshot.step
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().snapshot.is_dirty
    }

    pub fn revision(&self) -> u64 {
        self.lock().snapshot.revision
    }

    pub fn errors(&self) -> FieldErrors {
        self.lock().snapshot.errors.clone()
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        let inner = self.lock();
        if name == ASSETS_FIELD {
            return inner.snapshot.assets.as_deref().map(assets_value);
        }
        inner.snapshot.values.get(name).cloned()
    }

    pub fn assets(&self) -> Vec<DraftAsset> {
        self.lock().snapshot.assets.clone().unwrap_or_default()
    }

    /// Update one field and mark the step dirty. Does not validate.
    pub fn set_field(&self, name: &str, value: Value) {
        let mut inner = self.lock();

        if name == ASSETS_FIELD {
            match serde_json::from_value::<Vec<DraftAsset>>(value.clone()) {
                Ok(assets) => {
                    inner.snapshot.assets = Some(assets);
                    self.touch(&mut inner);
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Asset list has an unexpected shape, storing it as a plain value");
                }
            }
        }

        inner.snapshot.values.insert(name.to_string(), value);
        self.touch(&mut inner);
    }

    /// Run the step's schema over the current values and remember the errors
    pub fn validate(&self) -> ValidationResult {
        let mut inner = self.lock();
        let step = inner.snapshot.step;
        let result = self
            .steps
            .iter()
            .find(|definition| definition.number == step)
            .map(|definition| definition.schema.validate(&inner.snapshot.field_map()))
            .unwrap_or_default();

        inner.snapshot.errors = result.errors.clone();
        inner.snapshot.validated_revision = result.is_ok().then_some(inner.snapshot.revision);
        result
    }

    /// Show errors reported by the draft store
    pub fn set_errors(&self, errors: FieldErrors) {
        self.lock().snapshot.errors = errors;
    }

    /// Replace every value with `fields` for `step` and clear the dirty flag.
    ///
    /// Assets that finished uploading for `step` while it was not displayed are
    /// appended afterwards, leaving the form dirty so they get saved.
    pub fn reset(&self, step: u32, fields: StepFields) {
        let (values, assets) = split_assets(step, fields);
        let mut inner = self.lock();
        self.load(&mut inner, step, values, assets);
    }

    /// Load `step` like [`reset`](Self::reset), but only while the displayed
    /// step is still at `saved_revision`.
    ///
    /// Returns false and leaves the form untouched when an edit or upload
    /// landed after that revision was saved.
    pub(crate) fn switch_step(&self, saved_revision: u64, step: u32, fields: StepFields) -> bool {
        let (values, assets) = split_assets(step, fields);
        let mut inner = self.lock();
        if inner.snapshot.revision != saved_revision {
            return false;
        }
        self.load(&mut inner, step, values, assets);
        true
    }

    fn load(
        &self,
        inner: &mut FormInner,
        step: u32,
        values: StepFields,
        assets: Option<Vec<DraftAsset>>,
    ) {
        inner.snapshot = FormSnapshot {
            step,
            values,
            assets,
            errors: FieldErrors::new(),
            is_dirty: false,
            revision: inner.snapshot.revision + 1,
            validated_revision: None,
        };

        if let Some(pending) = inner.detached.remove(&step) {
            tracing::debug!(step, count = pending.len(), "Attaching assets uploaded while away");
            inner
                .snapshot
                .assets
                .get_or_insert_with(Vec::new)
                .extend(pending);
            self.touch(inner);
        }
    }

    /// Record a successful save of `revision`.
    ///
    /// The saved assets stop being temporary. The dirty flag is only cleared
    /// when nothing changed since the payload was built.
    pub(crate) fn mark_saved(&self, revision: u64, asset_ids: &[String]) -> bool {
        let mut inner = self.lock();
        if let Some(assets) = inner.snapshot.assets.as_mut() {
            for asset in assets.iter_mut().filter(|a| asset_ids.contains(&a.id)) {
                asset.temporary = false;
            }
        }

        if inner.snapshot.revision == revision {
            inner.snapshot.is_dirty = false;
            true
        } else {
            false
        }
    }
}

impl AssetSink for FormState {
    fn current_step(&self) -> u32 {
        self.step()
    }

    fn asset_count(&self) -> usize {
        self.lock().snapshot.assets.as_ref().map_or(0, Vec::len)
    }

    fn append_asset(&self, step: u32, asset: DraftAsset) {
        let mut inner = self.lock();
        if inner.snapshot.step == step {
            inner
                .snapshot
                .assets
                .get_or_insert_with(Vec::new)
                .push(asset);
            self.touch(&mut inner);
        } else {
            tracing::debug!(step, asset_id = %asset.id, "Upload finished for a step no longer displayed");
            inner.detached.entry(step).or_default().push(asset);
        }
    }

    fn mark_asset_ready(&self, asset_id: &str, url: &str) -> bool {
        let mut inner = self.lock();

        let current = inner
            .snapshot
            .assets
            .iter_mut()
            .flatten()
            .find(|a| a.id == asset_id);
        if let Some(asset) = current {
            asset.url = url.to_string();
            asset.status = AssetStatus::Ready;
            self.touch(&mut inner);
            return true;
        }

        match inner
            .detached
            .values_mut()
            .flatten()
            .find(|a| a.id == asset_id)
        {
            Some(asset) => {
                asset.url = url.to_string();
                asset.status = AssetStatus::Ready;
                true
            }
            None => false,
        }
    }

    fn remove_asset(&self, asset_id: &str) -> bool {
        let mut inner = self.lock();

        if let Some(assets) = inner.snapshot.assets.as_mut() {
            let before = assets.len();
            assets.retain(|a| a.id != asset_id);
            if assets.len() != before {
                self.touch(&mut inner);
                return true;
            }
        }

        let mut removed = false;
        for assets in inner.detached.values_mut() {
            let before = assets.len();
            assets.retain(|a| a.id != asset_id);
            removed |= assets.len() != before;
        }
        removed
    }

    fn processing_assets(&self) -> Vec<DraftAsset> {
        let inner = self.lock();
        inner
            .snapshot
            .assets
            .iter()
            .flatten()
            .chain(inner.detached.values().flatten())
            .filter(|a| a.status == AssetStatus::Processing)
            .cloned()
            .collect()
    }
}
